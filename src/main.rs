// src/main.rs
use anyhow::Result;
use app_shell::config::{self, Config};
use app_shell::health::{
    CustomCheck, HealthChecker, HealthResult, HttpCheck, ReadinessController, TcpCheck,
};
use app_shell::lifecycle::{App, Cancelled, Service};
use app_shell::telemetry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() {
    let code = match start() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("app-shell: {:#}", e);
            app_shell::lifecycle::EXIT_APPLICATION_ERROR
        }
    };
    std::process::exit(code);
}

#[tokio::main]
async fn start() -> Result<i32> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CONFIG_FILE").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = config::load_config(&config_path).await?;
    telemetry::init_tracing(&config.logger)?;
    info!(path = %config_path, app = %config.app_name, "configuration loaded");

    let mut app = App::from_config(&config)?;
    app.with_health_checks(configured_checks(&config)?);
    app.add(Heartbeat::new(Duration::from_secs(5)));

    let outcome = app.run().await;
    for err in &outcome.errors {
        error!(service = err.service(), error = %err, "service error");
    }
    Ok(outcome.exit_code)
}

fn configured_checks(config: &Config) -> Result<Vec<Arc<dyn HealthChecker>>> {
    let mut checks: Vec<Arc<dyn HealthChecker>> = Vec::new();
    for http in &config.checks.http {
        checks.push(Arc::new(HttpCheck::from_config(http)?));
    }
    for tcp in &config.checks.tcp {
        checks.push(Arc::new(TcpCheck::from_config(tcp)));
    }
    Ok(checks)
}

/// Demo workload: ticks on an interval and reports itself stale when ticks stop.
struct Heartbeat {
    interval: Duration,
    beats: Arc<AtomicU64>,
    ready: Arc<HeartbeatReadiness>,
}

#[derive(Default)]
struct HeartbeatReadiness(AtomicBool);

impl ReadinessController for HeartbeatReadiness {
    fn set_ready(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Heartbeat {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            beats: Arc::new(AtomicU64::new(0)),
            ready: Arc::new(HeartbeatReadiness::default()),
        }
    }
}

#[async_trait]
impl Service for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        self.ready.set_ready(true);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let beats = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(beats, "heartbeat");
                }
                _ = shutdown.cancelled() => return Err(Cancelled.into()),
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.ready.set_ready(false);
        info!(beats = self.beats.load(Ordering::SeqCst), "heartbeat stopped");
        Ok(())
    }

    fn health_checks(&self) -> Vec<Arc<dyn HealthChecker>> {
        let beats = self.beats.clone();
        vec![Arc::new(CustomCheck::new("heartbeat", move || {
            let count = beats.load(Ordering::SeqCst);
            async move {
                if count > 0 {
                    HealthResult::healthy("heartbeat ticking").with_detail("beats", count)
                } else {
                    HealthResult::degraded("no heartbeat yet")
                }
            }
        }))]
    }

    fn readiness_controller(&self) -> Option<Arc<dyn ReadinessController>> {
        Some(self.ready.clone())
    }
}
