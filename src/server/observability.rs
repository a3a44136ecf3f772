// src/server/observability.rs
use crate::config::ObservabilityConfig;
use crate::health::HealthManager;
use crate::lifecycle::Service;
use crate::metrics::MetricsRegistry;
use crate::server::{ObservabilityHandler, ServerBuilder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Serves health endpoints and metrics on a dedicated port for the lifetime of
/// the application.
pub struct ObservabilityService {
    addr: SocketAddr,
    handler: ObservabilityHandler,
    stop: CancellationToken,
}

impl ObservabilityService {
    pub fn new(
        config: &ObservabilityConfig,
        health: Arc<HealthManager>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Result<Self> {
        let addr: SocketAddr = config
            .addr()
            .parse()
            .with_context(|| format!("invalid observability address {}", config.addr()))?;

        Ok(Self {
            addr,
            handler: ObservabilityHandler::new(config, health, metrics),
            stop: CancellationToken::new(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Service for ObservabilityService {
    fn name(&self) -> &str {
        "observability"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let server_token = self.stop.child_token();

        info!(addr = %self.addr, "starting observability server");
        let serve = ServerBuilder::new(self.addr)
            .with_handler(self.handler.clone())
            .with_shutdown(server_token.clone())
            .serve();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result.context("observability server failed"),
            _ = shutdown.cancelled() => server_token.cancel(),
        }

        serve.await.context("observability server failed")
    }

    async fn shutdown(&self) -> Result<()> {
        info!("shutting down observability server");
        self.stop.cancel();
        Ok(())
    }
}
