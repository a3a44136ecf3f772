// src/lifecycle/app.rs
use crate::config::Config;
use crate::health::strategy::{create_strategy, AllHealthyStrategy};
use crate::health::{HealthChecker, HealthManager, HealthManagerConfig, ReadinessController};
use crate::lifecycle::{signals, Cancelled, LifecycleError, Service, ServiceState, ServiceStates};
use crate::metrics::{MetricsCollector, MetricsRegistry};
use crate::panic::panic_message;
use crate::server::ObservabilityService;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

pub const EXIT_OK: i32 = 0;
pub const EXIT_APPLICATION_ERROR: i32 = 1;
pub const EXIT_WATCHDOG: i32 = 1;

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub name: String,
    pub version: String,
    /// Cancel every service when one fails or panics.
    pub stop_all_on_error: bool,
    /// Budget for each service's `shutdown`.
    pub shutdown_timeout: Duration,
    /// Extra time on top of `shutdown_timeout` before the watchdog gives up.
    pub watchdog_margin: Duration,
    /// Cancel on SIGINT/SIGTERM.
    pub trap_signals: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            version: String::new(),
            stop_all_on_error: true,
            shutdown_timeout: Duration::from_secs(5),
            watchdog_margin: Duration::from_secs(5),
            trap_signals: true,
        }
    }
}

impl AppOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_stop_all_on_error(mut self, stop_all: bool) -> Self {
        self.stop_all_on_error = stop_all;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_watchdog_margin(mut self, margin: Duration) -> Self {
        self.watchdog_margin = margin;
        self
    }

    pub fn with_trap_signals(mut self, trap: bool) -> Self {
        self.trap_signals = trap;
        self
    }

    pub fn watchdog_timeout(&self) -> Duration {
        self.shutdown_timeout + self.watchdog_margin
    }
}

impl From<&Config> for AppOptions {
    fn from(config: &Config) -> Self {
        Self {
            name: config.app_name.clone(),
            version: config.version.clone(),
            stop_all_on_error: config.lifecycle.stop_all_on_error,
            shutdown_timeout: config.lifecycle.shutdown_timeout(),
            watchdog_margin: config.lifecycle.watchdog_margin(),
            trap_signals: config.lifecycle.trap_signals,
        }
    }
}

/// What [`App::run`] ended with. The binary turns `exit_code` into the
/// process exit status.
#[derive(Debug)]
pub struct Outcome {
    pub exit_code: i32,
    pub errors: Vec<LifecycleError>,
    pub watchdog_fired: bool,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_OK && !self.watchdog_fired
    }
}

/// Runs a set of services until cancellation, then drives their shutdown
/// under a timeout and a final watchdog.
pub struct App {
    options: AppOptions,
    services: Vec<(String, Arc<dyn Service>)>,
    health: Arc<HealthManager>,
    metrics: Option<Arc<MetricsCollector>>,
    states: ServiceStates,
    parent: Option<CancellationToken>,
    span: Span,
}

impl App {
    pub fn new(options: AppOptions) -> Self {
        let span = info_span!("app", app = %options.name, version = %options.version);
        let health = Arc::new(HealthManager::new(
            HealthManagerConfig::default(),
            Arc::new(AllHealthyStrategy),
            span.clone(),
        ));

        Self {
            options,
            services: Vec::new(),
            health,
            metrics: None,
            states: ServiceStates::new(),
            parent: None,
            span,
        }
    }

    /// Builds the application described by `config`: health manager with the
    /// configured strategy, metrics, and the observability endpoint.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut app = Self::new(AppOptions::from(config));
        let health_config = &config.observability.health;

        let registry = Arc::new(MetricsRegistry::new()?);
        let strategy = create_strategy(health_config.strategy, &health_config.weights);
        let health = HealthManager::new(
            HealthManagerConfig::from(health_config),
            strategy,
            app.span.clone(),
        )
        .with_metrics(registry.collector());

        app.health = Arc::new(health);
        app.metrics = Some(registry.collector());

        if config.observability.enabled {
            let metrics = config.observability.metrics.enabled.then(|| registry.clone());
            let observability =
                ObservabilityService::new(&config.observability, app.health.clone(), metrics)?;
            app.add(observability);
        }

        Ok(app)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cancelling `token` shuts the application down.
    pub fn with_parent_token(mut self, token: CancellationToken) -> Self {
        self.parent = Some(token);
        self
    }

    /// Registers a service together with its health checks and readiness
    /// controller. Duplicate names get a `#n` suffix.
    pub fn add<S: Service>(&mut self, service: S) -> &mut Self {
        self.add_shared(Arc::new(service))
    }

    pub fn add_shared(&mut self, service: Arc<dyn Service>) -> &mut Self {
        let name = self.unique_name(service.name());

        let checks = service.health_checks();
        let check_count = checks.len();
        self.health.register_checkers(checks);

        if let Some(controller) = service.readiness_controller() {
            self.health.attach_readiness(controller);
        }

        self.states.register(&name);
        self.span
            .in_scope(|| debug!(service = %name, checks_count = check_count, "registered service"));

        self.services.push((name, service));
        self
    }

    /// Registers checks that belong to no particular service.
    pub fn with_health_checks<I>(&mut self, checkers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn HealthChecker>>,
    {
        let checkers: Vec<_> = checkers.into_iter().collect();
        let check_count = checkers.len();
        self.health.register_checkers(checkers);

        self.span
            .in_scope(|| debug!(checks_count = check_count, "registered global health checks"));
        self
    }

    pub fn attach_readiness(&mut self, controller: Arc<dyn ReadinessController>) -> &mut Self {
        self.health.attach_readiness(controller);
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.health.set_ready(ready);
    }

    pub fn is_ready(&self) -> bool {
        self.health.is_ready()
    }

    pub fn health_manager(&self) -> Arc<HealthManager> {
        self.health.clone()
    }

    pub fn states(&self) -> ServiceStates {
        self.states.clone()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|(name, _)| name.clone()).collect()
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.states.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}#{}", base, n))
            .find(|candidate| !self.states.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Starts every service and blocks until all of them finished after
    /// cancellation, or until the watchdog gives up on them.
    ///
    /// A service returning normally does not stop its siblings; the
    /// application keeps running until the token is cancelled by a signal,
    /// the parent token, or a failure with stop-all-on-error enabled.
    pub async fn run(self) -> Outcome {
        let span = self.span.clone();
        self.run_services().instrument(span).await
    }

    async fn run_services(self) -> Outcome {
        let App {
            options,
            services,
            metrics,
            states,
            parent,
            ..
        } = self;

        let token = parent.map(|p| p.child_token()).unwrap_or_default();
        info!(services = services.len(), "starting");

        let signal_task = options.trap_signals.then(|| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = signals::wait_for_shutdown_signal() => token.cancel(),
                    _ = token.cancelled() => {}
                }
            })
        });

        let mut tasks = JoinSet::new();
        for (name, service) in services {
            let task = ServiceTask {
                name,
                service,
                token: token.clone(),
                states: states.clone(),
                metrics: metrics.clone(),
                stop_all_on_error: options.stop_all_on_error,
                shutdown_timeout: options.shutdown_timeout,
            };
            tasks.spawn(task.clone().shutdown_when_cancelled().in_current_span());
            tasks.spawn(task.run().in_current_span());
        }

        let mut errors = Vec::new();
        let watchdog_timeout = options.watchdog_timeout();
        let watchdog_fired = {
            let drain = async {
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok(Some(err)) => errors.push(err),
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "lifecycle task aborted"),
                    }
                }
            };
            let watchdog = async {
                token.cancelled().await;
                info!(timeout = ?watchdog_timeout, "waiting for application shutdown");
                tokio::time::sleep(watchdog_timeout).await;
            };

            tokio::select! {
                _ = drain => false,
                _ = watchdog => true,
            }
        };

        if let Some(task) = signal_task {
            task.abort();
        }

        if watchdog_fired {
            warn!(
                stuck = ?stuck_services(&states),
                "graceful shutdown watchdog triggered: forcing shutdown"
            );
            tasks.abort_all();
            return Outcome {
                exit_code: EXIT_WATCHDOG,
                errors,
                watchdog_fired: true,
            };
        }

        let exit_code = if errors.is_empty() {
            info!("application stopped");
            EXIT_OK
        } else {
            error!(errors = errors.len(), "application stopped with errors");
            EXIT_APPLICATION_ERROR
        };

        Outcome {
            exit_code,
            errors,
            watchdog_fired: false,
        }
    }
}

fn stuck_services(states: &ServiceStates) -> Vec<String> {
    states
        .snapshot()
        .into_iter()
        .filter(|(_, state)| !state.is_terminal())
        .map(|(name, _)| name)
        .collect()
}

#[derive(Clone)]
struct ServiceTask {
    name: String,
    service: Arc<dyn Service>,
    token: CancellationToken,
    states: ServiceStates,
    metrics: Option<Arc<MetricsCollector>>,
    stop_all_on_error: bool,
    shutdown_timeout: Duration,
}

impl ServiceTask {
    async fn run(self) -> Option<LifecycleError> {
        self.states.advance(&self.name, ServiceState::Running);
        self.set_running(true);
        info!(service = %self.name, "service started");

        let handle = {
            let service = self.service.clone();
            let token = self.token.clone();
            AbortOnDropHandle::new(tokio::spawn(
                async move { service.run(token).await }.in_current_span(),
            ))
        };

        let failure = match handle.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) if self.token.is_cancelled() && e.is::<Cancelled>() => {
                debug!(service = %self.name, "graceful shutdown");
                None
            }
            Ok(Err(e)) => Some(LifecycleError::ServiceFailed {
                service: self.name.clone(),
                source: e,
            }),
            Err(e) if e.is_panic() => Some(LifecycleError::ServicePanicked {
                service: self.name.clone(),
                message: panic_message(e.into_panic()),
            }),
            Err(e) => Some(LifecycleError::ServiceFailed {
                service: self.name.clone(),
                source: anyhow::Error::new(e),
            }),
        };

        self.set_running(false);

        match failure {
            None => {
                self.states.advance(&self.name, ServiceState::Stopped);
                info!(service = %self.name, "service stopped");
                None
            }
            Some(err) => {
                error!(service = %self.name, kind = err.kind(), error = %err, "service failed");
                self.fail(&err);
                if self.stop_all_on_error && !self.token.is_cancelled() {
                    warn!(service = %self.name, "stopping all services");
                    self.token.cancel();
                }
                Some(err)
            }
        }
    }

    async fn shutdown_when_cancelled(self) -> Option<LifecycleError> {
        self.token.cancelled().await;
        self.states.advance(&self.name, ServiceState::ShuttingDown);

        let started = Instant::now();
        let mut handle = {
            let service = self.service.clone();
            AbortOnDropHandle::new(tokio::spawn(
                async move { service.shutdown().await }.in_current_span(),
            ))
        };

        let failure = match timeout(self.shutdown_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(LifecycleError::ShutdownFailed {
                service: self.name.clone(),
                source: e,
            }),
            Ok(Err(e)) if e.is_panic() => Some(LifecycleError::ShutdownFailed {
                service: self.name.clone(),
                source: anyhow!("panic during shutdown: {}", panic_message(e.into_panic())),
            }),
            Ok(Err(e)) => Some(LifecycleError::ShutdownFailed {
                service: self.name.clone(),
                source: anyhow::Error::new(e),
            }),
            Err(_) => {
                handle.abort();
                Some(LifecycleError::ShutdownTimeout {
                    service: self.name.clone(),
                    timeout: self.shutdown_timeout,
                })
            }
        };

        let elapsed = started.elapsed();
        let result = match &failure {
            None => "completed",
            Some(LifecycleError::ShutdownTimeout { .. }) => "timeout",
            Some(_) => "failed",
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_shutdown(&self.name, result, elapsed);
        }

        match failure {
            None => {
                debug!(service = %self.name, duration = ?elapsed, "service shut down");
                None
            }
            Some(err) => {
                error!(service = %self.name, result, duration = ?elapsed, error = %err, "failed to shut down service");
                self.fail(&err);
                Some(err)
            }
        }
    }

    fn fail(&self, err: &LifecycleError) {
        self.states
            .advance(&self.name, ServiceState::Failed(err.to_string()));
        if let Some(metrics) = &self.metrics {
            metrics.record_service_error(&self.name, err.kind());
        }
    }

    fn set_running(&self, running: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.update_service_running(&self.name, running);
        }
    }
}
