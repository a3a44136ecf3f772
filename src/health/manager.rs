// src/health/manager.rs
use crate::config::HealthConfig;
use crate::health::checker::{check_contained, HealthChecker, ReadinessController};
use crate::health::strategy::{AggregationStrategy, AllHealthyStrategy};
use crate::health::{HealthResult, HealthResults, HealthStatus};
use crate::metrics::MetricsCollector;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info, warn, Instrument, Span};

#[derive(Debug, Clone)]
pub struct HealthManagerConfig {
    /// How long a check result is reused before the checker runs again.
    pub cache_ttl: Duration,
    /// Deadline for a single checker invocation.
    pub check_timeout: Duration,
    /// Readiness before anyone calls `set_ready`.
    pub initially_ready: bool,
}

impl Default for HealthManagerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5),
            check_timeout: Duration::from_secs(30),
            initially_ready: true,
        }
    }
}

impl From<&HealthConfig> for HealthManagerConfig {
    fn from(config: &HealthConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            check_timeout: config.check_timeout(),
            initially_ready: config.initially_ready,
        }
    }
}

struct CachedResult {
    result: HealthResult,
    produced_at: Instant,
}

type InFlight = Shared<BoxFuture<'static, HealthResult>>;

/// Owns the registered checkers, runs them concurrently behind a per-check
/// cache, and folds the results with the configured strategy.
///
/// Neither map is locked across a check, so a slow checker never blocks
/// registration or readiness updates. A check runs on its own task bounded by
/// the check timeout and fills the cache even when every caller has gone
/// away; callers arriving meanwhile await the same run.
pub struct HealthManager {
    checkers: Arc<DashMap<String, Arc<dyn HealthChecker>>>,
    cache: Arc<DashMap<String, CachedResult>>,
    in_flight: Arc<DashMap<String, InFlight>>,
    strategy: Arc<dyn AggregationStrategy>,
    cache_ttl: Duration,
    check_timeout: Duration,
    ready: AtomicBool,
    controllers: RwLock<Vec<Arc<dyn ReadinessController>>>,
    metrics: Option<Arc<MetricsCollector>>,
    span: Span,
}

impl HealthManager {
    pub fn new(config: HealthManagerConfig, strategy: Arc<dyn AggregationStrategy>, span: Span) -> Self {
        Self {
            checkers: Arc::new(DashMap::new()),
            cache: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            strategy,
            cache_ttl: config.cache_ttl,
            check_timeout: config.check_timeout,
            ready: AtomicBool::new(config.initially_ready),
            controllers: RwLock::new(Vec::new()),
            metrics: None,
            span,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        metrics.update_ready(self.ready.load(Ordering::SeqCst));
        self.metrics = Some(metrics);
        self
    }

    /// Registers `checker` under its name. An existing checker with the same
    /// name is replaced.
    pub fn register_checker(&self, checker: Arc<dyn HealthChecker>) {
        let _enter = self.span.enter();
        let name = checker.name().to_string();

        if self.checkers.insert(name.clone(), checker).is_some() {
            warn!(check = %name, "health checker with name already exists, overwriting");
            self.cache.remove(&name);
            self.in_flight.remove(&name);
        }
        debug!(check = %name, "registered health checker");
    }

    pub fn register_checkers<I>(&self, checkers: I)
    where
        I: IntoIterator<Item = Arc<dyn HealthChecker>>,
    {
        for checker in checkers {
            self.register_checker(checker);
        }
    }

    pub fn unregister_checker(&self, name: &str) {
        let _enter = self.span.enter();
        let removed = self.checkers.remove(name).is_some();
        self.cache.remove(name);
        self.in_flight.remove(name);

        if removed {
            if let Some(metrics) = &self.metrics {
                metrics.remove_health_check(name);
            }
            debug!(check = %name, "unregistered health checker");
        }
    }

    pub fn checker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checkers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Runs every registered checker concurrently and waits for all of them.
    pub async fn check_all(&self) -> HealthResults {
        self.check_all_within(self.check_timeout).await
    }

    /// Like [`check_all`](Self::check_all), with each checker's deadline
    /// additionally capped at `budget`.
    pub async fn check_all_within(&self, budget: Duration) -> HealthResults {
        let deadline = budget.min(self.check_timeout);
        let checkers: Vec<(String, Arc<dyn HealthChecker>)> = self
            .checkers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let checks = checkers.into_iter().map(|(name, checker)| async move {
            let result = self.check_with_cache(&name, checker, deadline).await;
            (name, result)
        });

        join_all(checks)
            .instrument(self.span.clone())
            .await
            .into_iter()
            .collect()
    }

    async fn check_with_cache(
        &self,
        name: &str,
        checker: Arc<dyn HealthChecker>,
        deadline: Duration,
    ) -> HealthResult {
        if let Some(cached) = self.cached(name) {
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit(name);
            }
            return cached;
        }

        let run = match self.in_flight.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let check_run = CheckRun {
                    name: name.to_string(),
                    checker,
                    deadline,
                    checkers: self.checkers.clone(),
                    cache: self.cache.clone(),
                    in_flight: self.in_flight.clone(),
                    metrics: self.metrics.clone(),
                };
                let handle = tokio::spawn(check_run.run().instrument(self.span.clone()));
                let run = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => HealthResult::unhealthy("health check cancelled")
                            .with_detail("error", e.to_string()),
                    }
                }
                .boxed()
                .shared();
                entry.insert(run.clone());
                run
            }
        };

        run.await
    }

    fn cached(&self, name: &str) -> Option<HealthResult> {
        let entry = self.cache.get(name)?;
        if entry.produced_at.elapsed() < self.cache_ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub fn aggregate(&self, results: &HealthResults) -> HealthStatus {
        let status = self.strategy.aggregate(results);
        if let Some(metrics) = &self.metrics {
            metrics.update_overall_status(status);
        }
        status
    }

    pub async fn overall_status(&self) -> HealthStatus {
        let results = self.check_all().await;
        self.aggregate(&results)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn set_ready(&self, ready: bool) {
        let previous = self.ready.swap(ready, Ordering::SeqCst);
        if previous != ready {
            let _enter = self.span.enter();
            info!(ready, "application readiness changed");
        }
        if let Some(metrics) = &self.metrics {
            metrics.update_ready(ready);
        }
    }

    /// The readiness flag, further gated by every attached service controller.
    pub fn is_ready(&self) -> bool {
        if !self.ready.load(Ordering::SeqCst) {
            return false;
        }
        let controllers = self.controllers.read().unwrap_or_else(|e| e.into_inner());
        controllers.iter().all(|controller| controller.is_ready())
    }

    pub fn attach_readiness(&self, controller: Arc<dyn ReadinessController>) {
        let mut controllers = self.controllers.write().unwrap_or_else(|e| e.into_inner());
        controllers.push(controller);
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        let _enter = self.span.enter();
        debug!("health check cache cleared");
    }
}

/// One detached checker run. Owns everything it needs so the result lands in
/// the cache regardless of who is still waiting for it.
struct CheckRun {
    name: String,
    checker: Arc<dyn HealthChecker>,
    deadline: Duration,
    checkers: Arc<DashMap<String, Arc<dyn HealthChecker>>>,
    cache: Arc<DashMap<String, CachedResult>>,
    in_flight: Arc<DashMap<String, InFlight>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CheckRun {
    async fn run(self) -> HealthResult {
        let name = self.name.as_str();
        let start = Instant::now();
        let result = check_contained(self.checker.clone(), self.deadline)
            .await
            .with_duration(start.elapsed());

        if let Some(metrics) = &self.metrics {
            metrics.record_health_check(name, result.status, result.duration);
            for reason in ["panic", "timeout"] {
                if result.is_unhealthy() && result.details.contains_key(reason) {
                    metrics.record_health_check_failure(name, reason);
                }
            }
        }

        // Skip caching for a checker unregistered or replaced while it was running.
        let current = self
            .checkers
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &self.checker));
        if current {
            self.cache.insert(
                self.name.clone(),
                CachedResult {
                    result: result.clone(),
                    produced_at: Instant::now(),
                },
            );
            self.in_flight.remove(name);
        }

        if !result.is_healthy() {
            debug!(check = %name, status = %result.status, message = %result.message, "health check not healthy");
        }

        result
    }
}

impl Default for HealthManager {
    fn default() -> Self {
        Self::new(
            HealthManagerConfig::default(),
            Arc::new(AllHealthyStrategy),
            Span::none(),
        )
    }
}
