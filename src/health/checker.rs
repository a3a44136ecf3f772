// src/health/checker.rs
use crate::health::HealthResult;
use crate::panic::panic_message;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::task::AbortOnDropHandle;
use tracing::warn;

/// A named health check for one component or dependency.
///
/// `check` must always produce a result: failures are reported as an
/// `Unhealthy` result carrying an `error` detail. Deadlines and panics are
/// handled by the caller through [`check_contained`], so a checker can simply
/// be dropped mid-flight.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Stable identity, used as the key for results and caching.
    fn name(&self) -> &str;

    async fn check(&self) -> HealthResult;
}

/// Capability for services that gate application readiness.
pub trait ReadinessController: Send + Sync {
    fn set_ready(&self, ready: bool);
    fn is_ready(&self) -> bool;
}

/// Runs `checker` on its own task bounded by `deadline`.
///
/// A panicking checker yields `Unhealthy` with a `panic` detail, an overdue
/// one is aborted and yields `Unhealthy` with a `timeout` detail. Dropping
/// the returned future aborts the check.
pub async fn check_contained(checker: Arc<dyn HealthChecker>, deadline: Duration) -> HealthResult {
    let name = checker.name().to_string();
    let mut task = AbortOnDropHandle::new(tokio::spawn(async move { checker.check().await }));

    match timeout(deadline, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            warn!(check = %name, panic = %message, "health check panicked");
            HealthResult::unhealthy("panic during health check").with_detail("panic", message)
        }
        Ok(Err(e)) => HealthResult::unhealthy("health check cancelled").with_detail("error", e.to_string()),
        Err(_) => {
            task.abort();
            warn!(check = %name, timeout = ?deadline, "health check timed out");
            HealthResult::unhealthy("health check timeout")
                .with_detail("timeout", format!("{:?}", deadline))
        }
    }
}
