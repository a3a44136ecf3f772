// src/lifecycle/service.rs
use crate::health::{HealthChecker, ReadinessController};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A long-running unit of work managed by [`App`](crate::lifecycle::App).
///
/// `run` blocks until `shutdown` is cancelled or the service hits a fatal
/// error. Returning [`Cancelled`](crate::lifecycle::Cancelled) after
/// cancellation counts as a graceful stop. `shutdown` is invoked once the
/// shared token is cancelled, on a separate task, and is bounded by the
/// application's shutdown timeout.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()>;

    async fn shutdown(&self) -> anyhow::Result<()>;

    /// Checks registered into the health manager when the service is added.
    fn health_checks(&self) -> Vec<Arc<dyn HealthChecker>> {
        Vec::new()
    }

    /// When present, gates application readiness.
    fn readiness_controller(&self) -> Option<Arc<dyn ReadinessController>> {
        None
    }
}
