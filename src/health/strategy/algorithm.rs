// src/health/strategy/algorithm.rs
use crate::health::{HealthResults, HealthStatus};

/// Folds the per-check results of one evaluation into an overall status.
///
/// Implementations are pure and must map an empty set of results to
/// `Healthy`.
pub trait AggregationStrategy: Send + Sync {
    fn aggregate(&self, results: &HealthResults) -> HealthStatus;

    fn name(&self) -> &'static str;
}
