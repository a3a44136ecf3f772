// src/health/strategy/all_healthy.rs
use crate::health::strategy::AggregationStrategy;
use crate::health::{HealthResults, HealthStatus};

/// Worst status wins: any unhealthy check makes the application unhealthy.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllHealthyStrategy;

impl AggregationStrategy for AllHealthyStrategy {
    fn aggregate(&self, results: &HealthResults) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;

        for result in results.values() {
            match result.status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => overall = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }

        overall
    }

    fn name(&self) -> &'static str {
        "all_healthy"
    }
}
