// src/health/strategy/majority.rs
use crate::health::strategy::AggregationStrategy;
use crate::health::{HealthResults, HealthStatus};

/// Follows a strict majority of checks; anything short of one is `Degraded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MajorityHealthyStrategy;

impl AggregationStrategy for MajorityHealthyStrategy {
    fn aggregate(&self, results: &HealthResults) -> HealthStatus {
        if results.is_empty() {
            return HealthStatus::Healthy;
        }

        let (mut healthy, mut unhealthy) = (0usize, 0usize);
        for result in results.values() {
            match result.status {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Unhealthy => unhealthy += 1,
                HealthStatus::Degraded => {}
            }
        }

        let majority = results.len() / 2 + 1;
        if unhealthy >= majority {
            HealthStatus::Unhealthy
        } else if healthy >= majority {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    fn name(&self) -> &'static str {
        "majority_healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::strategy::tests::results;
    use HealthStatus::{Degraded, Healthy, Unhealthy};

    fn aggregate(input: &[(&str, HealthStatus)]) -> HealthStatus {
        MajorityHealthyStrategy.aggregate(&results(input))
    }

    #[test]
    fn test_majority_outcomes() {
        assert_eq!(aggregate(&[]), Healthy);
        assert_eq!(aggregate(&[("a", Unhealthy), ("b", Unhealthy), ("c", Healthy)]), Unhealthy);
        assert_eq!(aggregate(&[("a", Healthy), ("b", Healthy), ("c", Unhealthy)]), Healthy);
        assert_eq!(aggregate(&[("a", Healthy)]), Healthy);
    }

    #[test]
    fn test_no_strict_majority_is_degraded() {
        assert_eq!(aggregate(&[("a", Healthy), ("b", Unhealthy)]), Degraded);
        assert_eq!(aggregate(&[("a", Degraded), ("b", Degraded), ("c", Healthy)]), Degraded);
        assert_eq!(
            aggregate(&[("a", Healthy), ("b", Healthy), ("c", Unhealthy), ("d", Unhealthy)]),
            Degraded
        );
    }
}
