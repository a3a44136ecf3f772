// src/health/strategy/weighted.rs
use crate::health::strategy::AggregationStrategy;
use crate::health::{ComponentImportance, HealthResults, HealthStatus};
use std::collections::HashMap;

/// Weighs each check by the importance of the component it covers.
///
/// Unlisted components count as `Important`.
#[derive(Debug, Default, Clone)]
pub struct WeightedStrategy {
    weights: HashMap<String, ComponentImportance>,
}

impl WeightedStrategy {
    pub fn new(weights: HashMap<String, ComponentImportance>) -> Self {
        Self { weights }
    }

    pub fn importance(&self, name: &str) -> ComponentImportance {
        self.weights.get(name).copied().unwrap_or_default()
    }
}

impl AggregationStrategy for WeightedStrategy {
    fn aggregate(&self, results: &HealthResults) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;

        for (name, result) in results {
            match (result.status, self.importance(name)) {
                (HealthStatus::Unhealthy, ComponentImportance::Critical) => {
                    return HealthStatus::Unhealthy;
                }
                (HealthStatus::Unhealthy, ComponentImportance::Optional) => {}
                (HealthStatus::Unhealthy, _) | (HealthStatus::Degraded, _) => {
                    overall = HealthStatus::Degraded;
                }
                (HealthStatus::Healthy, _) => {}
            }
        }

        overall
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::strategy::tests::results;
    use HealthStatus::{Degraded, Healthy, Unhealthy};

    fn strategy() -> WeightedStrategy {
        WeightedStrategy::new(HashMap::from([
            ("database".to_string(), ComponentImportance::Critical),
            ("cache".to_string(), ComponentImportance::Important),
            ("metrics".to_string(), ComponentImportance::Optional),
        ]))
    }

    #[test]
    fn test_critical_unhealthy_is_unhealthy() {
        let input = results(&[("database", Unhealthy), ("cache", Healthy), ("metrics", Healthy)]);
        assert_eq!(strategy().aggregate(&input), Unhealthy);
    }

    #[test]
    fn test_important_unhealthy_is_degraded() {
        let input = results(&[("database", Healthy), ("cache", Unhealthy)]);
        assert_eq!(strategy().aggregate(&input), Degraded);
    }

    #[test]
    fn test_optional_unhealthy_alone_is_ignored() {
        let input = results(&[("database", Healthy), ("metrics", Unhealthy)]);
        assert_eq!(strategy().aggregate(&input), Healthy);
    }

    #[test]
    fn test_degraded_anywhere_is_degraded() {
        let input = results(&[("database", Healthy), ("metrics", Degraded)]);
        assert_eq!(strategy().aggregate(&input), Degraded);
    }

    #[test]
    fn test_unknown_component_defaults_to_important() {
        let input = results(&[("database", Healthy), ("unknown-service", Unhealthy)]);
        assert_eq!(strategy().importance("unknown-service"), ComponentImportance::Important);
        assert_eq!(strategy().aggregate(&input), Degraded);
    }
}
