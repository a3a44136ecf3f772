// src/health/strategy/mod.rs
mod algorithm;
mod all_healthy;
mod majority;
mod weighted;

pub use algorithm::AggregationStrategy; // trait
pub use all_healthy::AllHealthyStrategy;
pub use majority::MajorityHealthyStrategy;
pub use weighted::WeightedStrategy;
pub use crate::config::StrategyKind;

use crate::health::ComponentImportance;
use std::collections::HashMap;
use std::sync::Arc;

pub fn create_strategy(
    kind: StrategyKind,
    weights: &HashMap<String, ComponentImportance>,
) -> Arc<dyn AggregationStrategy> {
    match kind {
        StrategyKind::AllHealthy => Arc::new(AllHealthyStrategy),
        StrategyKind::MajorityHealthy => Arc::new(MajorityHealthyStrategy),
        StrategyKind::Weighted => Arc::new(WeightedStrategy::new(weights.clone())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::health::{HealthResult, HealthResults, HealthStatus};
    use proptest::prelude::*;

    pub(crate) fn results(entries: &[(&str, HealthStatus)]) -> HealthResults {
        entries
            .iter()
            .map(|(name, status)| (name.to_string(), HealthResult::new(*status, "test")))
            .collect()
    }

    fn status() -> impl Strategy<Value = HealthStatus> {
        prop_oneof![
            Just(HealthStatus::Healthy),
            Just(HealthStatus::Degraded),
            Just(HealthStatus::Unhealthy),
        ]
    }

    fn all_strategies() -> Vec<Arc<dyn AggregationStrategy>> {
        let weights = HashMap::new();
        vec![
            create_strategy(StrategyKind::AllHealthy, &weights),
            create_strategy(StrategyKind::MajorityHealthy, &weights),
            create_strategy(StrategyKind::Weighted, &weights),
        ]
    }

    #[test]
    fn test_factory_names() {
        let names: Vec<_> = all_strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["all_healthy", "majority_healthy", "weighted"]);
    }

    #[test]
    fn test_empty_results_are_healthy_for_every_strategy() {
        for strategy in all_strategies() {
            assert_eq!(strategy.aggregate(&HealthResults::new()), HealthStatus::Healthy, "{}", strategy.name());
        }
    }

    proptest! {
        #[test]
        fn all_healthy_any_unhealthy_wins(
            statuses in prop::collection::vec(status(), 0..12),
            position in any::<prop::sample::Index>(),
        ) {
            let mut statuses = statuses;
            let at = position.index(statuses.len() + 1);
            statuses.insert(at, HealthStatus::Unhealthy);
            let input: HealthResults = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("check{i}"), HealthResult::new(*s, "p")))
                .collect();

            prop_assert_eq!(AllHealthyStrategy.aggregate(&input), HealthStatus::Unhealthy);
        }

        #[test]
        fn all_healthy_is_worst_status(statuses in prop::collection::vec(status(), 1..12)) {
            let input: HealthResults = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("check{i}"), HealthResult::new(*s, "p")))
                .collect();
            let worst = statuses.iter().copied().max().unwrap();

            prop_assert_eq!(AllHealthyStrategy.aggregate(&input), worst);
        }

        #[test]
        fn weighted_defaults_match_important_everywhere(statuses in prop::collection::vec(status(), 0..12)) {
            let input: HealthResults = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("check{i}"), HealthResult::new(*s, "p")))
                .collect();
            let expected = if statuses.iter().any(|s| *s != HealthStatus::Healthy) {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };

            prop_assert_eq!(WeightedStrategy::default().aggregate(&input), expected);
        }
    }
}
