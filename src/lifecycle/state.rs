// src/lifecycle/state.rs
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ServiceState {
    Registered,
    Running,
    ShuttingDown,
    Stopped,
    Failed(String),
}

impl ServiceState {
    fn rank(&self) -> u8 {
        match self {
            Self::Registered => 0,
            Self::Running => 1,
            Self::ShuttingDown => 2,
            Self::Stopped => 3,
            Self::Failed(_) => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Shared, cloneable view of every service's lifecycle state.
///
/// Transitions only move forward (`Registered → Running → ShuttingDown →
/// Stopped`), `Failed` is terminal, so the runner and shutdown tasks of one
/// service can report in any order.
#[derive(Debug, Clone, Default)]
pub struct ServiceStates {
    inner: Arc<DashMap<String, ServiceState>>,
}

impl ServiceStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, service: &str) {
        self.inner.insert(service.to_string(), ServiceState::Registered);
    }

    pub(crate) fn contains(&self, service: &str) -> bool {
        self.inner.contains_key(service)
    }

    /// Applies `next` unless it would move the service backwards.
    pub(crate) fn advance(&self, service: &str, next: ServiceState) -> bool {
        match self.inner.get_mut(service) {
            Some(mut current) if next.rank() > current.rank() => {
                *current = next;
                true
            }
            Some(_) => false,
            None => {
                self.inner.insert(service.to_string(), next);
                true
            }
        }
    }

    pub fn get(&self, service: &str) -> Option<ServiceState> {
        self.inner.get(service).map(|state| state.clone())
    }

    /// Snapshot sorted by service name.
    pub fn snapshot(&self) -> Vec<(String, ServiceState)> {
        let mut states: Vec<_> = self
            .inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
