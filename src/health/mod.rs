// src/health/mod.rs
mod checker;
mod checks;
mod manager;
mod status;
pub mod strategy;

use std::collections::HashMap;

pub use checker::{check_contained, HealthChecker, ReadinessController};
pub use checks::{CustomCheck, HttpCheck, TcpCheck};
pub use manager::{HealthManager, HealthManagerConfig};
pub use status::{ComponentImportance, HealthResult, HealthStatus};

/// Check results keyed by checker name.
pub type HealthResults = HashMap<String, HealthResult>;
