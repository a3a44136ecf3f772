// src/lib.rs
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod metrics;
mod panic;
pub mod server;
pub mod telemetry;

pub use health::{HealthChecker, HealthManager, HealthResult, HealthStatus};
pub use lifecycle::{App, AppOptions, Outcome, Service};
