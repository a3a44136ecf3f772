// src/lifecycle/mod.rs
mod app;
mod error;
mod service;
mod signals;
mod state;

pub use app::{App, AppOptions, Outcome, EXIT_APPLICATION_ERROR, EXIT_OK, EXIT_WATCHDOG};
pub use error::{Cancelled, LifecycleError};
pub use service::Service;
pub use state::{ServiceState, ServiceStates};
