// src/lifecycle/error.rs
use std::time::Duration;
use thiserror::Error;

/// Failures collected by [`App::run`](crate::lifecycle::App::run).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("service '{service}' failed: {source:#}")]
    ServiceFailed {
        service: String,
        source: anyhow::Error,
    },

    #[error("service '{service}' panicked: {message}")]
    ServicePanicked { service: String, message: String },

    #[error("service '{service}' failed to shut down: {source:#}")]
    ShutdownFailed {
        service: String,
        source: anyhow::Error,
    },

    #[error("service '{service}' did not shut down within {timeout:?}")]
    ShutdownTimeout { service: String, timeout: Duration },
}

impl LifecycleError {
    pub fn service(&self) -> &str {
        match self {
            Self::ServiceFailed { service, .. }
            | Self::ServicePanicked { service, .. }
            | Self::ShutdownFailed { service, .. }
            | Self::ShutdownTimeout { service, .. } => service,
        }
    }

    /// Label used for the `kind` dimension of the service error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceFailed { .. } => "error",
            Self::ServicePanicked { .. } => "panic",
            Self::ShutdownFailed { .. } | Self::ShutdownTimeout { .. } => "shutdown",
        }
    }
}

/// Returned by a service's `run` when it stopped because its shutdown token
/// was cancelled. Treated as a graceful stop, not a failure.
#[derive(Debug, Clone, Copy, Error)]
#[error("service cancelled")]
pub struct Cancelled;
