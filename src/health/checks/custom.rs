// src/health/checks/custom.rs
use crate::health::{HealthChecker, HealthResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::time::{timeout, Duration};

type CheckFn = Box<dyn Fn() -> BoxFuture<'static, HealthResult> + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Adapts an async closure into a [`HealthChecker`].
pub struct CustomCheck {
    name: String,
    check_fn: CheckFn,
    timeout: Duration,
}

impl CustomCheck {
    pub fn new<F, Fut>(name: impl Into<String>, check_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HealthResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            check_fn: Box::new(move || Box::pin(check_fn())),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthChecker for CustomCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> HealthResult {
        match timeout(self.timeout, (self.check_fn)()).await {
            Ok(result) => result,
            Err(_) => HealthResult::unhealthy("health check timeout")
                .with_detail("timeout", format!("{:?}", self.timeout)),
        }
    }
}
