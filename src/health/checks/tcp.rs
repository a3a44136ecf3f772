// src/health/checks/tcp.rs
use crate::config::TcpCheckConfig;
use crate::health::{HealthChecker, HealthResult};
use async_trait::async_trait;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// Reachability ping for a dependency that speaks TCP (database, cache, broker).
pub struct TcpCheck {
    name: String,
    address: String,
    timeout: Duration,
}

impl TcpCheck {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &TcpCheckConfig) -> Self {
        Self::new(config.name.clone(), config.address.clone()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthChecker for TcpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> HealthResult {
        let start = Instant::now();
        let outcome = timeout(self.timeout, TcpStream::connect(&self.address)).await;
        let duration = start.elapsed();

        let result = match outcome {
            Err(_) => HealthResult::unhealthy("connection timeout")
                .with_detail("timeout", format!("{:?}", self.timeout)),
            Ok(Err(e)) => HealthResult::unhealthy("connection failed").with_detail("error", e.to_string()),
            Ok(Ok(_stream)) if duration > self.timeout / 2 => HealthResult::degraded("connection slow")
                .with_detail("threshold", format!("{:?}", self.timeout / 2)),
            Ok(Ok(_stream)) => HealthResult::healthy("connection successful"),
        };

        result
            .with_detail("address", self.address.as_str())
            .with_detail("duration", format!("{:?}", duration))
            .with_duration(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_check_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let result = TcpCheck::new("db", address.clone()).check().await;

        assert!(result.is_healthy());
        assert_eq!(result.details["address"], address);
    }

    #[tokio::test]
    async fn test_tcp_check_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpCheck::new("db", address).check().await;

        assert!(result.is_unhealthy());
    }
}
