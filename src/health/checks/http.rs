// src/health/checks/http.rs
use crate::config::HttpCheckConfig;
use crate::health::{HealthChecker, HealthResult};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::Duration;
use url::Url;

/// Calls an HTTP endpoint and compares status code and, optionally, body.
///
/// A response slower than half the timeout is reported as `Degraded`.
pub struct HttpCheck {
    name: String,
    url: Url,
    method: Method,
    expected_status: u16,
    expected_body: Option<String>,
    headers: HashMap<String, String>,
    timeout: Duration,
    client: Client,
}

impl HttpCheck {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            method: Method::GET,
            expected_status: 200,
            expected_body: None,
            headers: HashMap::new(),
            timeout: Duration::from_secs(10),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &HttpCheckConfig) -> anyhow::Result<Self> {
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())?;
        Ok(Self::new(config.name.clone(), config.url.clone())
            .with_method(method)
            .with_expected_status(config.expected_status)
            .with_expected_body(config.expected_body.clone())
            .with_headers(config.headers.clone())
            .with_timeout(config.timeout()))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_expected_body(mut self, body: Option<String>) -> Self {
        self.expected_body = body.filter(|b| !b.is_empty());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn failure(&self, message: &str, duration: Duration) -> HealthResult {
        HealthResult::unhealthy(message)
            .with_detail("url", self.url.as_str())
            .with_detail("duration", format!("{:?}", duration))
            .with_duration(duration)
    }
}

#[async_trait]
impl HealthChecker for HttpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> HealthResult {
        let start = Instant::now();

        let mut request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .timeout(self.timeout);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return self
                    .failure("HTTP request timeout", start.elapsed())
                    .with_detail("timeout", format!("{:?}", self.timeout));
            }
            Err(e) => {
                return self
                    .failure("HTTP request failed", start.elapsed())
                    .with_detail("error", e.to_string());
            }
        };

        let status = response.status().as_u16();
        if status != self.expected_status {
            return self
                .failure("unexpected HTTP status code", start.elapsed())
                .with_detail("expected_status", self.expected_status)
                .with_detail("actual_status", status);
        }

        if let Some(expected) = &self.expected_body {
            match response.text().await {
                Ok(body) if body.contains(expected.as_str()) => {}
                Ok(body) => {
                    return self
                        .failure("HTTP response body does not contain expected content", start.elapsed())
                        .with_detail("expected_body", expected.as_str())
                        .with_detail("actual_body", body);
                }
                Err(e) => {
                    return self
                        .failure("failed to read HTTP response body", start.elapsed())
                        .with_detail("error", e.to_string());
                }
            }
        }

        let duration = start.elapsed();
        let threshold = self.timeout / 2;
        let result = if duration > threshold {
            HealthResult::degraded("HTTP endpoint is slow")
                .with_detail("threshold", format!("{:?}", threshold))
        } else {
            HealthResult::healthy("HTTP endpoint is healthy")
        };

        result
            .with_detail("status_code", status)
            .with_detail("url", self.url.as_str())
            .with_detail("duration", format!("{:?}", duration))
            .with_duration(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    fn check_for(server: &mockito::ServerGuard, path: &str) -> HttpCheck {
        let url = Url::parse(&server.url()).unwrap().join(path).unwrap();
        HttpCheck::new("upstream", url)
    }

    #[tokio::test]
    async fn test_http_check_healthy() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let result = check_for(&server, "/ping").check().await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details["status_code"], 200);
        mock.assert();
    }

    #[tokio::test]
    async fn test_http_check_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ping")
            .with_status(503)
            .create_async()
            .await;

        let result = check_for(&server, "/ping").check().await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert_eq!(result.details["expected_status"], 200);
        assert_eq!(result.details["actual_status"], 503);
    }

    #[tokio::test]
    async fn test_http_check_expected_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body("state=starting")
            .create_async()
            .await;

        let result = check_for(&server, "/status")
            .with_expected_body(Some("state=ok".to_string()))
            .check()
            .await;

        assert!(result.is_unhealthy());
        assert_eq!(result.details["actual_body"], "state=starting");
    }

    #[tokio::test]
    async fn test_http_check_connection_refused() {
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let result = HttpCheck::new("closed", url)
            .with_timeout(Duration::from_secs(2))
            .check()
            .await;

        assert!(result.is_unhealthy());
        assert!(result.details.contains_key("error") || result.details.contains_key("timeout"));
    }
}
