// src/config/models.rs
use crate::health::ComponentImportance;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub version: String,
    pub logger: LoggerConfig,
    pub lifecycle: LifecycleConfig,
    pub observability: ObservabilityConfig,
    pub checks: ChecksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "app".to_string(),
            version: String::new(),
            logger: LoggerConfig::default(),
            lifecycle: LifecycleConfig::default(),
            observability: ObservabilityConfig::default(),
            checks: ChecksConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.app_name.is_empty() {
            bail!("app_name must not be empty");
        }
        self.lifecycle.validate()?;
        self.observability.validate()?;
        self.checks.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    pub dev_mode: bool,
    /// Overrides the format implied by `dev_mode`.
    pub format: Option<LogFormat>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dev_mode: false,
            format: None,
        }
    }
}

impl LoggerConfig {
    pub fn format(&self) -> LogFormat {
        match self.format {
            Some(format) => format,
            None if self.dev_mode => LogFormat::Pretty,
            None => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub shutdown_timeout_secs: u64,
    pub watchdog_margin_secs: u64,
    pub stop_all_on_error: bool,
    pub trap_signals: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 5,
            watchdog_margin_secs: 5,
            stop_all_on_error: true,
            trap_signals: true,
        }
    }
}

impl LifecycleConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn watchdog_margin(&self) -> Duration {
        Duration::from_secs(self.watchdog_margin_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.shutdown_timeout_secs == 0 {
            bail!("lifecycle.shutdown_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub metrics: MetricsConfig,
    pub health: HealthConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 9090,
            metrics: MetricsConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl ObservabilityConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("observability.port must not be zero");
        }

        let mut paths = vec![
            ("health.live_path", self.health.live_path.as_str()),
            ("health.ready_path", self.health.ready_path.as_str()),
            ("health.check_path", self.health.check_path.as_str()),
        ];
        if self.metrics.enabled {
            paths.push(("metrics.path", self.metrics.path.as_str()));
        }

        for (i, (key, path)) in paths.iter().enumerate() {
            if !path.starts_with('/') {
                bail!("observability.{} must start with '/': {}", key, path);
            }
            if paths[..i].iter().any(|(_, other)| other == path) {
                bail!("observability.{} duplicates another endpoint path: {}", key, path);
            }
        }

        self.health.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    AllHealthy,
    MajorityHealthy,
    Weighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub live_path: String,
    pub ready_path: String,
    pub check_path: String,
    /// Request budget for the readiness and detail endpoints.
    pub timeout_secs: u64,
    pub cache_ttl_ms: u64,
    pub check_timeout_secs: u64,
    pub initially_ready: bool,
    pub strategy: StrategyKind,
    pub weights: HashMap<String, ComponentImportance>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            live_path: "/health/live".to_string(),
            ready_path: "/health/ready".to_string(),
            check_path: "/health/checks".to_string(),
            timeout_secs: 30,
            cache_ttl_ms: 5000,
            check_timeout_secs: 30,
            initially_ready: true,
            strategy: StrategyKind::AllHealthy,
            weights: HashMap::new(),
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.check_timeout_secs == 0 {
            bail!("observability.health timeouts must be greater than zero");
        }
        if self.cache_ttl_ms == 0 {
            bail!("observability.health.cache_ttl_ms must be greater than zero");
        }
        if !self.weights.is_empty() && self.strategy != StrategyKind::Weighted {
            tracing::warn!(
                strategy = ?self.strategy,
                "health weights are ignored unless the weighted strategy is selected"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub http: Vec<HttpCheckConfig>,
    pub tcp: Vec<TcpCheckConfig>,
}

impl ChecksConfig {
    fn validate(&self) -> Result<()> {
        for check in &self.http {
            if check.name.is_empty() {
                bail!("http check for {} has no name", check.url);
            }
            if check.timeout_secs == 0 {
                bail!("http check {} must have a non-zero timeout", check.name);
            }
        }
        for check in &self.tcp {
            if check.name.is_empty() || check.address.is_empty() {
                bail!("tcp checks require both name and address");
            }
            if check.timeout_secs == 0 {
                bail!("tcp check {} must have a non-zero timeout", check.name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCheckConfig {
    pub name: String,
    pub url: Url,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default)]
    pub expected_body: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl HttpCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpCheckConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_tcp_timeout_secs")]
    pub timeout_secs: u64,
}

impl TcpCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_tcp_timeout_secs() -> u64 {
    5
}

fn default_expected_status() -> u16 {
    200
}

fn default_method() -> String {
    "GET".to_string()
}
