// src/metrics/collector.rs
use crate::health::HealthStatus;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Health check metrics
    pub health_check_duration_seconds: HistogramVec,
    pub health_check_status: IntGaugeVec,
    pub health_check_cache_hits_total: IntCounterVec,
    pub health_check_failures_total: IntCounterVec,
    pub health_overall_status: IntGauge,
    pub ready: IntGauge,

    // Service lifecycle metrics
    pub service_running: IntGaugeVec,
    pub service_errors_total: IntCounterVec,
    pub service_shutdown_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        // Health check metrics
        let health_check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "app_health_check_duration_seconds",
                "Health check duration in seconds",
            ),
            &["check"],
        )?;
        registry.register(Box::new(health_check_duration_seconds.clone()))?;

        let health_check_status = IntGaugeVec::new(
            Opts::new(
                "app_health_check_status",
                "Health check status (0=healthy, 1=degraded, 2=unhealthy)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(health_check_status.clone()))?;

        let health_check_cache_hits_total = IntCounterVec::new(
            Opts::new(
                "app_health_check_cache_hits_total",
                "Health check results served from cache",
            ),
            &["check"],
        )?;
        registry.register(Box::new(health_check_cache_hits_total.clone()))?;

        let health_check_failures_total = IntCounterVec::new(
            Opts::new(
                "app_health_check_failures_total",
                "Health checks that panicked or timed out",
            ),
            &["check", "reason"],
        )?;
        registry.register(Box::new(health_check_failures_total.clone()))?;

        let health_overall_status = IntGauge::new(
            "app_health_overall_status",
            "Aggregated health status (0=healthy, 1=degraded, 2=unhealthy)",
        )?;
        registry.register(Box::new(health_overall_status.clone()))?;

        let ready = IntGauge::new("app_ready", "Application readiness flag (1=ready, 0=not ready)")?;
        registry.register(Box::new(ready.clone()))?;

        // Service lifecycle metrics
        let service_running = IntGaugeVec::new(
            Opts::new("app_service_running", "Service run state (1=running, 0=stopped)"),
            &["service"],
        )?;
        registry.register(Box::new(service_running.clone()))?;

        let service_errors_total = IntCounterVec::new(
            Opts::new("app_service_errors_total", "Service run and shutdown errors"),
            &["service", "kind"],
        )?;
        registry.register(Box::new(service_errors_total.clone()))?;

        let service_shutdown_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "app_service_shutdown_duration_seconds",
                "Service shutdown duration in seconds",
            ),
            &["service", "result"],
        )?;
        registry.register(Box::new(service_shutdown_duration_seconds.clone()))?;

        Ok(Self {
            health_check_duration_seconds,
            health_check_status,
            health_check_cache_hits_total,
            health_check_failures_total,
            health_overall_status,
            ready,
            service_running,
            service_errors_total,
            service_shutdown_duration_seconds,
        })
    }

    pub fn record_health_check(&self, check: &str, status: HealthStatus, duration: Duration) {
        self.health_check_duration_seconds
            .with_label_values(&[check])
            .observe(duration.as_secs_f64());

        self.health_check_status
            .with_label_values(&[check])
            .set(status.as_gauge());
    }

    pub fn record_health_check_failure(&self, check: &str, reason: &str) {
        self.health_check_failures_total
            .with_label_values(&[check, reason])
            .inc();
    }

    pub fn record_cache_hit(&self, check: &str) {
        self.health_check_cache_hits_total
            .with_label_values(&[check])
            .inc();
    }

    pub fn remove_health_check(&self, check: &str) {
        let _ = self.health_check_status.remove_label_values(&[check]);
    }

    pub fn update_overall_status(&self, status: HealthStatus) {
        self.health_overall_status.set(status.as_gauge());
    }

    pub fn update_ready(&self, ready: bool) {
        self.ready.set(if ready { 1 } else { 0 });
    }

    pub fn update_service_running(&self, service: &str, running: bool) {
        let value = if running { 1 } else { 0 };
        self.service_running
            .with_label_values(&[service])
            .set(value);
    }

    pub fn record_service_error(&self, service: &str, kind: &str) {
        self.service_errors_total
            .with_label_values(&[service, kind])
            .inc();
    }

    pub fn record_shutdown(&self, service: &str, result: &str, duration: Duration) {
        self.service_shutdown_duration_seconds
            .with_label_values(&[service, result])
            .observe(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_recorded_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_health_check("database", HealthStatus::Degraded, Duration::from_millis(12));
        metrics.update_service_running("worker", true);
        metrics.update_ready(true);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("app_health_check_status{check=\"database\"} 1"));
        assert!(text.contains("app_service_running{service=\"worker\"} 1"));
        assert!(text.contains("app_ready 1"));
    }
}
