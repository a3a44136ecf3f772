// src/server/handler.rs
use crate::config::ObservabilityConfig;
use crate::health::{HealthManager, HealthStatus};
use crate::metrics::MetricsRegistry;
use chrono::{SecondsFormat, Utc};
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;
use tracing::{debug, error};

#[derive(Debug, Clone)]
struct Routes {
    health_enabled: bool,
    live: String,
    ready: String,
    checks: String,
    metrics: Option<String>,
}

/// Routes liveness, readiness, check detail and metrics requests.
#[derive(Clone)]
pub struct ObservabilityHandler {
    health: Arc<HealthManager>,
    metrics: Option<Arc<MetricsRegistry>>,
    routes: Arc<Routes>,
    request_timeout: Duration,
}

impl ObservabilityHandler {
    pub fn new(
        config: &ObservabilityConfig,
        health: Arc<HealthManager>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        let routes = Routes {
            health_enabled: config.health.enabled,
            live: config.health.live_path.clone(),
            ready: config.health.ready_path.clone(),
            checks: config.health.check_path.clone(),
            metrics: metrics.as_ref().map(|_| config.metrics.path.clone()),
        };

        Self {
            health,
            metrics,
            routes: Arc::new(routes),
            request_timeout: config.health.timeout(),
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let path = req.uri().path();
        let routes = &self.routes;

        let is_health_path = routes.health_enabled
            && (path == routes.live || path == routes.ready || path == routes.checks);
        let is_metrics_path = routes.metrics.as_deref() == Some(path);

        if !is_health_path && !is_metrics_path {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }
        if req.method() != Method::GET {
            let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers_mut()
                .insert(ALLOW, hyper::header::HeaderValue::from_static("GET"));
            return response;
        }

        if is_metrics_path {
            return self.metrics();
        }
        if path == routes.live {
            return self.liveness();
        }
        if path == routes.ready {
            return self.readiness().await;
        }
        self.checks().await
    }

    fn liveness(&self) -> Response<Body> {
        json_response(
            StatusCode::OK,
            &json!({
                "status": "alive",
                "timestamp": timestamp(),
            }),
        )
    }

    async fn readiness(&self) -> Response<Body> {
        let manager_ready = self.health.is_ready();
        let results = self.health.check_all_within(self.request_timeout).await;
        let status = self.health.aggregate(&results);
        let ready = manager_ready && status != HealthStatus::Unhealthy;

        debug!(ready, manager_ready, %status, "readiness request");

        let code = if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        json_response(
            code,
            &json!({
                "status": status,
                "ready": ready,
                "timestamp": timestamp(),
                "manager_ready": manager_ready,
            }),
        )
    }

    async fn checks(&self) -> Response<Body> {
        let results = self.health.check_all_within(self.request_timeout).await;
        let status = self.health.aggregate(&results);

        let code = if status == HealthStatus::Unhealthy {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };
        json_response(
            code,
            &json!({
                "status": status,
                "timestamp": timestamp(),
                "check_count": results.len(),
                "checks": results,
                "ready": self.health.is_ready(),
            }),
        )
    }

    fn metrics(&self) -> Response<Body> {
        let Some(registry) = &self.metrics else {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        };

        match registry.gather() {
            Ok(buffer) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Body::from(buffer))
                .unwrap_or_else(|_| internal_error()),
            Err(e) => {
                error!(error = %e, "failed to encode metrics");
                internal_error()
            }
        }
    }
}

impl Service<Request<Body>> for ObservabilityHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .unwrap_or_else(|_| internal_error()),
        Err(e) => {
            error!(error = %e, "failed to serialize health response");
            internal_error()
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

fn internal_error() -> Response<Body> {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
