//! HTTP 路由
//!
//! 每个策略一个 POST 路由，另有健康检查与 Prometheus 端点

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mcv_telemetry::HealthStatus;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

use crate::dispatcher::Dispatcher;
use crate::middleware::track_http;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new();
    for policy in state.dispatcher.policies().iter() {
        router = router.route(&policy.uri(), post(admission_review));
    }

    router
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(metrics))
        // 未知路径同样返回 AdmissionReview 形态的 404
        .fallback(admission_review)
        .layer(middleware::from_fn(track_http))
        .with_state(state)
}

async fn admission_review(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let outcome = state
        .dispatcher
        .dispatch(uri.path(), content_type, &body)
        .await;
    (outcome.status, Json(outcome.review)).into_response()
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let policies = state.dispatcher.policies();
    let mut status = HealthStatus::new();
    let message = policies
        .is_empty()
        .then(|| "no webhooks enabled".to_string());
    status.add_check("policies", !policies.is_empty(), message);

    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let checks: Vec<_> = status
        .checks
        .iter()
        .map(|c| json!({"name": c.name, "healthy": c.healthy, "message": c.message}))
        .collect();
    (
        code,
        Json(json!({
            "ready": status.healthy,
            "webhooks": policies.len(),
            "checks": checks,
        })),
    )
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}
