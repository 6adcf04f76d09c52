//! telemetry - 可观测性库
//!
//! 日志初始化、Prometheus 导出器以及准入决策指标

use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 决策计数器
pub const DECISIONS_TOTAL: &str = "mcv_webhook_decisions_total";
/// 决策耗时直方图
pub const DECISION_DURATION_SECONDS: &str = "mcv_webhook_decision_duration_seconds";
/// HTTP 请求计数器
pub const HTTP_REQUESTS_TOTAL: &str = "mcv_http_requests_total";

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 记录一次准入决策
pub fn record_decision(webhook: &str, verdict: &'static str, elapsed: Duration) {
    metrics::counter!(
        DECISIONS_TOTAL,
        "webhook" => webhook.to_string(),
        "verdict" => verdict
    )
    .increment(1);
    metrics::histogram!(DECISION_DURATION_SECONDS, "webhook" => webhook.to_string())
        .record(elapsed.as_secs_f64());
}

/// 记录一次 HTTP 请求
pub fn record_http_request(path: &str, status: u16) {
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 健康检查状态
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            healthy: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, name: impl Into<String>, healthy: bool, message: Option<String>) {
        if !healthy {
            self.healthy = false;
        }
        self.checks.push(HealthCheck {
            name: name.into(),
            healthy,
            message,
        });
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}
