//! 中间件

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use mcv_telemetry::record_http_request;
use tracing::debug;

/// 未命中任何路由时使用的路径标签
const UNMATCHED_PATH: &str = "unmatched";

/// HTTP 请求指标中间件
///
/// 以路由模板作为标签，避免任意路径导致标签基数膨胀
pub async fn track_http(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());
    let method = request.method().clone();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    debug!(%method, path = %path, status, "request completed");
    record_http_request(&path, status);
    response
}
