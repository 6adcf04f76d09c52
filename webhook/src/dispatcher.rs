//! 请求分发
//!
//! 按 URI 找到策略，解码并校验 AdmissionReview，在阻塞线程池上带超时执行决策

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use mcv_admission::{AdmissionReview, Decision, Operation};
use mcv_errors::AppError;
use mcv_policy::{FailurePolicy, Policy, PolicySet};
use mcv_telemetry::record_decision;
use tracing::{error, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json";

/// 一次分发的结果：HTTP 状态码与响应信封
#[derive(Debug)]
pub struct Outcome {
    pub status: StatusCode,
    pub review: AdmissionReview,
}

impl Outcome {
    /// 请求未进入策略评估即被拒绝
    fn rejected(uid: &str, err: &AppError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            review: AdmissionReview::respond(Decision::errored(err).with_uid(uid).into_response()),
        }
    }
}

pub struct Dispatcher {
    policies: PolicySet,
}

impl Dispatcher {
    pub fn new(policies: PolicySet) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub async fn dispatch(&self, uri: &str, content_type: Option<&str>, body: &[u8]) -> Outcome {
        let Some(policy) = self.policies.resolve(uri) else {
            warn!(uri, "no webhook registered for path");
            return Outcome::rejected("", &AppError::not_found(format!("no webhook serves {}", uri)));
        };
        let policy = Arc::clone(policy);

        if !is_json(content_type) {
            let err = AppError::invalid_request(format!(
                "unsupported content type {:?}, expected {}",
                content_type.unwrap_or_default(),
                JSON_CONTENT_TYPE
            ));
            warn!(webhook = policy.name(), error = %err, "rejecting request");
            return Outcome::rejected("", &err);
        }

        let req = match AdmissionReview::decode_request(body) {
            Ok(req) => req,
            Err(err) => {
                warn!(webhook = policy.name(), error = %err, "failed to decode AdmissionReview");
                return Outcome::rejected("", &err);
            }
        };
        if let Err(err) = req.validate() {
            warn!(webhook = policy.name(), uid = %req.uid, error = %err, "malformed admission request");
            return Outcome::rejected(&req.uid, &err);
        }
        if !policy.accepts(&req) {
            warn!(
                webhook = policy.name(),
                uid = %req.uid,
                kind = %req.kind.kind,
                "request is not handled by this webhook"
            );
            return Outcome::rejected(
                &req.uid,
                &AppError::invalid_request("not a valid webhook request"),
            );
        }

        let uid = req.uid.clone();
        let username = req.username().to_string();
        let operation = req.operation;
        let limit = Duration::from_secs(policy.timeout_seconds());
        let started = Instant::now();

        let task = {
            let policy = Arc::clone(&policy);
            tokio::task::spawn_blocking(move || policy.decide(&req))
        };
        let (status, decision) = match tokio::time::timeout(limit, task).await {
            Ok(Ok(decision)) => (StatusCode::OK, decision),
            Ok(Err(join_err)) => {
                error!(webhook = policy.name(), uid = %uid, error = %join_err, "decision task failed");
                let err = AppError::internal(format!("decision task failed: {}", join_err));
                (StatusCode::INTERNAL_SERVER_ERROR, Decision::errored(&err))
            }
            Err(_) => {
                warn!(
                    webhook = policy.name(),
                    uid = %uid,
                    timeout_seconds = policy.timeout_seconds(),
                    "decision timed out"
                );
                (StatusCode::OK, timed_out(policy.as_ref(), operation))
            }
        };

        let decision = decision.with_uid(uid.as_str());
        record_decision(policy.name(), decision.verdict.as_str(), started.elapsed());
        info!(
            webhook = policy.name(),
            uid = %uid,
            username = %username,
            operation = %operation,
            allowed = decision.is_allowed(),
            reason = %decision.reason,
            "admission decision"
        );

        Outcome {
            status,
            review: AdmissionReview::respond(decision.into_response()),
        }
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

/// 超时决策：破坏性操作一律拒绝，其余按失败策略处理
fn timed_out(policy: &dyn Policy, operation: Operation) -> Decision {
    if policy.is_destructive(operation) {
        return Decision::denied(format!(
            "{} timed out evaluating a {} request, denying",
            policy.name(),
            operation
        ));
    }
    match policy.failure_policy() {
        FailurePolicy::Ignore => Decision::allowed(format!(
            "{} timed out evaluating a {} request, allowing",
            policy.name(),
            operation
        )),
        FailurePolicy::Fail => Decision::denied(format!(
            "{} timed out evaluating a {} request, denying",
            policy.name(),
            operation
        )),
    }
}
