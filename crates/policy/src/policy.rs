//! 策略契约

use std::collections::BTreeMap;

use mcv_admission::{AdmissionRequest, Decision, Operation, ResourceMatcher};
use mcv_errors::AppResult;
use serde::Serialize;
use tracing::warn;

/// 服务不可达时 API Server 的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailurePolicy {
    /// fail-open
    Ignore,
    /// fail-closed
    Fail,
}

/// 对象标签选择器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn match_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }
}

/// 由策略名推导 URI
///
/// 大小写不敏感，首尾的 `/` 会被去掉
pub fn derive_uri(name: &str) -> String {
    format!("/{}", name.trim_matches('/').to_ascii_lowercase())
}

/// 准入策略
///
/// 构造后不可变，可在多个请求间共享
pub trait Policy: Send + Sync {
    /// 唯一名称
    fn name(&self) -> &'static str;

    fn uri(&self) -> String {
        derive_uri(self.name())
    }

    /// 文档说明
    fn doc(&self) -> String;

    /// 匹配的资源规则，不能为空
    fn matchers(&self) -> Vec<ResourceMatcher>;

    fn object_selector(&self) -> LabelSelector {
        LabelSelector::default()
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Ignore
    }

    fn timeout_seconds(&self) -> u64 {
        2
    }

    /// 只接受该 kind 的对象，`None` 表示不限
    fn kind(&self) -> Option<&'static str> {
        None
    }

    /// 请求是否为本策略可处理的合法请求
    fn accepts(&self, req: &AdmissionRequest) -> bool {
        if req.username().is_empty() {
            return false;
        }
        if let Some(kind) = self.kind() {
            if req.kind.kind != kind {
                return false;
            }
        }
        self.matchers().iter().any(|m| m.matches(req))
    }

    /// 超时时强制拒绝的操作
    fn is_destructive(&self, operation: Operation) -> bool {
        operation == Operation::Delete
    }

    /// 评估请求
    fn decide(&self, req: &AdmissionRequest) -> Decision;
}

/// 将策略内部结果折叠为决策，错误不会向外传播
pub(crate) fn settle(policy: &'static str, result: AppResult<Decision>) -> Decision {
    result.unwrap_or_else(|err| {
        warn!(webhook = policy, error = %err, "policy could not reach a decision");
        Decision::errored(&err)
    })
}
