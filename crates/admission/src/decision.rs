//! decision - 策略决策

use mcv_errors::AppError;

use crate::review::{AdmissionResponse, ResponseStatus};

/// 决策结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied,
    /// 无法给出业务决策，携带 HTTP 语义的错误码
    Errored(u16),
}

impl Verdict {
    /// 指标标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Errored(_) => "errored",
        }
    }
}

/// 一次策略评估的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: String,
    /// 回显的请求 uid，由分发器统一覆盖
    pub uid: String,
    /// 仅 Errored 使用的 metav1.Status reason
    pub status_reason: Option<&'static str>,
}

impl Decision {
    pub fn allowed(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allowed,
            reason: reason.into(),
            uid: String::new(),
            status_reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Denied,
            reason: reason.into(),
            uid: String::new(),
            status_reason: None,
        }
    }

    pub fn errored(err: &AppError) -> Self {
        Self {
            verdict: Verdict::Errored(err.status_code()),
            reason: err.to_string(),
            uid: String::new(),
            status_reason: Some(err.status_reason()),
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allowed
    }

    /// 转换为准入响应
    pub fn into_response(self) -> AdmissionResponse {
        let allowed = self.is_allowed();
        let status = match self.verdict {
            Verdict::Allowed => ResponseStatus {
                code: 200,
                message: self.reason,
                reason: None,
            },
            Verdict::Denied => ResponseStatus {
                code: 403,
                message: self.reason,
                reason: Some("Forbidden".to_string()),
            },
            Verdict::Errored(code) => ResponseStatus {
                code,
                message: self.reason,
                reason: self.status_reason.map(str::to_string),
            },
        };
        AdmissionResponse::new(self.uid, allowed, status)
    }
}
