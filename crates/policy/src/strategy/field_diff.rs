//! 字段不可变检查
//!
//! 只检查 Update：按监视列表比较新旧对象，任何变化都拒绝

use mcv_admission::{AdmissionRequest, Decision, IdentityClass, IdentityClassifier, Operation, decode_raw};
use mcv_errors::AppResult;
use serde_json::Value;
use tracing::info;

use super::{lookup, split_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchMode {
    /// 深度比较值
    Value,
    /// 只比较是否存在
    Presence,
}

/// 监视的字段
#[derive(Debug, Clone)]
pub struct FieldWatch {
    path: String,
    segments: Vec<String>,
    mode: WatchMode,
}

impl FieldWatch {
    pub fn value(path: &str) -> Self {
        Self {
            path: path.to_string(),
            segments: split_path(path),
            mode: WatchMode::Value,
        }
    }

    pub fn presence(path: &str) -> Self {
        Self {
            path: path.to_string(),
            segments: split_path(path),
            mode: WatchMode::Presence,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn changed(&self, old: &Value, new: &Value) -> bool {
        match (lookup(old, &self.segments), lookup(new, &self.segments)) {
            (None, None) => false,
            (Some(_), None) | (None, Some(_)) => true,
            (Some(a), Some(b)) => self.mode == WatchMode::Value && a != b,
        }
    }
}

/// 返回所有发生变化的监视路径，保持监视列表的顺序
pub fn changed_paths(watches: &[FieldWatch], old: &Value, new: &Value) -> Vec<String> {
    watches
        .iter()
        .filter(|w| w.changed(old, new))
        .map(|w| w.path.clone())
        .collect()
}

/// 字段不可变守卫
#[derive(Debug, Clone)]
pub struct FieldDiffGuard {
    subject: &'static str,
    classifier: IdentityClassifier,
    watches: Vec<FieldWatch>,
}

impl FieldDiffGuard {
    pub fn new(subject: &'static str, classifier: IdentityClassifier, watches: Vec<FieldWatch>) -> Self {
        Self {
            subject,
            classifier,
            watches,
        }
    }

    pub fn watched_paths(&self) -> Vec<&str> {
        self.watches.iter().map(FieldWatch::path).collect()
    }

    pub fn decide(&self, req: &AdmissionRequest) -> AppResult<Decision> {
        if req.operation != Operation::Update {
            return Ok(Decision::allowed(format!(
                "{} of {} is allowed",
                req.operation, self.subject
            )));
        }

        match self.classifier.classify(&req.user_info) {
            IdentityClass::ExplicitDeny => {
                return Ok(Decision::denied("Unauthenticated requests are not allowed"));
            }
            IdentityClass::Bypass(reason) => {
                return Ok(Decision::allowed(format!(
                    "{} may modify protected {} fields",
                    reason, self.subject
                )));
            }
            IdentityClass::Ordinary => {}
        }

        let old: Value = decode_raw(req.old_object.as_deref(), self.subject)?;
        let new: Value = decode_raw(req.object.as_deref(), self.subject)?;

        let changed = changed_paths(&self.watches, &old, &new);
        if changed.is_empty() {
            return Ok(Decision::allowed("Non-critical field modifications are allowed"));
        }

        info!(
            subject = self.subject,
            username = req.username(),
            changed = ?changed,
            "modification of immutable fields denied"
        );
        Ok(Decision::denied(format!(
            "Modification of {} fields {} is not allowed",
            self.subject,
            changed.join(", ")
        )))
    }
}
