//! 允许名单匹配
//!
//! 受保护名称 = 精确名称 ∪ 前缀 ∪ 正则，再减去例外集合

use mcv_admission::{
    AdmissionRequest, Decision, IdentityClass, IdentityClassifier, ObjectMeta, Operation,
};
use mcv_errors::{AppError, AppResult};
use regex::Regex;
use tracing::info;

/// 受保护名称集合，构造后不可变
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    exact: Vec<String>,
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
    exceptions: Vec<String>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// 非法正则属于配置错误
    pub fn patterns<I, S>(mut self, patterns: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|e| {
                AppError::configuration(format!("invalid protected pattern {:?}: {}", pattern, e))
            })?;
            self.patterns.push(regex);
        }
        Ok(self)
    }

    pub fn exceptions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exceptions.extend(names.into_iter().map(Into::into));
        self
    }

    /// 例外优先于所有匹配
    pub fn is_protected(&self, name: &str) -> bool {
        if self.exceptions.iter().any(|e| e == name) {
            return false;
        }
        self.exact.iter().any(|n| n == name)
            || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.patterns.iter().any(|r| r.is_match(name))
    }

    /// 用于拒绝原因与文档的描述
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.exact.clone();
        parts.extend(self.prefixes.iter().map(|p| format!("{}*", p)));
        parts.extend(self.patterns.iter().map(|r| r.as_str().to_string()));
        parts.join(", ")
    }
}

/// 来源标记：对象带有指定注解值且调用者为指定用户时放行
#[derive(Debug, Clone)]
pub struct ProvenanceOverride {
    annotation: String,
    value: String,
    username: String,
}

impl ProvenanceOverride {
    pub fn new(
        annotation: impl Into<String>,
        value: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            annotation: annotation.into(),
            value: value.into(),
            username: username.into(),
        }
    }

    fn applies(&self, meta: &ObjectMeta, username: &str) -> bool {
        username == self.username && meta.annotation(&self.annotation) == Some(self.value.as_str())
    }
}

/// 待检查的目标：对象元数据与需要比对的名称
#[derive(Debug, Clone)]
pub struct ProtectedTarget {
    pub meta: ObjectMeta,
    pub names: Vec<String>,
}

impl ProtectedTarget {
    /// 以对象自身名称作为比对名称
    pub fn named(meta: ObjectMeta) -> Self {
        Self {
            names: vec![meta.name.clone()],
            meta,
        }
    }
}

/// 允许名单守卫
///
/// # 判定顺序
/// 1. ExplicitDeny → 拒绝
/// 2. Bypass → 放行
/// 3. 操作不在破坏性集合中 → 放行
/// 4. 目标未受保护 → 放行
/// 5. 命中来源标记 → 放行
/// 6. 拒绝
#[derive(Debug, Clone)]
pub struct AllowListGuard {
    subject: &'static str,
    classifier: IdentityClassifier,
    protected: AllowList,
    destructive: Vec<Operation>,
    provenance: Option<ProvenanceOverride>,
}

impl AllowListGuard {
    pub fn new(
        subject: &'static str,
        classifier: IdentityClassifier,
        protected: AllowList,
        destructive: &[Operation],
    ) -> Self {
        Self {
            subject,
            classifier,
            protected,
            destructive: destructive.to_vec(),
            provenance: None,
        }
    }

    pub fn with_provenance_override(mut self, provenance: ProvenanceOverride) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.protected
    }

    /// 身份与操作的预筛，返回 `None` 表示需要继续检查目标
    pub fn screen(&self, req: &AdmissionRequest) -> Option<Decision> {
        match self.classifier.classify(&req.user_info) {
            IdentityClass::ExplicitDeny => {
                return Some(Decision::denied("Unauthenticated requests are not allowed"));
            }
            IdentityClass::Bypass(reason) => {
                return Some(Decision::allowed(format!(
                    "{} may manage {}",
                    reason, self.subject
                )));
            }
            IdentityClass::Ordinary => {}
        }
        if !self.destructive.contains(&req.operation) {
            return Some(Decision::allowed(format!(
                "{} of {} is not restricted",
                req.operation, self.subject
            )));
        }
        None
    }

    /// 评估请求，`extract` 只在需要检查目标时调用
    pub fn decide<F>(&self, req: &AdmissionRequest, extract: F) -> AppResult<Decision>
    where
        F: FnOnce(&AdmissionRequest) -> AppResult<ProtectedTarget>,
    {
        if let Some(decision) = self.screen(req) {
            return Ok(decision);
        }

        let target = extract(req)?;
        let hits: Vec<&str> = target
            .names
            .iter()
            .map(String::as_str)
            .filter(|name| self.protected.is_protected(name))
            .collect();
        if hits.is_empty() {
            return Ok(Decision::allowed(format!(
                "{} {} is not protected",
                self.subject, target.meta.name
            )));
        }

        if let Some(provenance) = &self.provenance {
            if provenance.applies(&target.meta, req.username()) {
                return Ok(Decision::allowed(format!(
                    "{} may manage {} {} created by {}",
                    provenance.username, self.subject, target.meta.name, provenance.value
                )));
            }
        }

        info!(
            subject = self.subject,
            name = %target.meta.name,
            username = req.username(),
            operation = %req.operation,
            "operation on protected resource denied"
        );
        Ok(Decision::denied(format!(
            "{} of {} {} is not allowed: {} is protected ({})",
            req.operation,
            self.subject,
            target.meta.name,
            hits.join(", "),
            self.protected.describe()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcv_admission::{GroupVersionKind, GroupVersionResource, UserInfo, Verdict};
    use std::collections::BTreeMap;

    fn protected_namespaces() -> AllowList {
        AllowList::new()
            .exact(["default"])
            .prefixes(["openshift-"])
            .patterns(["^kube-.*"])
            .unwrap()
            .exceptions(["openshift-logging", "kube-public-exception"])
    }

    fn request(username: &str, groups: &[&str], operation: Operation) -> AdmissionRequest {
        AdmissionRequest {
            uid: "uid".to_string(),
            kind: GroupVersionKind::default(),
            resource: GroupVersionResource::default(),
            sub_resource: None,
            name: "target".to_string(),
            namespace: None,
            operation,
            user_info: UserInfo::new(username, groups.iter().map(|g| g.to_string()).collect()),
            object: None,
            old_object: None,
            dry_run: None,
        }
    }

    fn guard() -> AllowListGuard {
        AllowListGuard::new(
            "ClusterRoleBinding",
            IdentityClassifier::new().allow_groups(["sre"]),
            protected_namespaces(),
            &[Operation::Delete],
        )
        .with_provenance_override(ProvenanceOverride::new(
            "oc.openshift.io/command",
            "oc adm must-gather",
            "cluster-admin",
        ))
    }

    fn target(name: &str, annotations: &[(&str, &str)]) -> ProtectedTarget {
        let annotations: BTreeMap<String, String> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProtectedTarget::named(ObjectMeta {
            name: name.to_string(),
            annotations,
            ..ObjectMeta::default()
        })
    }

    #[test]
    fn test_is_protected_matching() {
        let list = protected_namespaces();
        assert!(list.is_protected("default"));
        assert!(list.is_protected("openshift-monitoring"));
        assert!(list.is_protected("kube-system"));
        assert!(!list.is_protected("customer-app"));
        assert!(!list.is_protected("defaults"));
    }

    #[test]
    fn test_exceptions_are_never_protected() {
        let list = protected_namespaces();
        // 同时匹配前缀与正则，仍不受保护
        assert!(!list.is_protected("openshift-logging"));
        assert!(!list.is_protected("kube-public-exception"));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = AllowList::new().patterns(["[unclosed"]).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_ordinary_user_denied_on_protected_target() {
        let req = request("random-user", &[], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("openshift-monitoring", &[])))
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("protected"));
    }

    #[test]
    fn test_bypass_group_allowed() {
        let req = request("someone", &["sre"], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("openshift-monitoring", &[])))
            .unwrap();
        assert!(decision.is_allowed());
        assert!(decision.reason.contains("sre"));
    }

    #[test]
    fn test_non_destructive_operation_skips_extraction() {
        let req = request("random-user", &[], Operation::Update);
        let decision = guard()
            .decide(&req, |_| Err(AppError::decode("must not be called")))
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_unprotected_target_allowed() {
        let req = request("random-user", &[], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("customer-app", &[])))
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_provenance_override() {
        let annotated = [("oc.openshift.io/command", "oc adm must-gather")];

        let req = request("cluster-admin", &[], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("openshift-must-gather-x", &annotated)))
            .unwrap();
        assert!(decision.is_allowed());

        // 其他用户不享有该例外
        let req = request("random-user", &[], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("openshift-must-gather-x", &annotated)))
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Denied);
    }

    #[test]
    fn test_unauthenticated_denied() {
        let req = request("system:unauthenticated", &["sre"], Operation::Delete);
        let decision = guard()
            .decide(&req, |_| Ok(target("customer-app", &[])))
            .unwrap();
        assert_eq!(decision.verdict, Verdict::Denied);
    }

    #[test]
    fn test_extraction_error_propagates() {
        let req = request("random-user", &[], Operation::Delete);
        let err = guard()
            .decide(&req, |_| Err(AppError::decode("bad object")))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
