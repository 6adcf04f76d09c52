//! 资源匹配规则
//!
//! 声明策略关心的 (操作, API 组, 版本, 资源, 作用域)，序列化形态即 webhook rules

use serde::Serialize;

use crate::request::{AdmissionRequest, Operation};

const WILDCARD: &str = "*";

/// 资源作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    Cluster,
    Namespaced,
    #[serde(rename = "*")]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMatcher {
    pub operations: Vec<Operation>,
    pub api_groups: Vec<String>,
    pub api_versions: Vec<String>,
    pub resources: Vec<String>,
    pub scope: Scope,
}

impl ResourceMatcher {
    pub fn new(operations: &[Operation]) -> Self {
        Self {
            operations: operations.to_vec(),
            api_groups: Vec::new(),
            api_versions: vec![WILDCARD.to_string()],
            resources: Vec::new(),
            scope: Scope::All,
        }
    }

    pub fn api_groups(mut self, groups: &[&str]) -> Self {
        self.api_groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn api_versions(mut self, versions: &[&str]) -> Self {
        self.api_versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn resources(mut self, resources: &[&str]) -> Self {
        self.resources = resources.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// 请求是否落在此规则内
    ///
    /// 作用域只用于生成描述文件：API Server 对 Namespace 对象同样会填充
    /// `request.namespace`，无法据此判断资源是否为命名空间级
    pub fn matches(&self, req: &AdmissionRequest) -> bool {
        self.operations.contains(&req.operation)
            && matches_any(&self.api_groups, &req.resource.group)
            && matches_any(&self.api_versions, &req.resource.version)
            && self.matches_resource(&req.resource.resource, req.sub_resource.as_deref())
    }

    /// `*` 只匹配主资源，`*/*` 匹配全部，`pods/*` 匹配 pods 的所有子资源
    fn matches_resource(&self, resource: &str, sub_resource: Option<&str>) -> bool {
        let sub_resource = sub_resource.filter(|s| !s.is_empty());
        self.resources.iter().any(|entry| match entry.split_once('/') {
            Some((res, sub)) => {
                (res == WILDCARD || res == resource)
                    && sub_resource.is_some_and(|s| sub == WILDCARD || sub == s)
            }
            None => sub_resource.is_none() && (entry == WILDCARD || entry == resource),
        })
    }
}

fn matches_any(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| p == WILDCARD || p == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{GroupVersionKind, GroupVersionResource, UserInfo};

    fn request(op: Operation, group: &str, resource: &str, namespace: Option<&str>) -> AdmissionRequest {
        AdmissionRequest {
            uid: "u".to_string(),
            kind: GroupVersionKind::default(),
            resource: GroupVersionResource {
                group: group.to_string(),
                version: "v1".to_string(),
                resource: resource.to_string(),
            },
            sub_resource: None,
            name: "x".to_string(),
            namespace: namespace.map(str::to_string),
            operation: op,
            user_info: UserInfo::default(),
            object: None,
            old_object: None,
            dry_run: None,
        }
    }

    #[test]
    fn test_matches_operation_group_and_resource() {
        let matcher = ResourceMatcher::new(&[Operation::Update, Operation::Delete])
            .api_groups(&["security.openshift.io"])
            .resources(&["securitycontextconstraints"])
            .scope(Scope::Cluster);

        let req = request(
            Operation::Delete,
            "security.openshift.io",
            "securitycontextconstraints",
            None,
        );
        assert!(matcher.matches(&req));

        let create = request(
            Operation::Create,
            "security.openshift.io",
            "securitycontextconstraints",
            None,
        );
        assert!(!matcher.matches(&create));

        let other_group = request(Operation::Delete, "", "securitycontextconstraints", None);
        assert!(!matcher.matches(&other_group));
    }

    #[test]
    fn test_scope_is_not_matched_against_request_namespace() {
        let matcher = ResourceMatcher::new(&[Operation::Create])
            .api_groups(&[""])
            .resources(&["namespaces"])
            .scope(Scope::Cluster);
        assert!(matcher.matches(&request(Operation::Create, "", "namespaces", Some("my-app"))));
        assert!(matcher.matches(&request(Operation::Create, "", "namespaces", None)));
    }

    #[test]
    fn test_subresources() {
        let mut req = request(Operation::Update, "", "pods", Some("ns"));
        req.sub_resource = Some("status".to_string());

        let plain = ResourceMatcher::new(&[Operation::Update])
            .api_groups(&[""])
            .resources(&["*"]);
        assert!(!plain.matches(&req));

        let sub = ResourceMatcher::new(&[Operation::Update])
            .api_groups(&[""])
            .resources(&["pods/*"]);
        assert!(sub.matches(&req));
    }

    #[test]
    fn test_serializes_as_webhook_rule() {
        let matcher = ResourceMatcher::new(&[Operation::Create, Operation::Update])
            .api_groups(&[""])
            .resources(&["namespaces"])
            .scope(Scope::Cluster);
        let value = serde_json::to_value(&matcher).unwrap();
        assert_eq!(value["operations"], serde_json::json!(["CREATE", "UPDATE"]));
        assert_eq!(value["apiGroups"], serde_json::json!([""]));
        assert_eq!(value["apiVersions"], serde_json::json!(["*"]));
        assert_eq!(value["scope"], "Cluster");
    }
}
