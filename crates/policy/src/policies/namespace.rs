//! namespace-validation - 受管 namespace 与保护标签

use std::collections::BTreeMap;

use mcv_admission::{
    AdmissionRequest, Decision, ObjectMeta, Operation, ResourceMatcher, Scope, decode_metadata,
};
use mcv_config::PolicySettings;
use mcv_errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::policy::{Policy, settle};
use crate::strategy::{AllowList, AllowListGuard};

use super::admin_classifier;

pub const NAME: &str = "namespace-validation";
const KIND: &str = "Namespace";

/// 会破坏集群 DNS 解析的名称
const BAD_NAMESPACE: &str = r"(^com$|^io$|^in$)";
static BAD_NAMESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(BAD_NAMESPACE).unwrap());

/// 客户既不能设置也不能修改的标签
const PROTECTED_LABELS: &[&str] = &[
    "managed.openshift.io/storage-pv-quota-exempt",
    "managed.openshift.io/service-lb-quota-exempt",
];

/// 客户只能删除的标签
const REMOVABLE_PROTECTED_LABELS: &[&str] = &["openshift.io/cluster-monitoring"];

pub struct NamespacePolicy {
    guard: AllowListGuard,
    privileged: Vec<String>,
    layered_product_group: String,
    layered_product_namespace: Regex,
}

impl NamespacePolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        let ns = &settings.namespaces;
        let classifier = admin_classifier(settings)
            .allow_groups(ns.cluster_admin_groups.iter().cloned())
            .allow_group_pattern(&settings.privileged_service_account_pattern)?;
        let protected = AllowList::new()
            .patterns(ns.privileged.iter())?
            .exceptions(ns.exceptions.iter().cloned());
        let layered_product_namespace = Regex::new(&ns.layered_product_pattern).map_err(|e| {
            AppError::configuration(format!(
                "invalid layered product pattern {:?}: {}",
                ns.layered_product_pattern, e
            ))
        })?;

        Ok(Self {
            guard: AllowListGuard::new(
                KIND,
                classifier,
                protected,
                &[Operation::Create, Operation::Update, Operation::Delete],
            ),
            privileged: ns.privileged.clone(),
            layered_product_group: ns.layered_product_group.clone(),
            layered_product_namespace,
        })
    }

    fn evaluate(&self, req: &AdmissionRequest) -> AppResult<Decision> {
        if let Some(decision) = self.guard.screen(req) {
            return Ok(decision);
        }

        let raw = req.old_object.as_deref().or(req.object.as_deref());
        let namespace = decode_metadata(raw, KIND)?;
        let name = namespace.name.as_str();

        if req.user_info.groups.contains(&self.layered_product_group)
            && self.layered_product_namespace.is_match(name)
        {
            return Ok(Decision::allowed("Layered product admins may access"));
        }

        if self.guard.allow_list().is_protected(name) {
            info!(namespace = name, username = req.username(), "non-admin attempted to access a privileged namespace");
            return Ok(Decision::denied(format!(
                "Prevented from accessing Red Hat managed namespaces. Customer workloads should be placed in customer namespaces, and should not match an entry in this list of regular expressions: [{}]",
                self.privileged.join(" ")
            )));
        }

        if BAD_NAMESPACE_REGEX.is_match(name) {
            info!(namespace = name, username = req.username(), "non-admin attempted to access a potentially harmful namespace");
            return Ok(Decision::denied(format!(
                "Prevented from creating a potentially harmful namespace. Customer namespaces should not match this regular expression, as this would impact DNS resolution: {}",
                BAD_NAMESPACE
            )));
        }

        if let Some(reason) = unauthorized_label_change(req)? {
            return Ok(Decision::denied(reason));
        }

        Ok(Decision::allowed("RBAC allowed"))
    }
}

fn labels_in(meta: &ObjectMeta, keys: &[&str]) -> BTreeMap<String, String> {
    keys.iter()
        .filter_map(|k| meta.label(k).map(|v| (k.to_string(), v.to_string())))
        .collect()
}

/// 受保护标签的增删改检查
fn unauthorized_label_change(req: &AdmissionRequest) -> AppResult<Option<String>> {
    match req.operation {
        Operation::Delete => Ok(None),
        Operation::Create => {
            let new = decode_metadata(req.object.as_deref(), KIND)?;
            if labels_in(&new, PROTECTED_LABELS).is_empty()
                && labels_in(&new, REMOVABLE_PROTECTED_LABELS).is_empty()
            {
                return Ok(None);
            }
            let all: Vec<&str> = PROTECTED_LABELS
                .iter()
                .chain(REMOVABLE_PROTECTED_LABELS)
                .copied()
                .collect();
            Ok(Some(format!(
                "Managed OpenShift customers may not directly set certain protected labels ({}) on Namespaces",
                all.join(", ")
            )))
        }
        Operation::Update => {
            let old = decode_metadata(req.old_object.as_deref(), KIND)?;
            let new = decode_metadata(req.object.as_deref(), KIND)?;
            if labels_in(&old, PROTECTED_LABELS) != labels_in(&new, PROTECTED_LABELS) {
                return Ok(Some(format!(
                    "Managed OpenShift customers may not add or remove the following protected labels from Namespaces: ({})",
                    PROTECTED_LABELS.join(", ")
                )));
            }
            let old_removable = labels_in(&old, REMOVABLE_PROTECTED_LABELS);
            let added_or_changed = labels_in(&new, REMOVABLE_PROTECTED_LABELS)
                .iter()
                .any(|(k, v)| old_removable.get(k) != Some(v));
            if added_or_changed {
                return Ok(Some(format!(
                    "Managed OpenShift customers may only remove the following protected labels from Namespaces: ({})",
                    REMOVABLE_PROTECTED_LABELS.join(", ")
                )));
            }
            Ok(None)
        }
    }
}

impl Policy for NamespacePolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        format!(
            "Managed OpenShift Customers may not modify namespaces matching [{}] because customer workloads should be placed in customer-created namespaces. Customers may not create namespaces identified by this regular expression {} because it could interfere with critical DNS resolution. Additionally, customers may not set or change the values of these Namespace labels [{}].",
            self.privileged.join(" "),
            BAD_NAMESPACE,
            PROTECTED_LABELS.join(" ")
        )
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Create, Operation::Update, Operation::Delete])
                .api_groups(&[""])
                .resources(&["namespaces"])
                .scope(Scope::Cluster),
        ]
    }

    fn kind(&self) -> Option<&'static str> {
        Some(KIND)
    }

    fn decide(&self, req: &AdmissionRequest) -> Decision {
        settle(NAME, self.evaluate(req))
    }
}
