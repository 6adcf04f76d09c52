//! descriptor - 部署描述文件与文档生成
//!
//! 每个策略对应一个 `ValidatingWebhookConfiguration`，输出顺序按名称排序，
//! 相同输入的输出字节一致

use std::collections::BTreeMap;

use mcv_admission::ResourceMatcher;
use mcv_config::DescriptorConfig;
use mcv_errors::{AppError, AppResult};
use serde::Serialize;

use crate::policy::{FailurePolicy, LabelSelector, Policy};
use crate::registry::PolicySet;

const API_VERSION: &str = "admissionregistration.k8s.io/v1";
const KIND: &str = "ValidatingWebhookConfiguration";
const NAME_PREFIX: &str = "sre-";
const WEBHOOK_DOMAIN: &str = "managed.openshift.io";
const INJECT_CABUNDLE_ANNOTATION: &str = "service.beta.openshift.io/inject-cabundle";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatingWebhookConfiguration {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: DescriptorMeta,
    pub webhooks: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorMeta {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEntry {
    pub name: String,
    pub client_config: ClientConfig,
    pub rules: Vec<ResourceMatcher>,
    #[serde(skip_serializing_if = "LabelSelector::is_empty")]
    pub object_selector: LabelSelector,
    pub failure_policy: FailurePolicy,
    pub match_policy: &'static str,
    pub side_effects: &'static str,
    pub timeout_seconds: u64,
    pub admission_review_versions: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    pub service: ServiceReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceReference {
    pub namespace: String,
    pub name: String,
    pub path: String,
}

impl ValidatingWebhookConfiguration {
    pub fn for_policy(policy: &dyn Policy, config: &DescriptorConfig) -> Self {
        let annotations =
            BTreeMap::from([(INJECT_CABUNDLE_ANNOTATION.to_string(), "true".to_string())]);
        Self {
            api_version: API_VERSION,
            kind: KIND,
            metadata: DescriptorMeta {
                name: format!("{}{}", NAME_PREFIX, policy.name()),
                annotations,
            },
            webhooks: vec![WebhookEntry {
                name: format!("{}.{}", policy.name(), WEBHOOK_DOMAIN),
                client_config: ClientConfig {
                    service: ServiceReference {
                        namespace: config.namespace.clone(),
                        name: config.service_name.clone(),
                        path: policy.uri(),
                    },
                },
                rules: policy.matchers(),
                object_selector: policy.object_selector(),
                failure_policy: policy.failure_policy(),
                match_policy: "Equivalent",
                side_effects: "None",
                timeout_seconds: policy.timeout_seconds(),
                admission_review_versions: vec!["v1"],
            }],
        }
    }
}

/// 按名称排序生成全部描述
pub fn render_descriptors(
    set: &PolicySet,
    config: &DescriptorConfig,
) -> Vec<ValidatingWebhookConfiguration> {
    let mut policies: Vec<_> = set.iter().collect();
    policies.sort_by_key(|p| p.name());
    policies
        .into_iter()
        .map(|p| ValidatingWebhookConfiguration::for_policy(p.as_ref(), config))
        .collect()
}

/// 多文档 YAML 流
pub fn render_yaml<T: Serialize>(documents: &[T]) -> AppResult<String> {
    let mut out = String::new();
    for doc in documents {
        let body = serde_yaml::to_string(doc)
            .map_err(|e| AppError::internal(format!("failed to render YAML: {}", e)))?;
        out.push_str("---\n");
        out.push_str(&body);
    }
    Ok(out)
}

/// 单个策略的文档条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDoc {
    pub webhook_name: &'static str,
    pub rules: Vec<ResourceMatcher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_object_selector: Option<LabelSelector>,
    pub document_string: String,
}

pub fn render_docs(set: &PolicySet) -> Vec<PolicyDoc> {
    let mut docs: Vec<PolicyDoc> = set
        .iter()
        .map(|p| {
            let selector = p.object_selector();
            PolicyDoc {
                webhook_name: p.name(),
                rules: p.matchers(),
                webhook_object_selector: (!selector.is_empty()).then_some(selector),
                document_string: p.doc(),
            }
        })
        .collect();
    docs.sort_by_key(|d| d.webhook_name);
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use mcv_config::{PolicySettings, WebhookFilterConfig};

    fn builtin() -> PolicySet {
        Registry::builtin()
            .build(&PolicySettings::default(), &WebhookFilterConfig::default())
            .unwrap()
    }

    fn descriptor_config() -> DescriptorConfig {
        DescriptorConfig {
            namespace: "openshift-validation-webhook".to_string(),
            service_name: "validation-webhook".to_string(),
        }
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptors = render_descriptors(&builtin(), &descriptor_config());
        let scc = descriptors
            .iter()
            .find(|d| d.metadata.name == "sre-scc-validation")
            .unwrap();
        let value = serde_json::to_value(scc).unwrap();

        assert_eq!(value["apiVersion"], "admissionregistration.k8s.io/v1");
        assert_eq!(value["kind"], "ValidatingWebhookConfiguration");
        assert_eq!(
            value["metadata"]["annotations"]["service.beta.openshift.io/inject-cabundle"],
            "true"
        );
        let hook = &value["webhooks"][0];
        assert_eq!(hook["name"], "scc-validation.managed.openshift.io");
        assert_eq!(hook["clientConfig"]["service"]["path"], "/scc-validation");
        assert_eq!(hook["clientConfig"]["service"]["namespace"], "openshift-validation-webhook");
        assert_eq!(hook["failurePolicy"], "Ignore");
        assert_eq!(hook["matchPolicy"], "Equivalent");
        assert_eq!(hook["sideEffects"], "None");
        assert_eq!(hook["timeoutSeconds"], 2);
        assert_eq!(hook["admissionReviewVersions"], serde_json::json!(["v1"]));
        assert_eq!(hook["rules"][0]["scope"], "Cluster");
        assert!(hook.get("objectSelector").is_none());
    }

    #[test]
    fn test_descriptors_sorted_and_stable() {
        let first = render_yaml(&render_descriptors(&builtin(), &descriptor_config())).unwrap();
        let second = render_yaml(&render_descriptors(&builtin(), &descriptor_config())).unwrap();
        assert_eq!(first, second);

        let names: Vec<String> = render_descriptors(&builtin(), &descriptor_config())
            .into_iter()
            .map(|d| d.metadata.name)
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(first.matches("---\n").count(), 7);
    }

    #[test]
    fn test_object_selector_rendered_for_hive_ownership() {
        let descriptors = render_descriptors(&builtin(), &descriptor_config());
        let hive = descriptors
            .iter()
            .find(|d| d.metadata.name == "sre-hiveownership-validation")
            .unwrap();
        let value = serde_json::to_value(hive).unwrap();
        assert_eq!(
            value["webhooks"][0]["objectSelector"]["matchLabels"]["hive.openshift.io/managed"],
            "true"
        );
    }

    #[test]
    fn test_docs() {
        let docs = render_docs(&builtin());
        assert_eq!(docs.len(), 7);
        assert_eq!(docs[0].webhook_name, "clusterlogging-validation");
        assert!(docs.iter().all(|d| !d.document_string.is_empty()));

        let value = serde_json::to_value(&docs).unwrap();
        assert!(value[0].get("webhookObjectSelector").is_none());
        assert!(value[0]["documentString"].is_string());
    }
}
