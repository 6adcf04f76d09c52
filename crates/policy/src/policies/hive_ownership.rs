//! hiveownership-validation - hive 受管资源只允许管理员修改

use mcv_admission::{
    AdmissionRequest, Decision, IdentityClass, IdentityClassifier, Operation, ResourceMatcher,
    Scope, decode_metadata,
};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;

use crate::policy::{LabelSelector, Policy, settle};

use super::admin_classifier;

pub const NAME: &str = "hiveownership-validation";
const MANAGED_LABEL: &str = "hive.openshift.io/managed";
const SUBJECT: &str = "managed resource";

pub struct HiveOwnershipPolicy {
    classifier: IdentityClassifier,
}

impl HiveOwnershipPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        Ok(Self {
            classifier: admin_classifier(settings),
        })
    }

    fn evaluate(&self, req: &AdmissionRequest) -> AppResult<Decision> {
        match self.classifier.classify(&req.user_info) {
            IdentityClass::ExplicitDeny => {
                return Ok(Decision::denied("Unauthenticated requests are not allowed"));
            }
            IdentityClass::Bypass(reason) => {
                return Ok(Decision::allowed(format!("{} may edit managed resources", reason)));
            }
            IdentityClass::Ordinary => {}
        }

        // 新旧对象任一带有受管标签即视为受管
        let meta = decode_metadata(req.target_object(), SUBJECT)?;
        let mut managed = meta.label(MANAGED_LABEL) == Some("true");
        if !managed && req.operation == Operation::Update && req.old_object.is_some() {
            let old = decode_metadata(req.old_object.as_deref(), SUBJECT)?;
            managed = old.label(MANAGED_LABEL) == Some("true");
        }
        if !managed {
            return Ok(Decision::allowed(format!("{} is not a managed resource", meta.name)));
        }

        Ok(Decision::denied(
            "Prevented from accessing Red Hat managed resources. This is in an effort to prevent harmful actions that may cause unintended consequences or affect the stability of the cluster. If you have any questions about this, please reach out to Red Hat support at https://access.redhat.com/support",
        ))
    }
}

impl Policy for HiveOwnershipPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        format!(
            "Managed OpenShift customers may not edit certain managed resources. A managed resource has a \"{}\": \"true\" label, before or after the change.",
            MANAGED_LABEL
        )
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Update, Operation::Delete])
                .api_groups(&["quota.openshift.io"])
                .resources(&["clusterresourcequotas"])
                .scope(Scope::Cluster),
        ]
    }

    fn object_selector(&self) -> LabelSelector {
        LabelSelector::default().match_label(MANAGED_LABEL, "true")
    }

    fn decide(&self, req: &AdmissionRequest) -> Decision {
        settle(NAME, self.evaluate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::testing::RequestBuilder;
    use mcv_admission::Verdict;
    use serde_json::json;

    fn policy() -> HiveOwnershipPolicy {
        HiveOwnershipPolicy::new(&PolicySettings::default()).unwrap()
    }

    fn update(labels: serde_json::Value) -> RequestBuilder {
        let object = json!({"metadata": {"name": "quota", "labels": labels}});
        RequestBuilder::new("quota.openshift.io", "ClusterResourceQuota", "clusterresourcequotas", Operation::Update)
            .old_object(object.clone())
            .object(object)
    }

    #[test]
    fn test_ordinary_user_denied_on_managed_resource() {
        let req = update(json!({"hive.openshift.io/managed": "true"})).build();
        let decision = policy().decide(&req);
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("Red Hat managed resources"));
    }

    #[test]
    fn test_admin_group_allowed() {
        let req = update(json!({"hive.openshift.io/managed": "true"}))
            .user("sre", &["system:serviceaccounts:openshift-backplane-srep"])
            .build();
        assert!(policy().decide(&req).is_allowed());
    }

    #[test]
    fn test_stripping_managed_label_denied() {
        let req = RequestBuilder::new(
            "quota.openshift.io",
            "ClusterResourceQuota",
            "clusterresourcequotas",
            Operation::Update,
        )
        .old_object(json!({"metadata": {"name": "quota", "labels": {"hive.openshift.io/managed": "true"}}}))
        .object(json!({"metadata": {"name": "quota", "labels": {}}}))
        .build();
        let decision = policy().decide(&req);
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("Red Hat managed resources"));
    }

    #[test]
    fn test_adding_managed_label_denied() {
        let req = RequestBuilder::new(
            "quota.openshift.io",
            "ClusterResourceQuota",
            "clusterresourcequotas",
            Operation::Update,
        )
        .old_object(json!({"metadata": {"name": "quota"}}))
        .object(json!({"metadata": {"name": "quota", "labels": {"hive.openshift.io/managed": "true"}}}))
        .build();
        assert_eq!(policy().decide(&req).verdict, Verdict::Denied);
    }

    #[test]
    fn test_unlabelled_resource_allowed() {
        let req = update(json!({})).build();
        assert!(policy().decide(&req).is_allowed());
    }

    #[test]
    fn test_accepts_any_kind_in_matchers() {
        let req = update(json!({})).build();
        assert!(policy().accepts(&req));
        assert_eq!(
            policy().object_selector().match_labels.get(MANAGED_LABEL).map(String::as_str),
            Some("true")
        );
    }
}
