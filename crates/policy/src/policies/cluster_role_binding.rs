//! clusterrolebindings-validation - 受管 namespace 中 service account 的绑定不可删除

use mcv_admission::{AdmissionRequest, Decision, ObjectMeta, Operation, ResourceMatcher, Scope, decode_raw};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;
use serde::Deserialize;

use crate::policy::{Policy, settle};
use crate::strategy::{AllowList, AllowListGuard, ProtectedTarget, ProvenanceOverride};

use super::admin_classifier;

pub const NAME: &str = "clusterrolebindings-validation";
const KIND: &str = "ClusterRoleBinding";
const MUST_GATHER_ANNOTATION: &str = "oc.openshift.io/command";
const MUST_GATHER_COMMAND: &str = "oc adm must-gather";
const MUST_GATHER_USER: &str = "cluster-admin";

#[derive(Debug, Deserialize)]
struct ClusterRoleBinding {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    subjects: Vec<Subject>,
}

#[derive(Debug, Deserialize)]
struct Subject {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    namespace: String,
}

pub struct ClusterRoleBindingPolicy {
    guard: AllowListGuard,
    protected_pattern: String,
}

impl ClusterRoleBindingPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        let crb = &settings.cluster_role_bindings;
        let protected = AllowList::new()
            .patterns([crb.protected_namespaces.as_str()])?
            .exceptions(crb.exceptions.iter().cloned());
        let guard = AllowListGuard::new(KIND, admin_classifier(settings), protected, &[Operation::Delete])
            .with_provenance_override(ProvenanceOverride::new(
                MUST_GATHER_ANNOTATION,
                MUST_GATHER_COMMAND,
                MUST_GATHER_USER,
            ));
        Ok(Self {
            guard,
            protected_pattern: crb.protected_namespaces.clone(),
        })
    }
}

/// 比对对象是绑定中 ServiceAccount 主体所在的 namespace
fn service_account_namespaces(req: &AdmissionRequest) -> AppResult<ProtectedTarget> {
    let binding: ClusterRoleBinding = decode_raw(req.old_object.as_deref(), KIND)?;
    let names = binding
        .subjects
        .into_iter()
        .filter(|s| s.kind == "ServiceAccount")
        .map(|s| s.namespace)
        .collect();
    Ok(ProtectedTarget {
        meta: binding.metadata,
        names,
    })
}

impl Policy for ClusterRoleBindingPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        format!(
            "Managed OpenShift Customers may not delete the cluster role bindings under the managed namespaces: {}",
            self.protected_pattern
        )
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Delete])
                .api_groups(&["rbac.authorization.k8s.io"])
                .api_versions(&["v1"])
                .resources(&["clusterrolebindings"])
                .scope(Scope::Cluster),
        ]
    }

    fn kind(&self) -> Option<&'static str> {
        Some(KIND)
    }

    fn decide(&self, req: &AdmissionRequest) -> Decision {
        settle(NAME, self.guard.decide(req, service_account_namespaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::testing::RequestBuilder;
    use mcv_admission::Verdict;
    use serde_json::{Value, json};

    fn policy() -> ClusterRoleBindingPolicy {
        ClusterRoleBindingPolicy::new(&PolicySettings::default()).unwrap()
    }

    fn binding(sa_namespace: &str, annotations: Value) -> Value {
        json!({
            "metadata": {"name": "some-binding", "annotations": annotations},
            "roleRef": {"kind": "ClusterRole", "name": "cluster-admin"},
            "subjects": [
                {"kind": "User", "name": "bob"},
                {"kind": "ServiceAccount", "name": "sa", "namespace": sa_namespace}
            ]
        })
    }

    fn delete(sa_namespace: &str) -> RequestBuilder {
        RequestBuilder::new("rbac.authorization.k8s.io", KIND, "clusterrolebindings", Operation::Delete)
            .old_object(binding(sa_namespace, json!({})))
    }

    #[test]
    fn test_protected_binding_delete_denied() {
        let decision = policy().decide(&delete("openshift-monitoring").build());
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("openshift-monitoring"));

        let decision = policy().decide(&delete("kube-system").build());
        assert_eq!(decision.verdict, Verdict::Denied);
    }

    #[test]
    fn test_exception_namespace_allowed() {
        assert!(policy().decide(&delete("openshift-logging").build()).is_allowed());
        assert!(policy().decide(&delete("openshift-gitops").build()).is_allowed());
    }

    #[test]
    fn test_customer_namespace_allowed() {
        assert!(policy().decide(&delete("my-app").build()).is_allowed());
    }

    #[test]
    fn test_admins_allowed() {
        let req = delete("openshift-monitoring")
            .user("backplane-cluster-admin", &[])
            .build();
        assert!(policy().decide(&req).is_allowed());

        let req = delete("openshift-monitoring")
            .user("system:serviceaccount:openshift-foo:bar", &[])
            .build();
        assert!(policy().decide(&req).is_allowed());
    }

    #[test]
    fn test_must_gather_override() {
        let object = binding(
            "openshift-must-gather-abcde",
            json!({"oc.openshift.io/command": "oc adm must-gather"}),
        );
        let req = RequestBuilder::new("rbac.authorization.k8s.io", KIND, "clusterrolebindings", Operation::Delete)
            .old_object(object.clone())
            .user("cluster-admin", &[])
            .build();
        assert!(policy().decide(&req).is_allowed());

        let req = RequestBuilder::new("rbac.authorization.k8s.io", KIND, "clusterrolebindings", Operation::Delete)
            .old_object(object)
            .user("someone-else", &[])
            .build();
        assert_eq!(policy().decide(&req).verdict, Verdict::Denied);
    }
}
