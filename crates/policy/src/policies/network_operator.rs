//! network-operator-validation - Network 迁移字段不可变

use mcv_admission::{AdmissionRequest, Decision, Operation, ResourceMatcher, Scope};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;

use crate::policy::{Policy, settle};
use crate::strategy::{FieldDiffGuard, FieldWatch};

use super::admin_classifier;

pub const NAME: &str = "network-operator-validation";
const KIND: &str = "Network";
const GROUP: &str = "operator.openshift.io";

pub struct NetworkOperatorPolicy {
    guard: FieldDiffGuard,
}

impl NetworkOperatorPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        let watches = vec![
            FieldWatch::presence("spec.migration"),
            FieldWatch::value("spec.migration.networkType"),
            FieldWatch::value("spec.migration.mode"),
            FieldWatch::value("spec.migration.features"),
            FieldWatch::value("spec.migration.mtu.network"),
            FieldWatch::value("spec.migration.mtu.machine"),
        ];
        Ok(Self {
            guard: FieldDiffGuard::new(KIND, admin_classifier(settings), watches),
        })
    }
}

impl Policy for NetworkOperatorPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        format!(
            "Managed OpenShift customers may not modify critical fields in the network.operator CRD ({}) because it can disrupt Cluster Network Operator operations and CNI migrations. Only backplane-cluster-admin and SRE service accounts are allowed to modify these critical fields.",
            self.guard.watched_paths().join(", ")
        )
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Update])
                .api_groups(&[GROUP])
                .resources(&["network", "networks"])
                .scope(Scope::Cluster),
        ]
    }

    fn kind(&self) -> Option<&'static str> {
        Some(KIND)
    }

    fn accepts(&self, req: &AdmissionRequest) -> bool {
        !req.username().is_empty()
            && req.kind.kind == KIND
            && req.kind.group == GROUP
            && self.matchers().iter().any(|m| m.matches(req))
    }

    fn decide(&self, req: &AdmissionRequest) -> Decision {
        settle(NAME, self.guard.decide(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::testing::RequestBuilder;
    use mcv_admission::Verdict;
    use serde_json::{Value, json};

    fn policy() -> NetworkOperatorPolicy {
        NetworkOperatorPolicy::new(&PolicySettings::default()).unwrap()
    }

    fn network(spec: Value) -> Value {
        json!({"metadata": {"name": "cluster"}, "spec": spec})
    }

    fn update(old: Value, new: Value) -> RequestBuilder {
        RequestBuilder::new(GROUP, KIND, "networks", Operation::Update)
            .old_object(network(old))
            .object(network(new))
    }

    #[test]
    fn test_unchanged_migration_allowed() {
        let spec = json!({"migration": {"networkType": "A"}});
        assert!(policy().decide(&update(spec.clone(), spec).build()).is_allowed());
    }

    #[test]
    fn test_network_type_change_denied() {
        let req = update(
            json!({"migration": {"networkType": "A"}}),
            json!({"migration": {"networkType": "B"}}),
        )
        .build();
        let decision = policy().decide(&req);
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("spec.migration.networkType"));
    }

    #[test]
    fn test_removed_migration_block_denied() {
        let req = update(json!({"migration": {"networkType": "A"}}), json!({})).build();
        assert_eq!(policy().decide(&req).verdict, Verdict::Denied);
    }

    #[test]
    fn test_non_critical_change_allowed() {
        let req = update(
            json!({"migration": {"networkType": "A"}, "logLevel": "Normal"}),
            json!({"migration": {"networkType": "A"}, "logLevel": "Debug"}),
        )
        .build();
        assert!(policy().decide(&req).is_allowed());
    }

    #[test]
    fn test_privileged_identities_may_change() {
        let req = update(
            json!({"migration": {"networkType": "A"}}),
            json!({"migration": {"networkType": "B"}}),
        )
        .user("backplane-cluster-admin", &[])
        .build();
        assert!(policy().decide(&req).is_allowed());

        let req = update(
            json!({"migration": {"mode": "Live"}}),
            json!({"migration": {"mode": "Offline"}}),
        )
        .user("sre", &["system:serviceaccounts:openshift-backplane-srep"])
        .build();
        assert!(policy().decide(&req).is_allowed());
    }

    #[test]
    fn test_accepts_requires_operator_group() {
        let req = update(json!({}), json!({})).build();
        assert!(policy().accepts(&req));

        let mut config_network = update(json!({}), json!({})).build();
        config_network.kind.group = "config.openshift.io".to_string();
        assert!(!policy().accepts(&config_network));
    }
}
