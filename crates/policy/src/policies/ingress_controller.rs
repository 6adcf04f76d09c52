//! ingresscontroller-validation - master 容忍度与 allowedSourceRanges

use mcv_admission::{
    AdmissionRequest, Decision, IdentityClass, IdentityClassifier, ObjectMeta, Operation,
    ResourceMatcher, Scope, decode_raw,
};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;
use serde::Deserialize;
use tracing::info;

use crate::policy::{Policy, settle};
use crate::strategy::{CidrContainment, CidrOutcome};

use super::admin_classifier;

pub const NAME: &str = "ingresscontroller-validation";
const KIND: &str = "IngressController";
const MASTER_TOLERATION: &str = "node-role.kubernetes.io/master";
const DEFAULT_CONTROLLER: &str = "default";
const INGRESS_OPERATOR_NAMESPACE: &str = "openshift-ingress-operator";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngressController {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: IngressControllerSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngressControllerSpec {
    #[serde(default)]
    node_placement: Option<NodePlacement>,
    #[serde(default)]
    endpoint_publishing_strategy: Option<EndpointPublishingStrategy>,
}

#[derive(Debug, Default, Deserialize)]
struct NodePlacement {
    #[serde(default)]
    tolerations: Vec<Toleration>,
}

#[derive(Debug, Default, Deserialize)]
struct Toleration {
    #[serde(default)]
    key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointPublishingStrategy {
    #[serde(default)]
    load_balancer: Option<LoadBalancerStrategy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadBalancerStrategy {
    #[serde(default)]
    allowed_source_ranges: Vec<String>,
}

impl IngressController {
    fn tolerates_masters(&self) -> bool {
        self.spec
            .node_placement
            .as_ref()
            .is_some_and(|p| p.tolerations.iter().any(|t| t.key.contains(MASTER_TOLERATION)))
    }

    fn allowed_source_ranges(&self) -> &[String] {
        self.spec
            .endpoint_publishing_strategy
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .map(|lb| lb.allowed_source_ranges.as_slice())
            .unwrap_or_default()
    }
}

pub struct IngressControllerPolicy {
    classifier: IdentityClassifier,
    machine_cidr: CidrContainment,
}

impl IngressControllerPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        Ok(Self {
            classifier: admin_classifier(settings),
            machine_cidr: CidrContainment::new(settings.ingress.machine_cidr.clone()),
        })
    }

    fn evaluate(&self, req: &AdmissionRequest) -> AppResult<Decision> {
        match self.classifier.classify(&req.user_info) {
            IdentityClass::ExplicitDeny => {
                return Ok(Decision::denied("Unauthenticated requests are not allowed"));
            }
            IdentityClass::Bypass(reason) => {
                return Ok(Decision::allowed(format!("{} may manage IngressControllers", reason)));
            }
            IdentityClass::Ordinary => {}
        }

        let controller: IngressController = decode_raw(req.object.as_deref(), KIND)?;

        if controller.tolerates_masters() {
            return Ok(Decision::denied(
                "Not allowed to provision ingress controller pods with toleration for master nodes.",
            ));
        }

        let namespace = controller
            .metadata
            .namespace
            .as_deref()
            .or(req.namespace.as_deref());
        if controller.metadata.name != DEFAULT_CONTROLLER
            || namespace != Some(INGRESS_OPERATOR_NAMESPACE)
        {
            return Ok(Decision::allowed(
                "IngressController operation is allowed, machineCIDR n/a",
            ));
        }

        let ranges = controller.allowed_source_ranges();
        let decision = match self.machine_cidr.check(ranges)? {
            CidrOutcome::NoCandidates => Decision::allowed(
                "Allowing empty 'AllowedSourceRanges'. Populate this value if operator remains in 'progressing' state",
            ),
            CidrOutcome::NoReference => {
                Decision::allowed("No machine CIDR configured, AllowedSourceRanges not checked")
            }
            CidrOutcome::Contained => Decision::allowed(format!(
                "AllowedSourceRanges are within machine CIDR {}",
                self.machine_cidr.reference().unwrap_or_default()
            )),
            CidrOutcome::Unparseable(bad) => Decision::denied(format!(
                "Failed to parse AllowedSourceRanges values: {}",
                bad.join(", ")
            )),
            CidrOutcome::NotContained(outside) => Decision::denied(format!(
                "AllowedSourceRanges {} are not within machine CIDR {}",
                outside.join(", "),
                self.machine_cidr.reference().unwrap_or_default()
            )),
        };
        if !decision.is_allowed() {
            info!(reason = %decision.reason, "AllowedSourceRanges check failed");
        }
        Ok(decision)
    }
}

impl Policy for IngressControllerPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        "Managed OpenShift Customer may create IngressControllers without necessary taints. This can cause those workloads to be provisioned on master nodes.".to_string()
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Create, Operation::Update])
                .api_groups(&["operator.openshift.io"])
                .resources(&["ingresscontroller", "ingresscontrollers"])
                .scope(Scope::Namespaced),
        ]
    }

    fn timeout_seconds(&self) -> u64 {
        1
    }

    fn kind(&self) -> Option<&'static str> {
        Some(KIND)
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
    use serde_json::{Value, json};

    fn policy_with(cidr: Option<&str>) -> IngressControllerPolicy {
        let mut settings = PolicySettings::default();
        settings.ingress.machine_cidr = cidr.map(str::to_string);
        IngressControllerPolicy::new(&settings).unwrap()
    }

    fn controller(name: &str, spec: Value) -> Value {
        json!({
            "metadata": {"name": name, "namespace": INGRESS_OPERATOR_NAMESPACE},
            "spec": spec
        })
    }

    fn ranges(ranges: &[&str]) -> Value {
        json!({"endpointPublishingStrategy": {"type": "LoadBalancerService", "loadBalancer": {"allowedSourceRanges": ranges}}})
    }

    fn create(object: Value) -> RequestBuilder {
        RequestBuilder::new("operator.openshift.io", KIND, "ingresscontrollers", Operation::Create)
            .namespace(INGRESS_OPERATOR_NAMESPACE)
            .object(object)
    }

    #[test]
    fn test_master_toleration_denied() {
        let spec = json!({"nodePlacement": {"tolerations": [{"key": "node-role.kubernetes.io/master", "effect": "NoSchedule"}]}});
        let decision = policy_with(None).decide(&create(controller("custom", spec)).build());
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("master"));
    }

    #[test]
    fn test_master_toleration_allowed_for_break_glass() {
        let spec = json!({"nodePlacement": {"tolerations": [{"key": "node-role.kubernetes.io/master"}]}});
        let req = create(controller("custom", spec))
            .user("backplane-cluster-admin", &[])
            .build();
        assert!(policy_with(None).decide(&req).is_allowed());
    }

    #[test]
    fn test_master_toleration_allowed_for_sre_group() {
        let spec = json!({"nodePlacement": {"tolerations": [{"key": "node-role.kubernetes.io/master"}]}});
        let req = create(controller("custom", spec))
            .user("sre", &["system:serviceaccounts:openshift-backplane-srep"])
            .build();
        assert!(policy_with(None).decide(&req).is_allowed());
    }

    #[test]
    fn test_default_controller_ranges_within_machine_cidr() {
        let req = create(controller("default", ranges(&["10.0.0.0/17", "10.0.128.0/24"]))).build();
        assert!(policy_with(Some("10.0.0.0/16")).decide(&req).is_allowed());
    }

    #[test]
    fn test_default_controller_range_outside_machine_cidr() {
        let req = create(controller("default", ranges(&["10.0.0.0/17", "192.168.1.0/24"]))).build();
        let decision = policy_with(Some("10.0.0.0/16")).decide(&req);
        assert_eq!(decision.verdict, Verdict::Denied);
        assert!(decision.reason.contains("192.168.1.0/24"));
    }

    #[test]
    fn test_ipv6_range_ignored_against_ipv4_machine_cidr() {
        let req = create(controller("default", ranges(&["10.0.1.0/24", "2001:db8::/32"]))).build();
        assert!(policy_with(Some("10.0.0.0/16")).decide(&req).is_allowed());
    }

    #[test]
    fn test_fail_open_cases() {
        let empty = create(controller("default", ranges(&[]))).build();
        assert!(policy_with(Some("10.0.0.0/16")).decide(&empty).is_allowed());

        let no_reference = create(controller("default", ranges(&["192.168.1.0/24"]))).build();
        assert!(policy_with(None).decide(&no_reference).is_allowed());
    }

    #[test]
    fn test_unparseable_range_denied() {
        let req = create(controller("default", ranges(&["10.0.0.0/33"]))).build();
        assert_eq!(
            policy_with(Some("10.0.0.0/16")).decide(&req).verdict,
            Verdict::Denied
        );
    }

    #[test]
    fn test_malformed_machine_cidr_is_errored() {
        let req = create(controller("default", ranges(&["10.0.0.0/24"]))).build();
        assert_eq!(
            policy_with(Some("not-a-cidr")).decide(&req).verdict,
            Verdict::Errored(500)
        );
    }

    #[test]
    fn test_non_default_controller_skips_cidr() {
        let req = create(controller("sharded", ranges(&["192.168.1.0/24"]))).build();
        assert!(policy_with(Some("10.0.0.0/16")).decide(&req).is_allowed());
    }
}
