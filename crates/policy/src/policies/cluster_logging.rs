//! clusterlogging-validation - 日志保留时长范围

use mcv_admission::{AdmissionRequest, Decision, Operation, ResourceMatcher, Scope};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;

use crate::policy::{Policy, settle};
use crate::strategy::{DurationBound, DurationField, DurationRangeGuard};

use super::admin_classifier;

pub const NAME: &str = "clusterlogging-validation";
const KIND: &str = "ClusterLogging";

pub struct ClusterLoggingPolicy {
    guard: DurationRangeGuard,
}

impl ClusterLoggingPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        let fields = vec![
            DurationField::new(
                "app",
                "spec.logStore.retentionPolicy.application.maxAge",
                DurationBound::new("1h", "7d")?,
                "Set MaxAge to a value <= 7d, >= 1h",
            ),
            DurationField::new(
                "infra",
                "spec.logStore.retentionPolicy.infra.maxAge",
                DurationBound::new("1h", "1h")?,
                "MaxAge must be 1h",
            ),
            DurationField::new(
                "audit",
                "spec.logStore.retentionPolicy.audit.maxAge",
                DurationBound::new("1h", "1h")?,
                "audit log must be 1h",
            ),
        ];
        Ok(Self {
            guard: DurationRangeGuard::new(KIND, admin_classifier(settings), fields),
        })
    }
}

impl Policy for ClusterLoggingPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        "Managed OpenShift Customers may not set log retention outside the allowed range of 1h-7d for application logs; infra and audit logs must be retained for exactly 1h".to_string()
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Create, Operation::Update])
                .api_groups(&["logging.openshift.io"])
                .api_versions(&["v1"])
                .resources(&["clusterloggings"])
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
        settle(NAME, self.guard.decide(req))
    }
}
