//! scc-validation - 默认 SCC 保护

use mcv_admission::{
    AdmissionRequest, Decision, Operation, ResourceMatcher, Scope, decode_metadata,
};
use mcv_config::PolicySettings;
use mcv_errors::AppResult;

use crate::policy::{Policy, settle};
use crate::strategy::{AllowList, AllowListGuard, ProtectedTarget};

use super::admin_classifier;

pub const NAME: &str = "scc-validation";
const KIND: &str = "SecurityContextConstraints";

pub struct SccPolicy {
    guard: AllowListGuard,
    default_sccs: Vec<String>,
}

impl SccPolicy {
    pub fn new(settings: &PolicySettings) -> AppResult<Self> {
        let classifier = admin_classifier(settings).allow_users(settings.scc.allowed_users.iter().cloned());
        let protected = AllowList::new().exact(settings.scc.default_sccs.iter().cloned());
        Ok(Self {
            guard: AllowListGuard::new(
                KIND,
                classifier,
                protected,
                &[Operation::Update, Operation::Delete],
            ),
            default_sccs: settings.scc.default_sccs.clone(),
        })
    }
}

impl Policy for SccPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn doc(&self) -> String {
        format!(
            "Managed OpenShift Customers may not modify the following default SCCs: [{}]",
            self.default_sccs.join(" ")
        )
    }

    fn matchers(&self) -> Vec<ResourceMatcher> {
        vec![
            ResourceMatcher::new(&[Operation::Update, Operation::Delete])
                .api_groups(&["security.openshift.io"])
                .resources(&["securitycontextconstraints"])
                .scope(Scope::Cluster),
        ]
    }

    fn kind(&self) -> Option<&'static str> {
        Some(KIND)
    }

    fn decide(&self, req: &AdmissionRequest) -> Decision {
        settle(
            NAME,
            self.guard.decide(req, |req| {
                // 更新和删除都以旧对象为准
                let raw = req.old_object.as_deref().or(req.object.as_deref());
                decode_metadata(raw, KIND).map(ProtectedTarget::named)
            }),
        )
    }
}
