//! 内置策略

pub mod cluster_logging;
pub mod cluster_role_binding;
pub mod hive_ownership;
pub mod ingress_controller;
pub mod namespace;
pub mod network_operator;
pub mod scc;

pub use cluster_logging::ClusterLoggingPolicy;
pub use cluster_role_binding::ClusterRoleBindingPolicy;
pub use hive_ownership::HiveOwnershipPolicy;
pub use ingress_controller::IngressControllerPolicy;
pub use namespace::NamespacePolicy;
pub use network_operator::NetworkOperatorPolicy;
pub use scc::SccPolicy;

use mcv_admission::IdentityClassifier;
use mcv_config::PolicySettings;

/// break-glass 用户 + SRE 管理组
fn admin_classifier(settings: &PolicySettings) -> IdentityClassifier {
    IdentityClassifier::new()
        .allow_users(settings.break_glass_users.iter().cloned())
        .allow_groups(settings.sre_admin_groups.iter().cloned())
}
