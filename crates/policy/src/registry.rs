//! registry - 策略注册表
//!
//! 启动时按名称注册构造函数，构造后得到不可变的 [`PolicySet`]，
//! 之后只读共享，不存在运行期注册

use std::collections::HashMap;
use std::sync::Arc;

use mcv_config::{PolicySettings, WebhookFilterConfig};
use mcv_errors::{AppError, AppResult};
use tracing::{debug, info};

use crate::policies::{
    ClusterLoggingPolicy, ClusterRoleBindingPolicy, HiveOwnershipPolicy, IngressControllerPolicy,
    NamespacePolicy, NetworkOperatorPolicy, SccPolicy, cluster_logging, cluster_role_binding,
    hive_ownership, ingress_controller, namespace, network_operator, scc,
};
use crate::policy::Policy;

/// 策略构造函数
pub type PolicyConstructor = fn(&PolicySettings) -> AppResult<Arc<dyn Policy>>;

/// 名称 → 构造函数，保持注册顺序
#[derive(Default)]
pub struct Registry {
    entries: Vec<(&'static str, PolicyConstructor)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册构造函数，同名重复注册返回配置错误
    pub fn register(&mut self, name: &'static str, constructor: PolicyConstructor) -> AppResult<()> {
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(AppError::configuration(format!(
                "webhook {} is registered twice",
                name
            )));
        }
        self.entries.push((name, constructor));
        Ok(())
    }

    /// 全部内置策略
    pub fn builtin() -> Self {
        let entries: Vec<(&'static str, PolicyConstructor)> = vec![
            (cluster_logging::NAME, new_cluster_logging as PolicyConstructor),
            (cluster_role_binding::NAME, new_cluster_role_binding as PolicyConstructor),
            (hive_ownership::NAME, new_hive_ownership as PolicyConstructor),
            (ingress_controller::NAME, new_ingress_controller as PolicyConstructor),
            (namespace::NAME, new_namespace as PolicyConstructor),
            (network_operator::NAME, new_network_operator as PolicyConstructor),
            (scc::NAME, new_scc as PolicyConstructor),
        ];
        Self { entries }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    /// 按过滤配置构造所有启用的策略
    pub fn build(
        &self,
        settings: &PolicySettings,
        filter: &WebhookFilterConfig,
    ) -> AppResult<PolicySet> {
        let mut policies = Vec::with_capacity(self.entries.len());
        for (name, constructor) in &self.entries {
            if !filter.is_enabled(name) {
                debug!(webhook = *name, "webhook disabled by configuration");
                continue;
            }
            let policy = constructor(settings)?;
            if policy.name() != *name {
                return Err(AppError::configuration(format!(
                    "webhook registered as {} reports name {}",
                    name,
                    policy.name()
                )));
            }
            policies.push(policy);
        }
        let set = PolicySet::from_policies(policies)?;
        info!(count = set.len(), "webhook policies constructed");
        Ok(set)
    }
}

fn new_cluster_logging(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(ClusterLoggingPolicy::new(s)?))
}

fn new_cluster_role_binding(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(ClusterRoleBindingPolicy::new(s)?))
}

fn new_hive_ownership(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(HiveOwnershipPolicy::new(s)?))
}

fn new_ingress_controller(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(IngressControllerPolicy::new(s)?))
}

fn new_namespace(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(NamespacePolicy::new(s)?))
}

fn new_network_operator(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(NetworkOperatorPolicy::new(s)?))
}

fn new_scc(s: &PolicySettings) -> AppResult<Arc<dyn Policy>> {
    Ok(Arc::new(SccPolicy::new(s)?))
}

/// 已构造的策略集合，按 URI 路由
#[derive(Clone, Default)]
pub struct PolicySet {
    policies: Vec<Arc<dyn Policy>>,
    by_uri: HashMap<String, usize>,
}

impl PolicySet {
    /// 校验名称与 URI 唯一、规则非空
    pub fn from_policies(policies: Vec<Arc<dyn Policy>>) -> AppResult<Self> {
        let mut by_uri = HashMap::with_capacity(policies.len());
        for (idx, policy) in policies.iter().enumerate() {
            if policy.matchers().is_empty() {
                return Err(AppError::configuration(format!(
                    "webhook {} declares no resource matchers",
                    policy.name()
                )));
            }
            if policies[..idx].iter().any(|p| p.name() == policy.name()) {
                return Err(AppError::configuration(format!(
                    "duplicate webhook name {}",
                    policy.name()
                )));
            }
            let uri = policy.uri();
            if let Some(existing) = by_uri.insert(uri.clone(), idx) {
                return Err(AppError::configuration(format!(
                    "webhooks {} and {} both serve {}",
                    policies[existing].name(),
                    policy.name(),
                    uri
                )));
            }
        }
        Ok(Self { policies, by_uri })
    }

    /// 按请求路径查找策略
    pub fn resolve(&self, uri: &str) -> Option<&Arc<dyn Policy>> {
        self.by_uri.get(uri).map(|&idx| &self.policies[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Policy>> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
