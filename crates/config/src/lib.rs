//! mcv-config - 配置加载库
//!
//! 加载顺序：内置默认值 → `default.toml` → `<APP_ENV>.toml` → `MCV_` 前缀环境变量

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 强制使用 JSON 日志（生产环境默认开启）
    #[serde(default)]
    pub json: bool,
    /// 是否暴露 /metrics
    #[serde(default = "default_true")]
    pub metrics: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            metrics: true,
        }
    }
}

/// Webhook 名称过滤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookFilterConfig {
    /// 非空时只启用列出的 webhook
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    vec!["debug-hook".to_string()]
}

impl Default for WebhookFilterConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: default_exclude(),
        }
    }
}

impl WebhookFilterConfig {
    /// 判断某个 webhook 是否启用
    pub fn is_enabled(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|n| n == name)
    }
}

/// 部署描述文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorConfig {
    #[serde(default = "default_descriptor_namespace")]
    pub namespace: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_descriptor_namespace() -> String {
    "openshift-validation-webhook".to_string()
}

fn default_service_name() -> String {
    "validation-webhook".to_string()
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            namespace: default_descriptor_namespace(),
            service_name: default_service_name(),
        }
    }
}

/// 策略的注入配置：允许名单、受保护名称模式与例外
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// break-glass 管理员
    pub break_glass_users: Vec<String>,
    /// SRE 管理组
    pub sre_admin_groups: Vec<String>,
    /// 特权 service account 组的正则
    pub privileged_service_account_pattern: String,
    pub namespaces: NamespaceSettings,
    pub cluster_role_bindings: ClusterRoleBindingSettings,
    pub scc: SccSettings,
    pub ingress: IngressSettings,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            break_glass_users: vec!["backplane-cluster-admin".to_string()],
            sre_admin_groups: vec!["system:serviceaccounts:openshift-backplane-srep".to_string()],
            privileged_service_account_pattern: r"^system:serviceaccounts:(kube-.*|openshift|openshift-.*|default|redhat-.*|osde2e-(h-)?[a-z0-9]{5})".to_string(),
            namespaces: NamespaceSettings::default(),
            cluster_role_bindings: ClusterRoleBindingSettings::default(),
            scc: SccSettings::default(),
            ingress: IngressSettings::default(),
        }
    }
}

/// Namespace 策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceSettings {
    /// 受保护 namespace 的正则
    pub privileged: Vec<String>,
    /// 即使匹配 privileged 也允许客户修改的 namespace
    pub exceptions: Vec<String>,
    pub cluster_admin_groups: Vec<String>,
    pub layered_product_group: String,
    pub layered_product_pattern: String,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            privileged: vec![
                "^kube$".to_string(),
                "^kube-.*".to_string(),
                "^default$".to_string(),
                "^redhat.*".to_string(),
                "^openshift.*".to_string(),
            ],
            exceptions: Vec::new(),
            cluster_admin_groups: vec!["cluster-admins".to_string()],
            layered_product_group: "layered-sre-cluster-admins".to_string(),
            layered_product_pattern: "^redhat-.*".to_string(),
        }
    }
}

/// ClusterRoleBinding 策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterRoleBindingSettings {
    pub protected_namespaces: String,
    pub exceptions: Vec<String>,
}

impl Default for ClusterRoleBindingSettings {
    fn default() -> Self {
        Self {
            protected_namespaces: "(^openshift-.*|kube-system)".to_string(),
            exceptions: vec![
                "openshift-logging".to_string(),
                "openshift-user-workload-monitoring".to_string(),
                "openshift-operators".to_string(),
                "openshift-backplane-managed-scripts".to_string(),
                "openshift-gitops".to_string(),
            ],
        }
    }
}

/// SCC 策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SccSettings {
    pub default_sccs: Vec<String>,
    pub allowed_users: Vec<String>,
}

impl Default for SccSettings {
    fn default() -> Self {
        Self {
            default_sccs: [
                "anyuid",
                "hostaccess",
                "hostmount-anyuid",
                "hostnetwork",
                "hostnetwork-v2",
                "node-exporter",
                "nonroot",
                "nonroot-v2",
                "privileged",
                "restricted",
                "restricted-v2",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_users: Vec::new(),
        }
    }
}

/// IngressController 策略配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressSettings {
    /// 集群机器网段；未配置时 CIDR 检查直接放行
    pub machine_cidr: Option<String>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub webhooks: WebhookFilterConfig,
    #[serde(default)]
    pub descriptor: DescriptorConfig,
    #[serde(default)]
    pub policies: PolicySettings,
}

fn default_app_name() -> String {
    "managed-cluster-validating-webhooks".to_string()
}

fn default_app_env() -> String {
    std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_env: default_app_env(),
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            webhooks: WebhookFilterConfig::default(),
            descriptor: DescriptorConfig::default(),
            policies: PolicySettings::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = default_app_env();

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("MCV_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否使用 JSON 日志
    pub fn wants_json_logs(&self) -> bool {
        self.is_production() || self.telemetry.json
    }
}
