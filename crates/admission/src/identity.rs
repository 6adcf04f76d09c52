//! 调用者身份分类器
//!
//! 所有策略共用的第一道放行判断

use std::fmt;

use mcv_errors::{AppError, AppResult};
use regex::Regex;
use tracing::warn;

use crate::request::UserInfo;

/// 未认证用户
pub const UNAUTHENTICATED_USER: &str = "system:unauthenticated";

/// 放行原因，用于决策说明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    SystemUser,
    KubeUser,
    AllowedUser(String),
    AllowedGroup(String),
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemUser => f.write_str("system user"),
            Self::KubeUser => f.write_str("kube user"),
            Self::AllowedUser(user) => write!(f, "allowed user {}", user),
            Self::AllowedGroup(group) => write!(f, "member of allowed group {}", group),
        }
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityClass {
    Bypass(BypassReason),
    Ordinary,
    ExplicitDeny,
}

impl IdentityClass {
    pub fn is_bypass(&self) -> bool {
        matches!(self, Self::Bypass(_))
    }
}

/// 身份分类器
///
/// # 分类规则（先匹配先生效）
/// 1. `system:unauthenticated` → ExplicitDeny
/// 2. `system:` 前缀 → Bypass
/// 3. `kube:` 前缀 → Bypass
/// 4. 用户名在允许名单 → Bypass
/// 5. 任一组在允许名单或匹配组正则 → Bypass
/// 6. 其余 → Ordinary
///
/// 1-3 对所有策略固定，策略只能配置 4、5
#[derive(Debug, Clone, Default)]
pub struct IdentityClassifier {
    users: Vec<String>,
    groups: Vec<String>,
    group_patterns: Vec<Regex>,
}

impl IdentityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    pub fn allow_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// 添加组正则，非法正则属于配置错误
    pub fn allow_group_pattern(mut self, pattern: &str) -> AppResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            AppError::configuration(format!("invalid group pattern {:?}: {}", pattern, e))
        })?;
        self.group_patterns.push(regex);
        Ok(self)
    }

    /// 对调用者分类
    pub fn classify(&self, user: &UserInfo) -> IdentityClass {
        let username = user.username.as_str();

        if username == UNAUTHENTICATED_USER {
            warn!(
                username,
                "unauthenticated request reached the webhook, check RBAC configuration"
            );
            return IdentityClass::ExplicitDeny;
        }
        if username.starts_with("system:") {
            return IdentityClass::Bypass(BypassReason::SystemUser);
        }
        if username.starts_with("kube:") {
            return IdentityClass::Bypass(BypassReason::KubeUser);
        }
        if self.users.iter().any(|u| u == username) {
            return IdentityClass::Bypass(BypassReason::AllowedUser(username.to_string()));
        }
        for group in &user.groups {
            if self.groups.iter().any(|g| g == group)
                || self.group_patterns.iter().any(|p| p.is_match(group))
            {
                return IdentityClass::Bypass(BypassReason::AllowedGroup(group.clone()));
            }
        }

        IdentityClass::Ordinary
    }
}
