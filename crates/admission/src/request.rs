//! request - 准入请求模型

use std::fmt;

use mcv_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// 变更操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

/// 发起请求的用户
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            uid: String::new(),
            groups,
        }
    }
}

/// 准入请求
///
/// `object` 与 `old_object` 保持原始 JSON，由各策略按需解码
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub operation: Operation,
    pub user_info: UserInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl AdmissionRequest {
    /// 校验操作与对象载荷的对应关系
    ///
    /// Create 需要新对象，Delete 需要旧对象，Update 两者都需要
    pub fn validate(&self) -> AppResult<()> {
        if self.uid.is_empty() {
            return Err(AppError::decode("request uid is empty"));
        }
        let (needs_new, needs_old) = match self.operation {
            Operation::Create => (true, false),
            Operation::Update => (true, true),
            Operation::Delete => (false, true),
        };
        if needs_new && self.object.is_none() {
            return Err(AppError::decode(format!(
                "{} request is missing the object",
                self.operation
            )));
        }
        if needs_old && self.old_object.is_none() {
            return Err(AppError::decode(format!(
                "{} request is missing the oldObject",
                self.operation
            )));
        }
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.user_info.username
    }

    /// 本次操作作用的对象：删除时为旧对象，其余为新对象
    pub fn target_object(&self) -> Option<&RawValue> {
        match self.operation {
            Operation::Delete => self.old_object.as_deref(),
            Operation::Create | Operation::Update => self.object.as_deref(),
        }
    }
}
