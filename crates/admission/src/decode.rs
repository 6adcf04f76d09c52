//! decode - 可重入的对象解码
//!
//! 原始 JSON + 类型说明 → 具体类型或 Decode 错误，不持有任何状态

use std::collections::BTreeMap;

use mcv_errors::{AppError, AppResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

/// 解码原始对象
///
/// `what` 只用于错误说明，如 `"SecurityContextConstraints"`
pub fn decode_raw<T: DeserializeOwned>(raw: Option<&RawValue>, what: &str) -> AppResult<T> {
    let raw = raw.ok_or_else(|| AppError::decode(format!("{} payload is missing", what)))?;
    serde_json::from_str(raw.get())
        .map_err(|e| AppError::decode(format!("failed to decode {}: {}", what, e)))
}

/// 对象元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct MetadataOnly {
    #[serde(default)]
    metadata: ObjectMeta,
}

/// 只解码对象的 metadata
pub fn decode_metadata(raw: Option<&RawValue>, what: &str) -> AppResult<ObjectMeta> {
    decode_raw::<MetadataOnly>(raw, what).map(|m| m.metadata)
}
