//! 可复用的评估策略

pub mod allowlist;
pub mod cidr;
pub mod duration;
pub mod field_diff;

pub use allowlist::{AllowList, AllowListGuard, ProtectedTarget, ProvenanceOverride};
pub use cidr::{CidrContainment, CidrOutcome};
pub use duration::{
    DurationBound, DurationError, DurationField, DurationRangeGuard, DurationUnit,
    DurationViolation, RetentionDuration,
};
pub use field_diff::{FieldDiffGuard, FieldWatch, changed_paths};

use serde_json::Value;

/// 按点分路径在 JSON 树中查找，`null` 视为不存在
pub(crate) fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}
