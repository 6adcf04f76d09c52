//! CIDR 包含校验
//!
//! 每个候选网段必须是参考网段的子集；不同地址族的候选直接忽略

use ipnet::IpNet;
use mcv_errors::{AppError, AppResult};

/// 检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CidrOutcome {
    /// 没有候选网段
    NoCandidates,
    /// 未配置参考网段
    NoReference,
    /// 全部包含
    Contained,
    /// 无法解析的候选
    Unparseable(Vec<String>),
    /// 不被包含的候选
    NotContained(Vec<String>),
}

impl CidrOutcome {
    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::NoCandidates | Self::NoReference | Self::Contained)
    }
}

/// 候选网段的前缀长度不小于参考网段，且网络地址落在参考网段内
pub fn contains(reference: &IpNet, candidate: &IpNet) -> bool {
    match (reference, candidate) {
        (IpNet::V4(r), IpNet::V4(c)) => c.prefix_len() >= r.prefix_len() && r.contains(&c.network()),
        (IpNet::V6(r), IpNet::V6(c)) => c.prefix_len() >= r.prefix_len() && r.contains(&c.network()),
        _ => true,
    }
}

/// 以参考网段为上界的包含校验
#[derive(Debug, Clone, Default)]
pub struct CidrContainment {
    reference: Option<String>,
}

impl CidrContainment {
    pub fn new(reference: Option<String>) -> Self {
        Self {
            reference: reference.filter(|r| !r.trim().is_empty()),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// 参考网段非法时返回 PolicyInternal 错误
    pub fn check<S: AsRef<str>>(&self, candidates: &[S]) -> AppResult<CidrOutcome> {
        let candidates: Vec<&str> = candidates
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .collect();
        if candidates.is_empty() {
            return Ok(CidrOutcome::NoCandidates);
        }
        let Some(reference) = self.reference.as_deref() else {
            return Ok(CidrOutcome::NoReference);
        };
        let reference: IpNet = reference.trim().parse().map_err(|e| {
            AppError::policy_internal(format!(
                "failed to parse reference network {:?}: {}",
                reference, e
            ))
        })?;

        let mut unparseable = Vec::new();
        let mut outside = Vec::new();
        for candidate in candidates {
            match candidate.parse::<IpNet>() {
                Ok(net) if contains(&reference, &net) => {}
                Ok(_) => outside.push(candidate.to_string()),
                Err(_) => unparseable.push(candidate.to_string()),
            }
        }

        if !unparseable.is_empty() {
            return Ok(CidrOutcome::Unparseable(unparseable));
        }
        if !outside.is_empty() {
            return Ok(CidrOutcome::NotContained(outside));
        }
        Ok(CidrOutcome::Contained)
    }
}
