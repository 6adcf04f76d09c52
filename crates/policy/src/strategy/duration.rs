//! 时长范围校验
//!
//! 时长格式 `^(\d+)([yMwdhHms])$`，换算使用固定倍数：
//! y=365d, M=31d, w=7d, d=24h, h=H=60m, m=60s，与日历无关

use std::fmt;
use std::str::FromStr;

use mcv_admission::{AdmissionRequest, Decision, IdentityClass, IdentityClassifier, decode_raw};
use mcv_errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::{lookup, split_path};

static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([yMwdhHms])$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("unable to parse duration {0:?}")]
    Invalid(String),
    #[error("duration {0:?} is too large")]
    Overflow(String),
}

/// 时长单位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "s" => Some(Self::Seconds),
            "m" => Some(Self::Minutes),
            "h" | "H" => Some(Self::Hours),
            "d" => Some(Self::Days),
            "w" => Some(Self::Weeks),
            "M" => Some(Self::Months),
            "y" => Some(Self::Years),
            _ => None,
        }
    }

    /// 每单位的秒数
    pub fn seconds(&self) -> u64 {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => DAY,
            Self::Weeks => 7 * DAY,
            Self::Months => 31 * DAY,
            Self::Years => 365 * DAY,
        }
    }
}

/// 解析后的时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionDuration {
    pub count: u64,
    pub unit: DurationUnit,
    seconds: u64,
}

impl RetentionDuration {
    pub fn as_seconds(&self) -> u64 {
        self.seconds
    }
}

impl FromStr for RetentionDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DURATION_REGEX
            .captures(s)
            .ok_or_else(|| DurationError::Invalid(s.to_string()))?;
        let unit = DurationUnit::from_symbol(&caps[2])
            .ok_or_else(|| DurationError::Invalid(s.to_string()))?;
        let count: u64 = caps[1]
            .parse()
            .map_err(|_| DurationError::Overflow(s.to_string()))?;
        let seconds = count
            .checked_mul(unit.seconds())
            .ok_or_else(|| DurationError::Overflow(s.to_string()))?;
        Ok(Self {
            count,
            unit,
            seconds,
        })
    }
}

/// 闭区间 [lower, upper]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationBound {
    lower: RetentionDuration,
    upper: RetentionDuration,
    label: String,
}

impl DurationBound {
    /// 边界本身非法属于配置错误
    pub fn new(lower: &str, upper: &str) -> AppResult<Self> {
        let parse = |s: &str| {
            s.parse::<RetentionDuration>()
                .map_err(|e| AppError::configuration(format!("invalid duration bound: {}", e)))
        };
        let (low, high) = (parse(lower)?, parse(upper)?);
        if low.as_seconds() > high.as_seconds() {
            return Err(AppError::configuration(format!(
                "duration bound lower {} exceeds upper {}",
                lower, upper
            )));
        }
        Ok(Self {
            lower: low,
            upper: high,
            label: format!("[{}, {}]", lower, upper),
        })
    }

    pub fn contains(&self, duration: &RetentionDuration) -> bool {
        let seconds = duration.as_seconds();
        self.lower.as_seconds() <= seconds && seconds <= self.upper.as_seconds()
    }
}

impl fmt::Display for DurationBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// 对象中的一个时长字段
#[derive(Debug, Clone)]
pub struct DurationField {
    name: &'static str,
    segments: Vec<String>,
    bound: DurationBound,
    hint: &'static str,
}

impl DurationField {
    pub fn new(name: &'static str, path: &str, bound: DurationBound, hint: &'static str) -> Self {
        Self {
            name,
            segments: split_path(path),
            bound,
            hint,
        }
    }

    /// 校验单个字段
    pub fn check(&self, object: &Value) -> Option<DurationViolation> {
        let Some(raw) = lookup(object, &self.segments) else {
            return Some(DurationViolation::Missing {
                field: self.name,
                hint: self.hint,
            });
        };
        let Some(text) = raw.as_str() else {
            return Some(DurationViolation::Unparseable {
                field: self.name,
                value: raw.to_string(),
            });
        };
        match text.parse::<RetentionDuration>() {
            Err(_) => Some(DurationViolation::Unparseable {
                field: self.name,
                value: text.to_string(),
            }),
            Ok(duration) if !self.bound.contains(&duration) => Some(DurationViolation::OutOfRange {
                field: self.name,
                value: text.to_string(),
                bound: self.bound.to_string(),
                hint: self.hint,
            }),
            Ok(_) => None,
        }
    }
}

/// 字段校验失败的类别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationViolation {
    Missing {
        field: &'static str,
        hint: &'static str,
    },
    Unparseable {
        field: &'static str,
        value: String,
    },
    OutOfRange {
        field: &'static str,
        value: String,
        bound: String,
        hint: &'static str,
    },
}

impl fmt::Display for DurationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field, hint } => {
                write!(f, "{} must not be unset. Hint: {}", field, hint)
            }
            Self::Unparseable { field, value } => {
                write!(f, "{} value {} is unparseable", field, value)
            }
            Self::OutOfRange {
                field,
                value,
                bound,
                hint,
            } => write!(
                f,
                "{} value {} is out of range {}. Hint: {}",
                field, value, bound, hint
            ),
        }
    }
}

/// 时长范围守卫，作用于新对象
#[derive(Debug, Clone)]
pub struct DurationRangeGuard {
    subject: &'static str,
    classifier: IdentityClassifier,
    fields: Vec<DurationField>,
}

impl DurationRangeGuard {
    pub fn new(subject: &'static str, classifier: IdentityClassifier, fields: Vec<DurationField>) -> Self {
        Self {
            subject,
            classifier,
            fields,
        }
    }

    /// 独立校验每个字段，返回全部失败项
    pub fn violations(&self, object: &Value) -> Vec<DurationViolation> {
        self.fields.iter().filter_map(|f| f.check(object)).collect()
    }

    pub fn decide(&self, req: &AdmissionRequest) -> AppResult<Decision> {
        match self.classifier.classify(&req.user_info) {
            IdentityClass::ExplicitDeny => {
                return Ok(Decision::denied("Unauthenticated requests are not allowed"));
            }
            IdentityClass::Bypass(reason) => {
                return Ok(Decision::allowed(format!(
                    "{} may configure {}",
                    reason, self.subject
                )));
            }
            IdentityClass::Ordinary => {}
        }

        let object: Value = decode_raw(req.object.as_deref(), self.subject)?;
        let violations = self.violations(&object);
        if violations.is_empty() {
            return Ok(Decision::allowed(format!(
                "{} retention settings are within the allowed range",
                self.subject
            )));
        }

        let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Ok(Decision::denied(format!(
            "The entered {} retention policy is not allowed: {}",
            self.subject,
            reasons.join("; ")
        )))
    }
}
