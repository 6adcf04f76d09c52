//! mcv-errors - 统一错误处理
//!
//! 准入请求处理链路中的错误分类：解码失败、策略内部计算失败、启动期配置错误

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// 请求或对象载荷无法解析
    #[error("Decode error: {0}")]
    Decode(String),

    /// 载荷可解析，但不是该 webhook 能处理的请求
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 策略自身的辅助计算失败（如参考网段无法解析）
    #[error("Policy internal error: {0}")]
    PolicyInternal(String),

    /// 编写期错误：重复 URI、缺少匹配规则等，只会在启动或生成描述文件时出现
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn policy_internal(msg: impl Into<String>) -> Self {
        Self::PolicyInternal(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Decode(_) => 400,
            Self::InvalidRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::PolicyInternal(_) => 500,
            Self::Configuration(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// metav1.Status 中使用的 reason
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Decode(_) | Self::InvalidRequest(_) => "BadRequest",
            Self::NotFound(_) => "NotFound",
            Self::PolicyInternal(_) | Self::Configuration(_) | Self::Internal(_) => {
                "InternalError"
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
