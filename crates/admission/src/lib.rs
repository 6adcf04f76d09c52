//! mcv-admission - 准入协议核心库
//!
//! AdmissionReview 请求/响应模型、调用者身份分类、资源匹配规则与对象解码

pub mod decision;
pub mod decode;
pub mod identity;
pub mod matcher;
pub mod request;
pub mod review;

pub use decision::{Decision, Verdict};
pub use decode::{ObjectMeta, decode_metadata, decode_raw};
pub use identity::{BypassReason, IdentityClass, IdentityClassifier, UNAUTHENTICATED_USER};
pub use matcher::{ResourceMatcher, Scope};
pub use request::{AdmissionRequest, GroupVersionKind, GroupVersionResource, Operation, UserInfo};
pub use review::{AdmissionResponse, AdmissionReview, ResponseStatus};

/// 所有响应携带的审计注解
pub const OWNER_ANNOTATION_KEY: &str = "owner";
pub const OWNER_ANNOTATION_VALUE: &str = "srep-managed-webhook";
