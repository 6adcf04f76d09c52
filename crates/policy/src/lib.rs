//! mcv-policy - 准入策略引擎
//!
//! 四种可复用的评估策略（允许名单、字段不可变、时长范围、CIDR 包含）、
//! 内置策略、注册表以及部署描述文件生成

pub mod descriptor;
pub mod policies;
pub mod policy;
pub mod registry;
pub mod strategy;

pub use descriptor::{PolicyDoc, ValidatingWebhookConfiguration, render_descriptors, render_docs, render_yaml};
pub use policy::{FailurePolicy, LabelSelector, Policy, derive_uri};
pub use registry::{PolicyConstructor, PolicySet, Registry};
