//! mcv-bootstrap - 服务启动骨架
//!
//! 日志初始化与关闭信号

mod runtime;

pub use runtime::*;
