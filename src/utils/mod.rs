//! Utils: 日志初始化与参数校验

pub mod logger;
pub mod validator;
