//! Core: 链接解析、按格式分派下载、批量编排和失败汇总

pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod link;
pub mod report;
pub mod resolver;
pub mod task;

// 只导出主流程和其它模块实际用到的类型
pub use batch::{BatchOrchestrator, BatchState};
pub use dispatcher::DownloadDispatcher;
pub use error::{DownloadError, DownloadResult};
pub use http::{AwcClient, HttpClient};
pub use link::{FormatTag, ResolvedLink};
pub use report::{FailedItem, FailureReport};
pub use resolver::LinkResolver;
