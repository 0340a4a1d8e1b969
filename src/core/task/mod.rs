//! `task` 模块包含了与单个链接下载相关的所有逻辑
//!
//! 主要包括：
//! - `stream`: mp4 单流下载 `RetryingStreamDownloader`
//! - `segmented`: m3u8 下载 `SegmentedDownloader` 与 `SegmentedTransfer`
//! - `hls`: 内置的 HLS 分片传输
//! - `state`: 下载结果 `DownloadOutcome`
//! - `retry`: 重试逻辑
//! - `util`: 进度与文件工具

pub mod hls;
pub mod retry;
pub mod segmented;
pub mod state;
pub mod stream;
pub mod util;

pub use hls::HlsTransfer;
pub use retry::{run_with_retry, RetryContext, RetryStrategy};
pub use segmented::{SegmentedDownloader, SegmentedTransfer};
pub use state::DownloadOutcome;
pub use stream::RetryingStreamDownloader;
pub use util::TransferProgress;
