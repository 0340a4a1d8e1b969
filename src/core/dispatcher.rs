use log::error;

use crate::core::error::DownloadError;
use crate::core::link::{FormatTag, ResolvedLink};
use crate::core::task::{DownloadOutcome, RetryingStreamDownloader, SegmentedDownloader};

/// 按链接的格式选择下载策略
pub struct DownloadDispatcher {
    stream: RetryingStreamDownloader,
    segmented: SegmentedDownloader,
}

impl DownloadDispatcher {
    pub fn new(stream: RetryingStreamDownloader, segmented: SegmentedDownloader) -> Self {
        Self { stream, segmented }
    }

    pub async fn dispatch(&self, link: &ResolvedLink) -> DownloadOutcome {
        match link.format() {
            FormatTag::Stream => self.stream.download(link).await,
            FormatTag::Segmented => self.segmented.download(link).await,
            FormatTag::Unsupported(tag) => {
                error!("不支持的格式: {} ({})", tag, link.display_name());
                DownloadOutcome::failed(DownloadError::UnsupportedFormat(tag).to_string())
            }
        }
    }
}
