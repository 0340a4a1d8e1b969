use async_trait::async_trait;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::core::error::DownloadResult;
use crate::core::link::ResolvedLink;
use super::state::DownloadOutcome;

/// 分片传输能力：解析清单、并发拉取分片并合并成一个文件
#[async_trait(?Send)]
pub trait SegmentedTransfer {
    /// 成功时返回最终文件路径
    async fn transfer(&self, manifest_url: &str, output_dir: &Path, output_name: &str) -> DownloadResult<PathBuf>;
}

/// m3u8 下载：本身只负责命名、选目录和结果转换，重试由传输实现决定
pub struct SegmentedDownloader {
    transfer: Rc<dyn SegmentedTransfer>,
    output_dir: PathBuf,
}

impl SegmentedDownloader {
    pub fn new(transfer: Rc<dyn SegmentedTransfer>, output_dir: impl Into<PathBuf>) -> Self {
        Self { transfer, output_dir: output_dir.into() }
    }

    pub async fn download(&self, link: &ResolvedLink) -> DownloadOutcome {
        let name = link.stem();
        info!("开始下载 m3u8: {}", name);

        match self.transfer.transfer(link.as_str(), &self.output_dir, name).await {
            Ok(path) => {
                let bytes = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                info!("{} 下载成功: {}", name, path.display());
                DownloadOutcome::Success { path, bytes }
            }
            Err(e) => {
                error!("{} 分片下载失败: {}", name, e);
                DownloadOutcome::failed(e.to_string())
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeSegmentedTransfer;
    use super::*;

    #[tokio::test]
    async fn test_name_and_directory_passed_to_transfer() {
        let transfer = Rc::new(FakeSegmentedTransfer::default());
        let downloader = SegmentedDownloader::new(transfer.clone(), "south_park");

        let outcome = downloader
            .download(&ResolvedLink::new("https://cdn.example.com/hls/s03e07.m3u8?sig=1"))
            .await;

        assert_eq!(
            outcome,
            DownloadOutcome::Success { path: PathBuf::from("south_park/s03e07.ts"), bytes: 0 }
        );
        let calls = transfer.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://cdn.example.com/hls/s03e07.m3u8?sig=1");
        assert_eq!(calls[0].1, PathBuf::from("south_park"));
        assert_eq!(calls[0].2, "s03e07");
    }

    #[tokio::test]
    async fn test_transfer_error_becomes_failed_outcome() {
        let transfer = Rc::new(FakeSegmentedTransfer::failing());
        let downloader = SegmentedDownloader::new(transfer.clone(), "south_park");

        let outcome = downloader.download(&ResolvedLink::new("https://cdn.example.com/hls/e1.m3u8")).await;

        assert_eq!(outcome.reason(), Some("播放列表错误: 播放列表中没有分片"));
        assert_eq!(transfer.calls.borrow().len(), 1);
    }
}
