use log::{error, info};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::core::error::DownloadResult;
use crate::core::http::HttpClient;
use crate::core::link::ResolvedLink;
use crate::ui::ProgressSink;
use super::retry::{run_with_retry, RetryStrategy};
use super::state::DownloadOutcome;
use super::util::{destination, ensure_dir, split_chunks, TransferProgress};

/// mp4 这类单文件的流式下载，失败后整体重试
pub struct RetryingStreamDownloader {
    client: Rc<dyn HttpClient>,
    output_dir: PathBuf,
    chunk_size: usize,
    read_timeout: Duration,
    retry: RetryStrategy,
    progress: Rc<dyn ProgressSink>,
}

impl RetryingStreamDownloader {
    pub fn new(client: Rc<dyn HttpClient>, config: &Config, progress: Rc<dyn ProgressSink>) -> Self {
        Self {
            client,
            output_dir: PathBuf::from(&config.download_dir),
            chunk_size: config.chunk_size,
            read_timeout: config.read_timeout(),
            retry: RetryStrategy::from_config(config),
            progress,
        }
    }

    pub fn destination(&self, link: &ResolvedLink) -> PathBuf {
        destination(&self.output_dir, link.file_name())
    }

    pub async fn download(&self, link: &ResolvedLink) -> DownloadOutcome {
        let dest = self.destination(link);
        let dest_ref = &dest;

        match run_with_retry(&self.retry, link.as_str(), move || self.attempt(link, dest_ref)).await {
            Ok(bytes) => {
                info!("下载完成: {} ({} 字节)", dest.display(), bytes);
                DownloadOutcome::Success { path: dest, bytes }
            }
            Err(e) => {
                error!("下载失败: {}: {}", link, e);
                // 不留下半截文件
                if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
                    log::debug!("清理 {} 失败: {}", dest.display(), remove_err);
                }
                DownloadOutcome::failed(e.to_string())
            }
        }
    }

    /// 一次完整的下载尝试；每次都重新创建并截断目标文件
    async fn attempt(&self, link: &ResolvedLink, dest: &Path) -> DownloadResult<u64> {
        ensure_dir(&self.output_dir).await?;

        let mut response = self.client.get(link.as_str()).await?.error_for_status(link.as_str())?;
        let mut progress = TransferProgress::new(response.content_length);
        let mut file = File::create(dest).await?;
        let name = link.display_name();

        self.progress.begin(name, progress.total());
        let result: DownloadResult<u64> = async {
            while let Some(data) = response.next_chunk(self.read_timeout).await? {
                for chunk in split_chunks(data, self.chunk_size) {
                    file.write_all(&chunk).await?;
                    progress.advance(chunk.len() as u64);
                    self.progress.update(name, &progress);
                }
            }
            file.flush().await?;
            progress.ensure_complete()?;
            Ok(progress.downloaded())
        }
        .await;
        self.progress.finish(name, result.is_ok());

        result
    }
}
