use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::core::error::{DownloadError, DownloadResult};

/// 单次下载过程中的进度，不跨下载共享
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferProgress {
    downloaded: u64,
    total: Option<u64>,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self { downloaded: 0, total }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.downloaded += bytes;
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// 百分比；总大小未知时为 0
    pub fn percent(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => (self.downloaded as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        }
    }

    /// 已知总大小时，检查是否真的收全了
    pub fn ensure_complete(&self) -> DownloadResult<()> {
        match self.total {
            Some(expected) if self.downloaded < expected => Err(DownloadError::IncompleteBody {
                expected,
                actual: self.downloaded,
            }),
            _ => Ok(()),
        }
    }
}

/// 把网络层返回的数据块切成不超过 `chunk_size` 的小块
pub fn split_chunks(mut data: Bytes, chunk_size: usize) -> impl Iterator<Item = Bytes> {
    let chunk_size = chunk_size.max(1);
    std::iter::from_fn(move || {
        if data.is_empty() {
            None
        } else {
            let n = chunk_size.min(data.len());
            Some(data.split_to(n))
        }
    })
}

/// 创建输出目录，已存在或被并发创建都不算错误
pub async fn ensure_dir(dir: &Path) -> DownloadResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

pub fn destination(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(file_name)
}
