use std::path::PathBuf;

/// 单个链接的最终结果。失败只作为结果返回，不会向上抛出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success { path: PathBuf, bytes: u64 },
    Failed { reason: String },
}

impl DownloadOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        DownloadOutcome::Failed { reason: reason.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DownloadOutcome::Failed { reason } => Some(reason),
            DownloadOutcome::Success { .. } => None,
        }
    }
}
