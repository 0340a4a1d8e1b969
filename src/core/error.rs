use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求超时: {0}")]
    Timeout(String),

    #[error("服务器返回 HTTP {status}: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("响应体不完整: 预期 {expected} 字节, 实际 {actual} 字节")]
    IncompleteBody { expected: u64, actual: u64 },

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("无效的链接匹配规则: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("播放列表错误: {0}")]
    Playlist(String),

    #[error("不支持的格式: {0}")]
    UnsupportedFormat(String),

    #[error("重试 {attempts} 次后仍然失败: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("Actor 消息投递失败: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// 传输过程中的错误都可以重试，配置类错误重试也没有意义
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::Network(_)
                | DownloadError::Timeout(_)
                | DownloadError::HttpStatus { .. }
                | DownloadError::Io(_)
                | DownloadError::IncompleteBody { .. }
        )
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;
