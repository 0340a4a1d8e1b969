//! HTTP 访问层：下载流程只依赖 `HttpClient`，默认实现基于 awc

use async_trait::async_trait;
use awc::error::{ConnectError, SendRequestError};
use awc::http::header::{HeaderValue, CONTENT_LENGTH, USER_AGENT};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};

pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>>>>;

/// 一次 GET 的响应：状态码、长度和按需读取的响应体
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    body: BodyStream,
}

impl HttpResponse {
    pub fn new(status: u16, content_length: Option<u64>, body: BodyStream) -> Self {
        Self { status, content_length, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 非 2xx 状态转换为错误
    pub fn error_for_status(self, url: &str) -> DownloadResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DownloadError::HttpStatus { url: url.to_string(), status: self.status })
        }
    }

    /// 读取下一块数据，超过 `read_timeout` 没有数据视为超时
    pub async fn next_chunk(&mut self, read_timeout: Duration) -> DownloadResult<Option<Bytes>> {
        match tokio::time::timeout(read_timeout, self.body.next()).await {
            Ok(Some(chunk)) => chunk.map(Some),
            Ok(None) => Ok(None),
            Err(_) => Err(DownloadError::Timeout(format!(
                "{} 秒内没有读到数据",
                read_timeout.as_secs_f64()
            ))),
        }
    }

    /// 读完整个响应体，最多 `limit` 字节
    pub async fn bytes(mut self, limit: usize, read_timeout: Duration) -> DownloadResult<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk(read_timeout).await? {
            if buf.len() + chunk.len() > limit {
                return Err(DownloadError::Network(format!("响应体超过 {} 字节上限", limit)));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// 页面文本，超出上限的部分直接截断
    pub async fn text(mut self, limit: usize, read_timeout: Duration) -> DownloadResult<String> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk(read_timeout).await? {
            let room = limit.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if buf.len() >= limit {
                log::debug!("页面超过 {} 字节，已截断", limit);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// 下载流程使用的 HTTP 能力
#[async_trait(?Send)]
pub trait HttpClient {
    async fn get(&self, url: &str) -> DownloadResult<HttpResponse>;
}

/// 基于 awc 的实现，整批下载共用一个实例
pub struct AwcClient {
    client: awc::Client,
    request_timeout: Duration,
}

impl AwcClient {
    pub fn new(config: &Config) -> DownloadResult<Self> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| DownloadError::Config(format!("无效的 User-Agent: {}", e)))?;
        let connector = awc::Connector::new().timeout(config.connect_timeout());
        // 整体超时由 get() 控制，awc 自带的超时会连响应体一起计算
        let client = awc::Client::builder()
            .connector(connector)
            .disable_timeout()
            .add_default_header((USER_AGENT, user_agent))
            .finish();

        Ok(Self { client, request_timeout: config.timeout() })
    }
}

fn map_send_error(url: &str, error: SendRequestError) -> DownloadError {
    match error {
        SendRequestError::Timeout | SendRequestError::Connect(ConnectError::Timeout) => {
            DownloadError::Timeout(format!("连接 {} 超时", url))
        }
        SendRequestError::Url(e) => DownloadError::InvalidUrl(format!("{}: {}", url, e)),
        other => DownloadError::Network(format!("{}: {}", url, other)),
    }
}

#[async_trait(?Send)]
impl HttpClient for AwcClient {
    async fn get(&self, url: &str) -> DownloadResult<HttpResponse> {
        let response = tokio::time::timeout(self.request_timeout, self.client.get(url).send())
            .await
            .map_err(|_| DownloadError::Timeout(format!("等待 {} 响应超时", url)))?
            .map_err(|e| map_send_error(url, e))?;

        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response.map(|chunk| {
            chunk.map_err(|e| DownloadError::Network(format!("读取响应体失败: {}", e)))
        });

        Ok(HttpResponse::new(status, content_length, Box::pin(body)))
    }
}
