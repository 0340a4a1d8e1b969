use log::{debug, warn};
use regex::Regex;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};
use crate::core::http::HttpClient;
use crate::core::link::ResolvedLink;

/// 解析不到链接的原因。两种情况都只跳过当前条目
#[derive(Debug)]
pub enum ResolveMiss {
    /// 页面取不到
    Fetch(DownloadError),
    /// 页面里没有匹配的链接
    NoMatch,
}

impl fmt::Display for ResolveMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveMiss::Fetch(e) => write!(f, "获取页面失败: {}", e),
            ResolveMiss::NoMatch => f.write_str("页面中没有找到媒体链接"),
        }
    }
}

/// 根据条目标识取页面，用正则提取第一条媒体链接。不做重试
pub struct LinkResolver {
    client: Rc<dyn HttpClient>,
    page_url_template: String,
    pattern: Regex,
    max_page_size: usize,
    read_timeout: Duration,
}

impl LinkResolver {
    pub fn new(client: Rc<dyn HttpClient>, config: &Config) -> DownloadResult<Self> {
        Ok(Self {
            client,
            page_url_template: config.page_url_template.clone(),
            pattern: Regex::new(&config.link_pattern)?,
            max_page_size: config.max_page_size,
            read_timeout: config.read_timeout(),
        })
    }

    pub fn page_url(&self, identifier: &str) -> String {
        self.page_url_template.replace("{id}", identifier)
    }

    pub async fn resolve(&self, identifier: &str) -> Option<ResolvedLink> {
        match self.try_resolve(identifier).await {
            Ok(link) => {
                debug!("{} -> {}", identifier, link);
                Some(link)
            }
            Err(miss) => {
                warn!("跳过 {}: {}", identifier, miss);
                None
            }
        }
    }

    pub async fn try_resolve(&self, identifier: &str) -> Result<ResolvedLink, ResolveMiss> {
        let page_url = self.page_url(identifier);
        let page = Url::parse(&page_url)
            .map_err(|e| ResolveMiss::Fetch(DownloadError::InvalidUrl(format!("{}: {}", page_url, e))))?;

        let html = self.fetch_page(page.as_str()).await.map_err(ResolveMiss::Fetch)?;
        let found = self.extract(&html).ok_or(ResolveMiss::NoMatch)?;

        // 页面里的链接可能是 JSON 转义过的，也可能是相对路径
        let unescaped = found.replace("\\/", "/");
        page.join(&unescaped)
            .map(|url| ResolvedLink::new(String::from(url)))
            .map_err(|e| ResolveMiss::Fetch(DownloadError::InvalidUrl(format!("{}: {}", unescaped, e))))
    }

    async fn fetch_page(&self, url: &str) -> DownloadResult<String> {
        let response = self.client.get(url).await?.error_for_status(url)?;
        response.text(self.max_page_size, self.read_timeout).await
    }

    /// 有捕获组时取第一个捕获组，否则取整个匹配
    fn extract<'a>(&self, html: &'a str) -> Option<&'a str> {
        let captures = self.pattern.captures(html)?;
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
    }
}
