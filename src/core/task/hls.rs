//! 内置的 HLS 分片传输实现

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use m3u8_rs::{parse_playlist_res, KeyMethod, MediaPlaylist, Playlist};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::Config;
use crate::core::error::{DownloadError, DownloadResult};
use crate::core::http::HttpClient;
use super::retry::{run_with_retry, RetryStrategy};
use super::segmented::SegmentedTransfer;
use super::util::ensure_dir;

/// 单个分片的大小上限
const MAX_SEGMENT_SIZE: usize = 256 * 1024 * 1024;

pub struct HlsTransfer {
    client: Rc<dyn HttpClient>,
    retry: RetryStrategy,
    max_concurrent_segments: usize,
    max_playlist_size: usize,
    read_timeout: Duration,
}

impl HlsTransfer {
    pub fn new(client: Rc<dyn HttpClient>, config: &Config) -> Self {
        Self {
            client,
            retry: RetryStrategy::from_config(config),
            max_concurrent_segments: config.max_concurrent_segments.max(1),
            max_playlist_size: config.max_page_size,
            read_timeout: config.read_timeout(),
        }
    }

    async fn fetch(&self, url: &str, limit: usize) -> DownloadResult<Bytes> {
        run_with_retry(&self.retry, url, move || async move {
            let response = self.client.get(url).await?.error_for_status(url)?;
            response.bytes(limit, self.read_timeout).await
        })
        .await
    }

    /// 取得媒体播放列表；主播放列表时选择带宽最高的码流
    async fn fetch_media_playlist(&self, manifest_url: &str) -> DownloadResult<(MediaPlaylist, Url)> {
        let base = Url::parse(manifest_url)
            .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", manifest_url, e)))?;
        let data = self.fetch(base.as_str(), self.max_playlist_size).await?;

        let master = match parse_playlist_res(&data) {
            Ok(Playlist::MediaPlaylist(playlist)) => return Ok((playlist, base)),
            Ok(Playlist::MasterPlaylist(master)) => master,
            Err(e) => return Err(DownloadError::Playlist(format!("解析播放列表失败: {}", e))),
        };

        let variant = master
            .variants
            .iter()
            .filter(|v| !v.is_i_frame)
            .max_by_key(|v| v.bandwidth)
            .ok_or_else(|| DownloadError::Playlist("主播放列表中没有可用的码流".to_string()))?;
        let variant_url = join_uri(&base, &variant.uri)?;
        info!("选择码流 {} ({} bps)", variant_url, variant.bandwidth);

        let data = self.fetch(variant_url.as_str(), self.max_playlist_size).await?;
        match parse_playlist_res(&data) {
            Ok(Playlist::MediaPlaylist(playlist)) => Ok((playlist, variant_url)),
            Ok(Playlist::MasterPlaylist(_)) => {
                Err(DownloadError::Playlist("码流地址指向了另一个主播放列表".to_string()))
            }
            Err(e) => Err(DownloadError::Playlist(format!("解析码流播放列表失败: {}", e))),
        }
    }

    /// 按顺序写入所有分片，下载并发进行
    async fn write_segments(&self, urls: &[Url], part: &Path) -> DownloadResult<u64> {
        let mut file = File::create(part).await?;
        let mut written = 0u64;
        let total = urls.len();

        let mut segments = stream::iter(urls.iter().enumerate())
            .map(move |(index, url)| async move {
                self.fetch(url.as_str(), MAX_SEGMENT_SIZE).await.map(|data| (index, data))
            })
            .buffered(self.max_concurrent_segments);

        while let Some(segment) = segments.next().await {
            let (index, data) = segment?;
            file.write_all(&data).await?;
            written += data.len() as u64;
            debug!("分片 {}/{} 完成 ({} 字节)", index + 1, total, data.len());
        }
        file.flush().await?;

        Ok(written)
    }
}

fn join_uri(base: &Url, uri: &str) -> DownloadResult<Url> {
    base.join(uri)
        .map_err(|e| DownloadError::InvalidUrl(format!("{} (相对于 {}): {}", uri, base, e)))
}

/// m3u8-rs 把出现在第一个分片之前的部分标签放进 `unknown_tags`，这里取出其中的属性
fn playlist_level_attribute<'a>(playlist: &'a MediaPlaylist, tag: &str, attribute: &str) -> Option<&'a str> {
    let rest = playlist.unknown_tags.iter().rev().find(|t| t.tag == tag)?.rest.as_deref()?;
    let prefix = format!("{}=", attribute);
    let value = rest
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(prefix.as_str()))?;
    Some(value.trim_matches('"'))
}

/// 检查播放列表能否直接拼接，返回初始化分片地址（fMP4）
fn check_playlist(playlist: &MediaPlaylist) -> DownloadResult<Option<&str>> {
    if playlist.segments.is_empty() {
        return Err(DownloadError::Playlist("播放列表中没有分片".to_string()));
    }
    let encrypted = playlist_level_attribute(playlist, "X-KEY", "METHOD").is_some_and(|m| m != "NONE")
        || playlist
            .segments
            .iter()
            .any(|s| s.key.as_ref().is_some_and(|key| key.method != KeyMethod::None));
    if encrypted {
        return Err(DownloadError::Playlist("暂不支持加密分片".to_string()));
    }
    if playlist.segments.iter().any(|s| s.byte_range.is_some()) {
        return Err(DownloadError::Playlist("暂不支持 EXT-X-BYTERANGE 分片".to_string()));
    }

    let init = playlist
        .segments
        .iter()
        .find_map(|s| s.map.as_ref())
        .map(|map| map.uri.as_str())
        .or_else(|| playlist_level_attribute(playlist, "X-MAP", "URI"));
    Ok(init)
}

#[async_trait(?Send)]
impl SegmentedTransfer for HlsTransfer {
    async fn transfer(&self, manifest_url: &str, output_dir: &Path, output_name: &str) -> DownloadResult<PathBuf> {
        let (playlist, base) = self.fetch_media_playlist(manifest_url).await?;
        let init = check_playlist(&playlist)?;

        let mut urls = Vec::with_capacity(playlist.segments.len() + 1);
        if let Some(init) = init {
            urls.push(join_uri(&base, init)?);
        }
        for segment in &playlist.segments {
            urls.push(join_uri(&base, &segment.uri)?);
        }

        let extension = if init.is_some() { "mp4" } else { "ts" };
        ensure_dir(output_dir).await?;
        let dest = output_dir.join(format!("{}.{}", output_name, extension));
        let part = output_dir.join(format!("{}.{}.part", output_name, extension));

        info!("{}: 共 {} 个分片", output_name, playlist.segments.len());
        match self.write_segments(&urls, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, &dest).await?;
                debug!("{} 合并完成 ({} 字节)", dest.display(), bytes);
                Ok(dest)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&part).await {
                    debug!("清理 {} 失败: {}", part.display(), remove_err);
                }
                Err(e)
            }
        }
    }
}
