use std::fmt;

/// 由链接扩展名决定的下载策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatTag {
    /// mp4，单流下载
    Stream,
    /// m3u8，分片下载
    Segmented,
    Unsupported(String),
}

impl FormatTag {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" => FormatTag::Stream,
            "m3u8" => FormatTag::Segmented,
            other => FormatTag::Unsupported(other.to_string()),
        }
    }
}

/// 解析得到的媒体直链
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    url: String,
}

impl ResolvedLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// 去掉查询串和片段后的部分
    fn path(&self) -> &str {
        let end = self
            .url
            .find(|c| c == '?' || c == '#')
            .unwrap_or(self.url.len());
        &self.url[..end]
    }

    /// 最后一段路径，即保存时使用的文件名
    pub fn file_name(&self) -> &str {
        self.path().rsplit('/').next().unwrap_or_default()
    }

    /// 文件名为空时退回整条链接，用于日志和失败报告
    pub fn display_name(&self) -> &str {
        match self.file_name() {
            "" => &self.url,
            name => name,
        }
    }

    pub fn extension(&self) -> &str {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }

    /// 去掉扩展名的文件名
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }

    pub fn format(&self) -> FormatTag {
        FormatTag::from_extension(self.extension())
    }
}

impl fmt::Display for ResolvedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
