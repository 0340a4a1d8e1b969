use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{DownloadError, DownloadResult};
use crate::utils::validator::is_valid_url;

/// 配置结构体，缺少的字段使用默认值
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 下载目录
    pub download_dir: String,
    /// 条目页面地址，`{id}` 会被替换成条目标识
    pub page_url_template: String,
    /// 从页面中提取媒体链接的正则，取第一个捕获组
    pub link_pattern: String,
    /// 每个文件最多尝试的次数
    pub retry_count: u32,
    /// 重试延迟（毫秒）
    pub retry_delay_ms: u64,
    /// 退避倍数，1.0 为固定间隔
    pub retry_backoff_multiplier: f64,
    /// 最大重试延迟（毫秒）
    pub retry_max_delay_ms: u64,
    /// 等待响应头的超时（秒）
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 两次读到数据之间的最长间隔（秒）
    pub read_timeout_secs: u64,
    /// 写盘块大小（字节）
    pub chunk_size: usize,
    /// 条目页面的最大读取字节数
    pub max_page_size: usize,
    /// 同时解析的条目数，0 表示不限制
    pub max_concurrent_resolves: usize,
    /// 最大并发下载数
    pub max_concurrent_downloads: usize,
    /// 每个 m3u8 同时下载的分片数
    pub max_concurrent_segments: usize,
    pub user_agent: String,
    pub log_level: String,
    /// 日志文件，为空时输出到终端
    pub log_file: String,
    /// 日志文件轮转大小（字节）
    pub max_log_size: u64,
    /// 失败报告（JSON）保存位置，为空时不保存
    pub report_file: String,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: "./south_park".to_string(),
            page_url_template: "https://sp.freehat.cc/episode/{id}/".to_string(),
            link_pattern: r#"contentUrl"\s*:\s*"([^"]+)"#.to_string(),
            retry_count: 3,
            retry_delay_ms: 1000,
            retry_backoff_multiplier: 1.0,
            retry_max_delay_ms: 60_000,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            chunk_size: 1024,
            max_page_size: 4 * 1024 * 1024,
            max_concurrent_resolves: 0,
            max_concurrent_downloads: 3,
            max_concurrent_segments: 4,
            user_agent: format!("linkdown/{}", env!("CARGO_PKG_VERSION")),
            log_level: "info".to_string(),
            log_file: String::new(),
            max_log_size: 10 * 1024 * 1024,
            report_file: String::new(),
            show_progress: true,
        }
    }
}

impl Config {
    /// 加载配置文件；文件不存在时创建，格式错误时使用默认配置并重写
    pub fn load(path: &Path) -> DownloadResult<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_with_template(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("配置文件格式错误: {}，将使用默认配置", e);
                let config = Config::default();
                config.save_with_template(path)?;
                Ok(config)
            }
        }
    }

    /// 写入带说明注释的配置文件
    pub fn save_with_template(&self, path: &Path) -> DownloadResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(self)
            .map_err(|e| DownloadError::Config(format!("无法序列化配置: {}", e)))?;
        fs::write(path, format!("{}\n{}", Config::generate_template(), body))?;
        Ok(())
    }

    fn generate_template() -> &'static str {
        r#"# linkdown 配置文件
# ====================
#
# TOML 格式。命令行参数会覆盖这里的设置，优先级：命令行 > 配置文件 > 默认值
#
# 配置文件位置：
# - Windows: %APPDATA%/linkdown/linkdown.conf
# - macOS: ~/Library/Application Support/linkdown/linkdown.conf
# - Linux: ~/.config/linkdown/linkdown.conf
#
# 使用示例：
#   linkdown s01e01 s01e02                 # 按条目标识下载
#   linkdown -f episodes.txt               # 从文件读取条目标识，每行一个
#   linkdown -j 5 -r 5 s01e01              # 5 个并发下载，每个文件最多尝试 5 次
#   linkdown --report failed.json s01e01   # 保存失败报告
#   linkdown -e                            # 编辑本文件
#
# ==================== 配置项说明 ====================
#
# download_dir              下载目录，不存在时自动创建
# page_url_template         条目页面地址，{id} 替换为条目标识
# link_pattern              提取媒体链接的正则，取第一个捕获组
# retry_count               每个文件最多尝试的次数
# retry_delay_ms            两次尝试之间的等待（毫秒）
# retry_backoff_multiplier  退避倍数，1.0 表示固定间隔
# retry_max_delay_ms        等待时间上限（毫秒）
# timeout_secs              等待响应头的超时（秒）
# connect_timeout_secs      建立连接的超时（秒）
# read_timeout_secs         读取响应体时两次数据之间的最长间隔（秒）
# chunk_size                写盘块大小（字节）
# max_page_size             条目页面最多读取的字节数
# max_concurrent_resolves   同时解析的条目数，0 表示全部同时进行
# max_concurrent_downloads  同时下载的文件数
# max_concurrent_segments   每个 m3u8 同时下载的分片数
# user_agent                请求使用的 User-Agent
# log_level                 日志级别：error / warn / info / debug / trace
# log_file                  日志文件，为空时输出到终端
# max_log_size              日志文件超过该大小（字节）后轮转
# report_file               失败报告（JSON）保存位置，为空时不保存
# show_progress             是否显示进度条
#
# ==================== 故障排除 ====================
#
# 问题：经常下载失败
# 解决：增加 retry_count 或 read_timeout_secs
#
# 问题：条目都被跳过
# 解决：检查 page_url_template 和 link_pattern 是否与页面匹配
"#
    }

    /// 校验配置合法性
    pub fn validate(&self) -> DownloadResult<()> {
        if self.download_dir.is_empty() {
            return Err(DownloadError::Config("下载目录不能为空".into()));
        }
        if !self.page_url_template.contains("{id}") {
            return Err(DownloadError::Config("页面地址模板必须包含 {id}".into()));
        }
        if !is_valid_url(&self.page_url_template.replace("{id}", "id")) {
            return Err(DownloadError::Config(format!("页面地址模板不是有效的 http(s) 地址: {}", self.page_url_template)));
        }
        if self.retry_count == 0 {
            return Err(DownloadError::Config("重试次数必须大于0".into()));
        }
        if self.chunk_size == 0 {
            return Err(DownloadError::Config("分块大小必须大于0".into()));
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(DownloadError::Config("超时时间必须大于0".into()));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(DownloadError::Config("并发下载数必须大于0".into()));
        }
        if self.max_concurrent_segments == 0 {
            return Err(DownloadError::Config("分片并发数必须大于0".into()));
        }
        if !self.retry_backoff_multiplier.is_finite() || self.retry_backoff_multiplier < 1.0 {
            return Err(DownloadError::Config("退避倍数必须是不小于1.0的有限数".into()));
        }

        let pattern = Regex::new(&self.link_pattern)?;
        if pattern.captures_len() < 2 {
            return Err(DownloadError::Config("链接匹配规则需要一个捕获组".into()));
        }

        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.download_dir {
            self.download_dir = dir.clone();
        }
        if let Some(retries) = args.retries {
            self.retry_count = retries;
        }
        if let Some(jobs) = args.jobs {
            self.max_concurrent_downloads = jobs;
        }
        if let Some(report) = &args.report {
            self.report_file = report.clone();
        }
        if args.no_progress {
            self.show_progress = false;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.report_file)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.log_file)
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 下载目录: {}\n\
            - 页面地址: {}\n\
            - 并发下载数: {}\n\
            - 解析并发数: {}\n\
            - 分片并发数: {}\n\
            - 重试次数: {}\n\
            - 重试延迟: {} 毫秒\n\
            - 超时时间: {} 秒\n\
            - 失败报告: {}",
            self.download_dir,
            self.page_url_template,
            self.max_concurrent_downloads,
            if self.max_concurrent_resolves == 0 { "不限制".to_string() } else { self.max_concurrent_resolves.to_string() },
            self.max_concurrent_segments,
            self.retry_count,
            self.retry_delay_ms,
            self.timeout_secs,
            if self.report_file.is_empty() { "不保存" } else { self.report_file.as_str() }
        )
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.download_dir, "./south_park");
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.max_concurrent_resolves, 0);
        assert!(config.user_agent.starts_with("linkdown/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.retry_count = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.max_concurrent_downloads = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.page_url_template = "https://sp.freehat.cc/episode/".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.page_url_template = "sp.freehat.cc/{id}".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.link_pattern = "contentUrl(".to_string();
        assert!(matches!(config.validate(), Err(DownloadError::InvalidPattern(_))));

        config = Config::default();
        config.link_pattern = "contentUrl".to_string();
        assert!(matches!(config.validate(), Err(DownloadError::Config(_))));
    }

    #[test]
    fn test_backoff_multiplier_must_be_finite() {
        let mut config = Config::default();
        for multiplier in [0.5, f64::INFINITY, f64::NAN] {
            config.retry_backoff_multiplier = multiplier;
            assert!(matches!(config.validate(), Err(DownloadError::Config(_))));
        }

        // 很大但有限的倍数可以通过，等待时间由上限兜住
        config.retry_backoff_multiplier = 1e300;
        assert!(config.validate().is_ok());
        let strategy = crate::core::task::RetryStrategy::from_config(&config);
        assert_eq!(strategy.get_delay(2), Duration::from_millis(config.retry_max_delay_ms));
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("linkdown.conf");

        let config = Config::load(&path).expect("加载配置失败");

        assert_eq!(config, Config::default());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("linkdown 配置文件"));
        assert!(content.contains("page_url_template"));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdown.conf");
        let config = Config { retry_count: 5, download_dir: "/tmp/sp".to_string(), ..Config::default() };

        config.save_with_template(&path).expect("保存配置失败");
        let loaded = Config::load(&path).expect("加载配置失败");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdown.conf");
        fs::write(&path, "max_concurrent_downloads = 8\n").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.max_concurrent_downloads, 8);
        assert_eq!(config.retry_count, 3);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdown.conf");
        fs::write(&path, "retry_count = \"many\"\n[[[").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_optional_paths() {
        let mut config = Config::default();
        assert!(config.report_path().is_none());
        config.report_file = "failed.json".to_string();
        assert_eq!(config.report_path(), Some(PathBuf::from("failed.json")));
    }

    #[test]
    fn test_config_summary() {
        let summary = Config::default().get_summary();
        assert!(summary.contains("配置摘要"));
        assert!(summary.contains("下载目录"));
        assert!(summary.contains("不限制"));
        assert!(summary.contains("不保存"));
    }
}
