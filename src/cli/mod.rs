//! CLI: 命令行接口和参数解析模块
//!
//! ## 支持的命令
//!
//! - 按条目下载：`linkdown s01e01 s01e02`
//! - 从文件读取条目：`linkdown -f episodes.txt`
//! - 编辑配置：`linkdown -e`
//! - 指定配置：`linkdown -c linkdown.conf s01e01`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/linkdown/linkdown.conf`
//! - macOS: `~/Library/Application Support/linkdown/linkdown.conf`
//! - Linux: `~/.config/linkdown/linkdown.conf`

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::core::error::DownloadResult;
use crate::utils::validator::validate_identifiers;

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/linkdown/linkdown.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/linkdown/linkdown.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/linkdown/linkdown.conf", home)
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    if let Ok(editor) = env::var("EDITOR") {
        if std::process::Command::new(editor).arg(config_path).status().is_ok() {
            return;
        }
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 xdg-open，否则 nano
        if std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

/// linkdown 命令行参数
///
/// 示例用法：
///   linkdown s01e01 s01e02
///   linkdown -f episodes.txt --report failed.json
///   linkdown -e  # 编辑配置文件
#[derive(Parser, Debug, Clone)]
#[command(
    name = "linkdown",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (构建于 ", env!("VERGEN_BUILD_TIMESTAMP"), ")"),
    about = "按条目标识解析媒体直链并批量下载",
    long_about = "从条目页面中提取媒体直链，mp4 直接流式下载，m3u8 按分片下载后合并。\n单个条目失败不会中断整批，结束时输出失败列表。\n\n示例：\n  linkdown s01e01 s01e02\n  linkdown -f episodes.txt -j 5\n  linkdown -e\n"
)]
pub struct Args {
    /// 条目标识列表（可同时指定多个）
    #[arg(required = false, help = "要下载的条目标识，可以同时指定多个。")]
    pub identifiers: Vec<String>,

    /// 包含条目标识的文件
    #[arg(short, long, help = "包含条目标识的文件，每行一个，# 开头为注释。")]
    pub file: Option<String>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    /// 编辑配置文件（-e 或 --edit）
    #[arg(short = 'e', long = "edit", help = "用系统默认编辑器打开配置文件并退出。")]
    pub edit_config: bool,

    #[arg(long, short = 'd', help = "指定下载目录，覆盖配置文件中的设置。")]
    pub download_dir: Option<String>,

    #[arg(long, short = 'r', help = "每个文件最多尝试的次数，覆盖配置文件中的设置。")]
    pub retries: Option<u32>,

    #[arg(long, short = 'j', help = "同时下载的文件数，覆盖配置文件中的设置。")]
    pub jobs: Option<usize>,

    #[arg(long, help = "把失败报告以 JSON 格式保存到指定文件。")]
    pub report: Option<String>,

    #[arg(long, help = "不显示进度条。")]
    pub no_progress: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// 加载（必要时创建）配置文件，合并命令行参数并校验
    pub fn load_config(&self) -> DownloadResult<Config> {
        let mut config = Config::load(Path::new(&self.config))?;
        config.merge_from_args(self);
        config.validate()?;
        Ok(config)
    }

    /// 汇总命令行和文件中的条目标识，按出现顺序
    pub fn get_identifiers(&self) -> Result<Vec<String>> {
        let mut identifiers = self.identifiers.clone();

        if let Some(file_path) = &self.file {
            let content = fs::read_to_string(file_path)
                .with_context(|| format!("无法读取条目文件: {}", file_path))?;
            // 按行读取，忽略空行和注释
            identifiers.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from),
            );
        }

        validate_identifiers(&identifiers)?;
        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["linkdown", "-j", "5", "-r", "4", "--report", "failed.json", "s01e01", "s01e02"])
            .unwrap();
        assert_eq!(args.identifiers, vec!["s01e01", "s01e02"]);
        assert_eq!(args.jobs, Some(5));
        assert_eq!(args.retries, Some(4));
        assert_eq!(args.report.as_deref(), Some("failed.json"));
        assert!(!args.no_progress);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdown.conf");
        fs::write(&path, "download_dir = \"./from_file\"\nmax_concurrent_downloads = 2\n").unwrap();
        let path = path.display().to_string();

        let args = Args::try_parse_from(["linkdown", "-c", path.as_str(), "-j", "6", "--no-progress", "s01e01"]).unwrap();
        let config = args.load_config().unwrap();

        assert_eq!(config.download_dir, "./from_file");
        assert_eq!(config.max_concurrent_downloads, 6);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdown.conf").display().to_string();

        let args = Args::try_parse_from(["linkdown", "-c", path.as_str(), "-r", "0", "s01e01"]).unwrap();
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_identifier_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episodes.txt");
        fs::write(&path, "# 第一季\ns01e01\n\n  s01e02  \n").unwrap();
        let path = path.display().to_string();

        let args = Args::try_parse_from(["linkdown", "-f", path.as_str(), "s00e00"]).unwrap();
        let identifiers = args.get_identifiers().unwrap();

        assert_eq!(identifiers, vec!["s00e00", "s01e01", "s01e02"]);
    }

    #[test]
    fn test_no_identifiers_is_error() {
        let args = Args::try_parse_from(["linkdown"]).unwrap();
        assert!(args.get_identifiers().is_err());

        let args = Args::try_parse_from(["linkdown", "-f", "/nonexistent/episodes.txt"]).unwrap();
        assert!(args.get_identifiers().is_err());
    }
}
