use anyhow::{Context, Result};
use chrono::Local; // 用于获取本地时间
use indicatif::MultiProgress;
use log::LevelFilter; // 用于设置日志级别
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// 按大小轮转的日志文件，只保留一个 `.backup`
pub struct RotatingFileWriter {
    writer: BufWriter<File>,
    file_path: PathBuf,
    max_size: u64, // 最大文件大小 (bytes)
    current_size: u64,
}

impl RotatingFileWriter {
    pub fn new(file_path: impl Into<PathBuf>, max_size: u64) -> io::Result<Self> {
        let file_path = file_path.into();
        // 确保日志目录存在
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = open_append(&file_path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            writer: BufWriter::new(file),
            file_path,
            max_size,
            current_size,
        })
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.file_path.clone().into_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// 检查并执行日志轮转
    fn check_rotation(&mut self) -> io::Result<()> {
        if self.current_size < self.max_size {
            return Ok(());
        }
        self.writer.flush()?;

        let backup_path = self.backup_path();
        if backup_path.exists() {
            std::fs::remove_file(&backup_path)?;
        }
        std::fs::rename(&self.file_path, &backup_path)?;

        self.writer = BufWriter::new(open_append(&self.file_path)?);
        self.current_size = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_rotation()?;
        self.writer.write_all(buf)?;
        self.current_size += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 写到 stderr 的日志，输出前先挂起进度条，输出后再重绘
pub struct SuspendingStderr {
    multi: MultiProgress,
}

impl SuspendingStderr {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Write for SuspendingStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// 初始化全局日志。级别取自配置，`RUST_LOG` 可以覆盖。
/// 配置了日志文件时写文件；否则写 stderr，有进度条时经由 `progress` 输出
pub fn init(config: &Config, progress: Option<MultiProgress>) -> Result<()> {
    let level = config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Some(path) = config.log_path() {
        let writer = RotatingFileWriter::new(&path, config.max_log_size)
            .with_context(|| format!("无法打开日志文件: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(writer)));
    } else if let Some(multi) = progress {
        builder.target(env_logger::Target::Pipe(Box::new(SuspendingStderr::new(multi))));
    }

    builder.try_init().context("日志系统已经初始化")?;
    Ok(())
}
