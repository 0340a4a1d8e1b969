mod progress;

use std::fmt;
use std::time::Duration;

use crate::core::report::FailureReport;
pub use progress::{NullProgress, ProgressManager, ProgressSink};

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    println!("✗ {}", message);
}

/// 批量下载结束后的摘要
pub struct BatchSummary {
    pub total: usize,
    pub unresolved: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_size: u64,
    pub elapsed_time: Duration,
    pub failed_files: Vec<String>,
}

impl BatchSummary {
    pub fn from_report(report: &FailureReport, elapsed_time: Duration) -> Self {
        Self {
            total: report.total,
            unresolved: report.unresolved.len(),
            succeeded: report.succeeded,
            failed: report.failed.len(),
            total_size: report.downloaded_bytes,
            elapsed_time,
            failed_files: report.file_names().into_iter().map(String::from).collect(),
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n下载摘要:")?;
        writeln!(f, "条目数: {}", self.total)?;
        writeln!(f, "未解析: {}", self.unresolved)?;
        writeln!(f, "成功: {}", self.succeeded)?;
        writeln!(f, "失败: {}", self.failed)?;
        writeln!(f, "总大小: {}", format_size(self.total_size))?;
        writeln!(f, "耗时: {:.2}秒", self.elapsed_time.as_secs_f64())?;
        for name in &self.failed_files {
            writeln!(f, "  ✗ {}", name)?;
        }
        Ok(())
    }
}

pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_summary_lists_failed_files() {
        let summary = BatchSummary {
            total: 3,
            unresolved: 1,
            succeeded: 1,
            failed: 1,
            total_size: 2048,
            elapsed_time: Duration::from_millis(1500),
            failed_files: vec!["c.xyz".to_string()],
        };
        let text = summary.to_string();
        assert!(text.contains("条目数: 3"));
        assert!(text.contains("总大小: 2.00 KB"));
        assert!(text.contains("耗时: 1.50秒"));
        assert!(text.contains("✗ c.xyz"));
    }
}
