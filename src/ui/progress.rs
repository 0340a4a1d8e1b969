use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::task::TransferProgress;

/// 下载进度的展示端，只是界面上的副作用，不影响下载结果
pub trait ProgressSink {
    fn begin(&self, name: &str, total: Option<u64>);
    fn update(&self, name: &str, progress: &TransferProgress);
    fn finish(&self, name: &str, success: bool);
}

/// 不显示任何进度
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&self, _name: &str, _total: Option<u64>) {}
    fn update(&self, _name: &str, _progress: &TransferProgress) {}
    fn finish(&self, _name: &str, _success: bool) {}
}

// 结构体：ProgressManager
// 每个正在下载的文件一条进度条，长度固定为 100（百分比）
pub struct ProgressManager {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: RefCell<HashMap<String, ProgressBar>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{prefix:>16} [{bar:50}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("## ");
        Self {
            multi: MultiProgress::new(),
            style,
            bars: RefCell::new(HashMap::new()),
        }
    }

    /// 进度条所在的绘制组，终端日志需要借它挂起进度条再输出
    pub fn multi(&self) -> MultiProgress {
        self.multi.clone()
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressManager {
    fn begin(&self, name: &str, _total: Option<u64>) {
        let pb = self.multi.add(ProgressBar::new(100));
        pb.set_style(self.style.clone());
        pb.set_prefix(name.to_string());
        pb.set_message("0.00%");
        // 同名文件重试时替换旧的进度条
        if let Some(old) = self.bars.borrow_mut().insert(name.to_string(), pb) {
            old.finish_and_clear();
        }
    }

    fn update(&self, name: &str, progress: &TransferProgress) {
        if let Some(pb) = self.bars.borrow().get(name) {
            let percent = progress.percent();
            pb.set_position(percent as u64);
            pb.set_message(format!("{:.2}%", percent));
        }
    }

    fn finish(&self, name: &str, success: bool) {
        if let Some(pb) = self.bars.borrow_mut().remove(name) {
            if success {
                pb.finish_with_message("完成");
            } else {
                pb.abandon_with_message("失败");
            }
        }
    }
}
