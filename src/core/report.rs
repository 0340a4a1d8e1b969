use actix::prelude::*;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::core::error::DownloadResult;

/// ================== 失败条目 ==================
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FailedItem {
    /// 条目在输入中的位置，用于排序
    pub position: usize,
    pub identifier: String,
    pub link: String,
    pub file_name: String,
    pub reason: String,
}

/// 一次批量下载的汇总，每批只生成一次
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FailureReport {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Local>,
    pub total: usize,
    pub succeeded: usize,
    pub downloaded_bytes: u64,
    /// 没有解析到链接的条目，不算失败
    pub unresolved: Vec<String>,
    pub failed: Vec<FailedItem>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.failed.iter().map(|item| item.file_name.as_str()).collect()
    }

    pub fn save(&self, path: &Path) -> DownloadResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::core::error::DownloadError::Unknown(format!("序列化失败报告失败: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "下载失败: [{}]", self.file_names().join(", "))
    }
}

/// 记录一条失败
pub struct RecordFailure(pub FailedItem);
impl Message for RecordFailure { type Result = (); }

/// 取走全部失败条目，按输入顺序排列
pub struct TakeFailures;
impl Message for TakeFailures { type Result = Vec<FailedItem>; }

/// 各下载任务共享的失败收集器，追加操作经由邮箱串行执行
#[derive(Default)]
pub struct FailureCollector {
    items: Vec<FailedItem>,
}

impl Actor for FailureCollector {
    type Context = Context<Self>;
}

impl Handler<RecordFailure> for FailureCollector {
    type Result = ();
    fn handle(&mut self, msg: RecordFailure, _ctx: &mut Self::Context) {
        self.items.push(msg.0);
    }
}

impl Handler<TakeFailures> for FailureCollector {
    type Result = MessageResult<TakeFailures>;
    fn handle(&mut self, _msg: TakeFailures, _ctx: &mut Self::Context) -> Self::Result {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| item.position);
        MessageResult(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(position: usize, name: &str) -> FailedItem {
        FailedItem {
            position,
            identifier: format!("id{}", position),
            link: format!("https://cdn.example.com/{}", name),
            file_name: name.to_string(),
            reason: "不支持的格式: xyz".to_string(),
        }
    }

    fn report(failed: Vec<FailedItem>) -> FailureReport {
        FailureReport {
            batch_id: Uuid::new_v4(),
            generated_at: Local::now(),
            total: 3,
            succeeded: 1,
            downloaded_bytes: 42,
            unresolved: vec!["id1".to_string()],
            failed,
        }
    }

    #[actix_rt::test]
    async fn test_collector_orders_by_position() {
        let collector = FailureCollector::default().start();
        collector.do_send(RecordFailure(item(4, "e.xyz")));
        collector.do_send(RecordFailure(item(0, "a.xyz")));
        collector.do_send(RecordFailure(item(2, "c.m3u8")));

        let items = collector.send(TakeFailures).await.unwrap();
        let positions: Vec<usize> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 2, 4]);

        // 取走之后为空，可以开始新一批
        assert!(collector.send(TakeFailures).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_concurrent_records_are_all_kept() {
        let collector = FailureCollector::default().start();
        let sends = (0..50).map(|i| collector.send(RecordFailure(item(i, "x.xyz"))));
        for result in futures::future::join_all(sends).await {
            result.unwrap();
        }

        assert_eq!(collector.send(TakeFailures).await.unwrap().len(), 50);
    }

    #[test]
    fn test_display_lists_file_names() {
        let report = report(vec![item(0, "a.xyz"), item(2, "c.m3u8")]);
        assert_eq!(report.to_string(), "下载失败: [a.xyz, c.m3u8]");
        assert!(!report.is_empty());
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("failed.json");
        let report = report(vec![item(2, "c.xyz")]);

        report.save(&path).unwrap();

        let loaded: FailureReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.batch_id, report.batch_id);
        assert_eq!(loaded.failed, report.failed);
        assert_eq!(loaded.unresolved, vec!["id1".to_string()]);
    }
}
