//! 批量下载编排：解析全部条目 -> 分派下载 -> 汇总失败

use actix::prelude::*;
use chrono::Local;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use log::{error, info};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use uuid::Uuid;

use crate::config::Config;
use crate::core::dispatcher::DownloadDispatcher;
use crate::core::error::DownloadResult;
use crate::core::http::AwcClient;
use crate::core::link::ResolvedLink;
use crate::core::report::{FailedItem, FailureCollector, FailureReport, RecordFailure, TakeFailures};
use crate::core::resolver::LinkResolver;
use crate::core::task::{DownloadOutcome, HlsTransfer, RetryingStreamDownloader, SegmentedDownloader};
use crate::ui::ProgressSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Resolving,
    Dispatching,
    Reporting,
    Done,
}

pub struct BatchOrchestrator {
    resolver: LinkResolver,
    dispatcher: DownloadDispatcher,
    /// 0 表示所有条目同时解析
    max_concurrent_resolves: usize,
    max_concurrent_downloads: usize,
    report_path: Option<PathBuf>,
    state: Cell<BatchState>,
}

impl BatchOrchestrator {
    pub fn new(resolver: LinkResolver, dispatcher: DownloadDispatcher, config: &Config) -> Self {
        Self {
            resolver,
            dispatcher,
            max_concurrent_resolves: config.max_concurrent_resolves,
            max_concurrent_downloads: config.max_concurrent_downloads.max(1),
            report_path: config.report_path(),
            state: Cell::new(BatchState::Idle),
        }
    }

    /// 按配置组装整条流水线，所有组件共用一个 HTTP 客户端。
    /// 客户端建不起来时整批都无法进行，直接返回错误。
    pub fn from_config(config: &Config, progress: Rc<dyn ProgressSink>) -> DownloadResult<Self> {
        let client = Rc::new(AwcClient::new(config)?);
        let resolver = LinkResolver::new(client.clone(), config)?;
        let stream = RetryingStreamDownloader::new(client.clone(), config, progress);
        let segmented = SegmentedDownloader::new(
            Rc::new(HlsTransfer::new(client, config)),
            config.download_dir.as_str(),
        );
        Ok(Self::new(resolver, DownloadDispatcher::new(stream, segmented), config))
    }

    pub fn state(&self) -> BatchState {
        self.state.get()
    }

    /// 跑完一整批。单个条目的任何失败都只会出现在报告里
    pub async fn run(&self, identifiers: &[String]) -> DownloadResult<FailureReport> {
        let batch_id = Uuid::new_v4();
        info!("批次 {} 开始，共 {} 个条目", batch_id, identifiers.len());

        self.state.set(BatchState::Resolving);
        let links = self.resolve_all(identifiers).await;

        self.state.set(BatchState::Dispatching);
        let collector = FailureCollector::default().start();
        let mut unresolved = Vec::new();
        let mut jobs = Vec::new();
        for (position, (identifier, link)) in identifiers.iter().zip(links).enumerate() {
            match link {
                Some(link) => jobs.push((position, identifier, link)),
                None => unresolved.push(identifier.clone()),
            }
        }

        let collector_ref = &collector;
        let outcomes: Vec<DownloadOutcome> = stream::iter(jobs)
            .map(move |(position, identifier, link)| async move {
                let outcome = self.dispatcher.dispatch(&link).await;
                if let DownloadOutcome::Failed { reason } = &outcome {
                    collector_ref.do_send(RecordFailure(FailedItem {
                        position,
                        identifier: identifier.clone(),
                        link: link.to_string(),
                        file_name: link.display_name().to_string(),
                        reason: reason.clone(),
                    }));
                }
                outcome
            })
            .buffer_unordered(self.max_concurrent_downloads)
            .collect()
            .await;

        self.state.set(BatchState::Reporting);
        let failed = collector.send(TakeFailures).await?;
        let mut succeeded = 0;
        let mut downloaded_bytes = 0;
        for outcome in &outcomes {
            if let DownloadOutcome::Success { bytes, .. } = outcome {
                succeeded += 1;
                downloaded_bytes += bytes;
            }
        }

        let report = FailureReport {
            batch_id,
            generated_at: Local::now(),
            total: identifiers.len(),
            succeeded,
            downloaded_bytes,
            unresolved,
            failed,
        };
        info!(
            "批次 {} 结束: 成功 {}，失败 {}，未解析 {}",
            batch_id,
            report.succeeded,
            report.failed.len(),
            report.unresolved.len()
        );
        info!("{}", report);

        if let Some(path) = &self.report_path {
            match report.save(path) {
                Ok(()) => info!("失败报告已保存到 {}", path.display()),
                Err(e) => error!("保存失败报告 {} 失败: {}", path.display(), e),
            }
        }

        self.state.set(BatchState::Done);
        Ok(report)
    }

    /// 等所有条目都解析完才返回，结果与输入一一对应
    async fn resolve_all(&self, identifiers: &[String]) -> Vec<Option<ResolvedLink>> {
        let resolves = identifiers.iter().map(|identifier| self.resolver.resolve(identifier));
        if self.max_concurrent_resolves == 0 {
            join_all(resolves).await
        } else {
            stream::iter(resolves)
                .buffered(self.max_concurrent_resolves)
                .collect()
                .await
        }
    }
}
