use anyhow::{Context, Result};
use log::{error, info};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Instant;

use linkdown::cli::{self, Args};
use linkdown::config::Config;
use linkdown::core::BatchOrchestrator;
use linkdown::ui::{self, BatchSummary, NullProgress, ProgressManager, ProgressSink};
use linkdown::utils::logger;

/// 批次跑完但有失败条目
const EXIT_FAILURES: u8 = 2;

#[actix::main]
async fn main() -> ExitCode {
    let args = Args::parse_args();

    if args.edit_config {
        // 确保文件存在再打开
        if let Err(e) = Config::load(std::path::Path::new(&args.config)) {
            eprintln!("无法创建配置文件: {}", e);
            return ExitCode::FAILURE;
        }
        cli::open_config_in_editor(&args.config);
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ui::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ExitCode> {
    let config = args
        .load_config()
        .with_context(|| format!("配置无效: {}", args.config))?;
    let bars = config.show_progress.then(ProgressManager::new);
    logger::init(&config, bars.as_ref().map(ProgressManager::multi))?;

    let identifiers = args.get_identifiers()?;
    info!("配置文件路径: {}", args.config);
    info!("{}", config.get_summary());

    let progress: Rc<dyn ProgressSink> = match bars {
        Some(bars) => Rc::new(bars),
        None => Rc::new(NullProgress),
    };
    let batch = BatchOrchestrator::from_config(&config, progress).context("无法创建 HTTP 会话")?;

    let started = Instant::now();
    let report = batch.run(&identifiers).await?;
    println!("{}", BatchSummary::from_report(&report, started.elapsed()));

    if report.is_empty() {
        ui::print_success("全部下载完成");
        Ok(ExitCode::SUCCESS)
    } else {
        ui::print_error(&report.to_string());
        Ok(ExitCode::from(EXIT_FAILURES))
    }
}
