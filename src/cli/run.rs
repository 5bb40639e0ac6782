//! run / check 命令 - 常驻轮询与单次检测

use anyhow::{anyhow, Result};
use clap::Args;
use std::path::Path;
use tracing::info;

use super::context::{acquire_writer_lock, build_detector, effective_dry_run, load_config};
use super::output::print_json;
use crate::daemon::{Daemon, DaemonOptions, InstanceLock};
use crate::detector::CycleReport;

/// run 命令参数
#[derive(Args)]
pub struct RunArgs {
    /// 轮询间隔（秒），覆盖 github.check_interval
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// 只打印不发送
    #[arg(long)]
    pub dry_run: bool,
}

/// check 命令参数
#[derive(Args)]
pub struct CheckArgs {
    /// 只打印不发送
    #[arg(long)]
    pub dry_run: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 处理 run 命令
pub async fn handle_run(args: RunArgs, config_path: &Path) -> Result<()> {
    let Some(mut config) = load_config(config_path)? else {
        return Ok(());
    };
    if let Some(interval) = args.interval {
        if interval == 0 {
            return Err(anyhow!("--interval must be greater than 0"));
        }
        config.github.check_interval = interval;
    }

    let _lock = InstanceLock::acquire(&InstanceLock::default_path())?;
    let dry_run = effective_dry_run(&config, args.dry_run);

    let options = DaemonOptions {
        check_interval: config.check_interval(),
        refresh_interval: config.refresh_interval(),
        max_cycles: None,
    };
    info!(
        username = %config.github.username,
        dry_run,
        "Starting GitHub PR notifier"
    );

    let detector = tokio::task::spawn_blocking(move || build_detector(&config, dry_run)).await??;
    let summary = Daemon::new(options).run(detector).await?;

    println!(
        "Stopped after {} cycle(s), {} notification(s) dispatched",
        summary.cycles, summary.dispatched
    );
    Ok(())
}

/// 处理 check 命令（阻塞调用）
pub fn handle_check(args: CheckArgs, config_path: &Path) -> Result<()> {
    let Some(config) = load_config(config_path)? else {
        return Ok(());
    };
    let _lock = acquire_writer_lock(&InstanceLock::default_path(), "check")?;
    let dry_run = effective_dry_run(&config, args.dry_run);

    let mut detector = build_detector(&config, dry_run)?;
    let report = detector.run_cycle()?;

    if args.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("Checked {} PR(s)", report.threads);
    println!("  dispatched:        {}", report.dispatched);
    if report.dry_run_skipped > 0 {
        println!("  dry-run skipped:   {}", report.dry_run_skipped);
    }
    println!("  delivery failures: {}", report.delivery_failures);
    println!("  bot events:        {}", report.absorbed_bots);
    println!("  own events:        {}", report.skipped_self);
    println!("  already notified:  {}", report.skipped_seen);
    if !report.failed_threads.is_empty() {
        println!("  failed PRs:        {}", report.failed_threads.join(", "));
    }
    println!("  watermark:         {}", report.watermark.to_rfc3339());
}
