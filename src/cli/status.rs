//! status 命令 - 查看本地状态，不访问网络

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::output::{format_local, print_json};
use crate::config::Config;
use crate::daemon::InstanceLock;
use crate::registry::TrackedPr;
use crate::store::{DedupState, DedupStore};

/// status 命令参数
#[derive(Args)]
pub struct StatusArgs {
    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// status 命令输出
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub config_path: PathBuf,
    pub config_exists: bool,
    pub state_path: PathBuf,
    pub daemon_running: bool,
    pub last_checked: DateTime<Utc>,
    pub first_run: DateTime<Utc>,
    pub notified_comments: usize,
    pub notified_reviews: usize,
    pub tracked_prs: Vec<TrackedPr>,
    pub pending_retries: BTreeMap<String, DateTime<Utc>>,
}

impl StatusOutput {
    pub fn collect(config_path: &Path, state_path: &Path, state: &DedupState, daemon_running: bool) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
            config_exists: config_path.exists(),
            state_path: state_path.to_path_buf(),
            daemon_running,
            last_checked: state.watermark(),
            first_run: state.first_run(),
            notified_comments: state.notified_comments.len(),
            notified_reviews: state.notified_reviews.len(),
            tracked_prs: state.assigned_prs.clone(),
            pending_retries: state.retry_since.clone(),
        }
    }
}

/// 锁能拿到说明没有常驻进程
fn daemon_running(lock_path: &Path) -> bool {
    lock_path.exists() && InstanceLock::acquire(lock_path).is_err()
}

/// 处理 status 命令
pub fn handle_status(args: StatusArgs, config_path: &Path) -> Result<()> {
    let store = DedupStore::new(DedupStore::default_path());
    let state = store.load(Utc::now())?;
    let running = daemon_running(&InstanceLock::default_path());
    let output = StatusOutput::collect(config_path, store.path(), &state, running);

    if args.json {
        return print_json(&output);
    }

    println!("Config:       {}{}", output.config_path.display(), if output.config_exists { "" } else { " (missing)" });
    println!("State:        {}", output.state_path.display());
    println!("Daemon:       {}", if output.daemon_running { "running" } else { "stopped" });
    println!("Last checked: {}", format_local(output.last_checked));
    println!("First run:    {}", format_local(output.first_run));
    println!(
        "Notified:     {} comment(s), {} review(s)",
        output.notified_comments, output.notified_reviews
    );
    println!("Tracked PRs:  {}", output.tracked_prs.len());
    for pr in &output.tracked_prs {
        println!("  {:<40} {}", pr.key(), pr.title);
    }
    if !output.pending_retries.is_empty() {
        println!("Pending retries:");
        for (pr, since) in &output.pending_retries {
            println!("  {:<40} since {}", pr, format_local(*since));
        }
    }
    if !output.config_exists {
        println!("\nRun `gpn init` to create {}", Config::default_path().display());
    }
    Ok(())
}
