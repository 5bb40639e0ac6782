//! refresh 命令 - 立即刷新追踪的 PR 列表并写入缓存

use anyhow::{Context, Result};
use clap::Args;
use chrono::Utc;
use std::path::Path;

use super::context::{acquire_writer_lock, load_config};
use super::output::print_json;
use crate::daemon::InstanceLock;
use crate::github::GithubClient;
use crate::registry::PrRegistry;
use crate::store::DedupStore;

/// refresh 命令参数
#[derive(Args)]
pub struct RefreshArgs {
    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 处理 refresh 命令（阻塞调用）
pub fn handle_refresh(args: RefreshArgs, config_path: &Path) -> Result<()> {
    let Some(config) = load_config(config_path)? else {
        return Ok(());
    };

    let _lock = acquire_writer_lock(&InstanceLock::default_path(), "refresh")?;
    let client = GithubClient::new(config.github_client_config())?;
    let store = DedupStore::new(DedupStore::default_path());
    let now = Utc::now();
    let mut state = store.load_or_reset(now);

    let mut registry = PrRegistry::from_cached(state.assigned_prs.clone());
    let prs = registry
        .refresh(&client, &config.github.username, now)
        .context("Failed to refresh tracked PRs")?
        .to_vec();

    state.assigned_prs = prs.clone();
    store.save(&state).context("Failed to save tracked PRs")?;

    if args.json {
        print_json(&prs)?;
        return Ok(());
    }

    if prs.is_empty() {
        println!("No open PRs assigned to or authored by {}", config.github.username);
        return Ok(());
    }
    println!("Tracking {} PR(s):", prs.len());
    for pr in &prs {
        println!("  {:<40} {}", pr.key(), pr.title);
    }
    Ok(())
}
