//! 命令共用的装配逻辑：读配置、构建客户端和检测器

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::{Config, LoadedConfig};
use crate::daemon::InstanceLock;
use crate::detector::ChangeDetector;
use crate::github::GithubClient;
use crate::notification::{NotificationDispatcher, SlackChannel};
use crate::registry::PrRegistry;
use crate::store::DedupStore;

/// `--config` 未指定时使用默认路径
pub fn config_path(custom: Option<&Path>) -> PathBuf {
    custom
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path)
}

/// 读取并校验配置
///
/// 配置文件不存在时写入模板并返回 `None`，调用方应直接退出。
pub fn load_config(path: &Path) -> Result<Option<Config>> {
    match Config::load_or_create(path)? {
        LoadedConfig::TemplateCreated(path) => {
            println!("Config template written to {}", path.display());
            println!("Fill in github.token, github.username and notification.slack_webhook, then run again.");
            println!("Or run `gpn init` for interactive setup.");
            Ok(None)
        }
        LoadedConfig::Loaded(config) => {
            config
                .validate()
                .with_context(|| format!("Incomplete configuration in {}", path.display()))?;
            Ok(Some(config))
        }
    }
}

/// 写状态文件的命令与常驻进程互斥，状态文件只有一个写入者
pub fn acquire_writer_lock(lock_path: &Path, command: &str) -> Result<InstanceLock> {
    InstanceLock::acquire(lock_path).with_context(|| {
        format!(
            "`gpn {}` writes the state file and cannot run while `gpn run` is active; stop the daemon first",
            command
        )
    })
}

/// 命令行 `--dry-run`、配置项、缺少 webhook 任一成立即为 dry-run
pub fn effective_dry_run(config: &Config, cli_dry_run: bool) -> bool {
    if !config.has_webhook() && !cli_dry_run && !config.notification.dry_run {
        warn!("No Slack webhook configured, running in dry-run mode");
    }
    cli_dry_run || config.notification.dry_run || !config.has_webhook()
}

/// 构建通知分发器（需在阻塞线程上调用）
pub fn build_dispatcher(config: &Config, dry_run: bool) -> Result<NotificationDispatcher> {
    let mut dispatcher = NotificationDispatcher::new()
        .with_dry_run(dry_run)
        .with_retry(config.retry_config());
    if config.has_webhook() {
        let channel = SlackChannel::new(config.slack_config()).context("Failed to set up Slack channel")?;
        dispatcher = dispatcher.with_channel(Arc::new(channel));
    }
    Ok(dispatcher)
}

/// 构建检测器，追踪列表从状态文件中的缓存恢复（需在阻塞线程上调用）
pub fn build_detector(config: &Config, dry_run: bool) -> Result<ChangeDetector> {
    let client = GithubClient::new(config.github_client_config()).context("Failed to set up GitHub client")?;
    let dispatcher = build_dispatcher(config, dry_run)?;
    let store = DedupStore::new(DedupStore::default_path());

    let cached = store.load_or_reset(Utc::now()).assigned_prs;
    let registry = PrRegistry::from_cached(cached);

    Ok(
        ChangeDetector::new(Arc::new(client), dispatcher, store, config.github.username.clone())
            .with_author_filter(config.author_filter())
            .with_registry(registry),
    )
}
