//! 配置 - `~/.github-pr-notifier/config.json`
//!
//! 读取优先级：
//! 1. 配置文件中的非空值
//! 2. 环境变量 `GITHUB_TOKEN` / `GITHUB_USERNAME` / `SLACK_WEBHOOK_URL`
//!
//! 配置文件不存在时写入默认模板，由用户补全 token、用户名和 webhook。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::activity::AuthorFilter;
use crate::error::{Error, Result};
use crate::github::client::{GithubClientConfig, DEFAULT_API_BASE_URL};
use crate::notification::channels::slack::SlackConfig;
use crate::notification::dispatcher::RetryConfig;

const DATA_DIR_NAME: &str = ".github-pr-notifier";

/// 数据目录 `~/.github-pr-notifier`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// GitHub 相关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSection {
    pub token: String,
    pub username: String,
    /// 轮询间隔（秒）
    pub check_interval: u64,
    /// PR 列表刷新间隔（秒）
    pub refresh_interval: u64,
    pub api_base_url: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 额外视为 bot 的账号
    pub bot_logins: Vec<String>,
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            username: String::new(),
            check_interval: 300,
            refresh_interval: 1800,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 30,
            bot_logins: Vec::new(),
        }
    }
}

/// 通知相关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub slack_webhook: String,
    /// 可选：覆盖 webhook 默认频道
    pub slack_channel: String,
    /// 通知显示的发送者名称
    pub slack_username: String,
    pub slack_icon_emoji: String,
    /// 只打印不发送
    pub dry_run: bool,
    /// 发送失败后的重试次数（0 = 失败即放弃）
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            slack_webhook: String::new(),
            slack_channel: String::new(),
            slack_username: "GitHub PR Notifier".to_string(),
            slack_icon_emoji: ":bell:".to_string(),
            dry_run: false,
            max_retries: 0,
            retry_backoff_ms: 1000,
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubSection,
    pub notification: NotificationSection,
}

/// 加载结果
#[derive(Debug)]
pub enum LoadedConfig {
    Loaded(Config),
    /// 配置文件不存在，已写入默认模板
    TemplateCreated(PathBuf),
}

impl Config {
    /// 默认路径 `~/.github-pr-notifier/config.json`
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// 读取配置文件并应用环境变量回退；文件不存在时返回默认值
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                Error::ConfigurationIncomplete(format!("{} is not valid JSON: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 读取配置；文件不存在时写入模板并返回 [`LoadedConfig::TemplateCreated`]
    pub fn load_or_create(path: &Path) -> Result<LoadedConfig> {
        if !path.exists() {
            Config::default().save(path)?;
            info!(path = %path.display(), "Config template created");
            return Ok(LoadedConfig::TemplateCreated(path.to_path_buf()));
        }
        Ok(LoadedConfig::Loaded(Self::load(path)?))
    }

    /// 写入配置文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 空字段回退到环境变量
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |field: &mut String, key: &str| {
            if field.trim().is_empty() {
                if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                    debug!(key, "Using value from environment");
                    *field = value.trim().to_string();
                }
            }
        };
        fill(&mut self.github.token, "GITHUB_TOKEN");
        fill(&mut self.github.username, "GITHUB_USERNAME");
        fill(&mut self.notification.slack_webhook, "SLACK_WEBHOOK_URL");
    }

    /// 启动前校验：token 与用户名必填
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.github.token.trim().is_empty() {
            missing.push("github.token");
        }
        if self.github.username.trim().is_empty() {
            missing.push("github.username");
        }
        if !missing.is_empty() {
            return Err(Error::ConfigurationIncomplete(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if self.github.check_interval == 0 {
            return Err(Error::ConfigurationIncomplete(
                "github.check_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn has_webhook(&self) -> bool {
        !self.notification.slack_webhook.trim().is_empty()
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.github.check_interval)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.github.refresh_interval)
    }

    pub fn github_client_config(&self) -> GithubClientConfig {
        GithubClientConfig {
            base_url: self.github.api_base_url.clone(),
            token: self.github.token.clone(),
            timeout_secs: self.github.timeout_secs,
        }
    }

    pub fn slack_config(&self) -> SlackConfig {
        SlackConfig {
            webhook_url: self.notification.slack_webhook.clone(),
            channel: Some(self.notification.slack_channel.clone()).filter(|c| !c.is_empty()),
            username: self.notification.slack_username.clone(),
            icon_emoji: self.notification.slack_icon_emoji.clone(),
            timeout_secs: self.github.timeout_secs,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.notification.max_retries,
            initial_backoff_ms: self.notification.retry_backoff_ms,
            ..RetryConfig::default()
        }
    }

    pub fn author_filter(&self) -> AuthorFilter {
        AuthorFilter::new(self.github.username.clone())
            .with_bot_logins(self.github.bot_logins.clone())
    }
}
