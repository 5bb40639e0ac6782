//! Slack Incoming Webhook 渠道
//!
//! 每条通知一次 POST，payload 使用 Block Kit：
//! header → PR 链接 → 作者与摘要 → 跳转按钮 → 通知时间

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::notification::channel::{NotificationChannel, NotificationMessage, SendResult};

/// Slack 渠道配置
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub webhook_url: String,
    /// 覆盖 webhook 默认频道
    pub channel: Option<String>,
    /// 发送者显示名
    pub username: String,
    /// 发送者图标
    pub icon_emoji: String,
    pub timeout_secs: u64,
}

/// Webhook 请求载荷
#[derive(Debug, Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub username: String,
    pub icon_emoji: String,
    /// 不支持 blocks 的客户端显示的回退文本
    pub text: String,
    pub blocks: Vec<Value>,
}

/// Slack 渠道
#[derive(Debug)]
pub struct SlackChannel {
    client: Client,
    config: SlackConfig,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Result<Self> {
        if config.webhook_url.trim().is_empty() {
            return Err(Error::ConfigurationIncomplete(
                "notification.slack_webhook".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Delivery(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// 构建 Block Kit payload
    pub fn build_payload(&self, message: &NotificationMessage) -> SlackPayload {
        let mut blocks = vec![json!({
            "type": "header",
            "text": {"type": "plain_text", "text": message.title, "emoji": true}
        })];

        if let Some(context) = &message.context {
            let pr_line = match &message.metadata.thread_url {
                Some(url) => format!("*PR:* <{}|{}>", url, escape_mrkdwn(context)),
                None => format!("*PR:* {}", escape_mrkdwn(context)),
            };
            blocks.push(json!({
                "type": "section",
                "text": {"type": "mrkdwn", "text": pr_line}
            }));
        }

        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": body_mrkdwn(message)}
        }));

        if let Some(link) = &message.link {
            blocks.push(json!({
                "type": "actions",
                "elements": [{
                    "type": "button",
                    "text": {"type": "plain_text", "text": link.label, "emoji": true},
                    "url": link.url
                }]
            }));
        }

        if let Some(ts) = &message.metadata.timestamp {
            blocks.push(json!({
                "type": "context",
                "elements": [{"type": "mrkdwn", "text": format!("Notified at {}", ts)}]
            }));
        }

        SlackPayload {
            channel: self.config.channel.clone(),
            username: self.config.username.clone(),
            icon_emoji: self.config.icon_emoji.clone(),
            text: format!("{}\n{}", message.title, message.body),
            blocks,
        }
    }
}

/// 正文以作者开头时加粗为 `*@author*`
fn body_mrkdwn(message: &NotificationMessage) -> String {
    match &message.metadata.author {
        Some(author) if !author.is_empty() && message.body.starts_with(author.as_str()) => {
            let rest = &message.body[author.len()..];
            format!("*@{}*{}", escape_mrkdwn(author), escape_mrkdwn(rest))
        }
        _ => escape_mrkdwn(&message.body),
    }
}

/// Slack mrkdwn 只需转义这三个字符
fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        let payload = self.build_payload(message);
        debug!(blocks = payload.blocks.len(), "Posting Slack webhook");

        let response = match self.client.post(&self.config.webhook_url).json(&payload).send() {
            Ok(r) => r,
            Err(e) => return Ok(SendResult::Failed(format!("HTTP request failed: {}", e))),
        };

        let status = response.status();
        if status.is_success() {
            info!(title = %message.title, "Slack notification sent");
            Ok(SendResult::Sent)
        } else {
            let body = response.text().unwrap_or_default();
            Ok(SendResult::Failed(format!("Slack webhook returned {}: {}", status, body)))
        }
    }
}
