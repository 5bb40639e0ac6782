//! test-notify 命令 - 通过配置的渠道发一条示例通知

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;
use std::path::Path;

use super::context::{build_dispatcher, effective_dry_run, load_config};
use crate::notification::{MessageMetadata, NotificationMessage, SendResult};

/// test-notify 命令参数
#[derive(Args)]
pub struct TestNotifyArgs {
    /// 自定义消息内容
    #[arg(long, short)]
    pub message: Option<String>,
}

/// 示例消息
pub fn sample_message(text: Option<&str>) -> NotificationMessage {
    let now = Utc::now();
    NotificationMessage::new(
        "GitHub PR Notifier test",
        text.unwrap_or("If you can read this, the Slack webhook works."),
    )
    .with_metadata(MessageMetadata {
        event_type: "test".to_string(),
        timestamp: Some(now.to_rfc3339()),
        ..Default::default()
    })
}

/// 处理 test-notify 命令（阻塞调用）
pub fn handle_test_notify(args: TestNotifyArgs, config_path: &Path) -> Result<()> {
    let Some(config) = load_config(config_path)? else {
        return Ok(());
    };
    let dry_run = effective_dry_run(&config, false);
    let dispatcher = build_dispatcher(&config, dry_run)?;

    match dispatcher.send(&sample_message(args.message.as_deref()))? {
        SendResult::Sent => {
            println!("Test notification sent via {}", dispatcher.channel_name().unwrap_or("slack"));
            Ok(())
        }
        SendResult::Skipped(reason) => {
            println!("Test notification not sent ({}), check notification.slack_webhook", reason);
            Ok(())
        }
        SendResult::Failed(reason) => Err(anyhow!("Test notification failed: {}", reason)),
    }
}
