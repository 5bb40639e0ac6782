//! init 命令 - 交互式生成配置文件
//!
//! 已有配置或环境变量中的值作为默认值，`--yes` 跳过所有提示直接写入。

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Confirm, Input};
use std::path::Path;

use crate::config::Config;

/// init 命令参数
#[derive(Args)]
pub struct InitArgs {
    /// 使用已有配置和环境变量，跳过交互式提示
    #[arg(long, short)]
    pub yes: bool,
}

/// 处理 init 命令
pub fn handle_init(args: InitArgs, config_path: &Path) -> Result<()> {
    let existing = config_path.exists();
    let mut config = Config::load(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    if args.yes {
        config.save(config_path)?;
        println!("Config written to {}", config_path.display());
        report_missing(&config);
        return Ok(());
    }

    println!("GitHub PR Notifier setup\n");
    if existing {
        println!("Existing config: {}", config_path.display());
        let overwrite = Confirm::new()
            .with_prompt("Update it? (unchanged fields are kept)")
            .default(true)
            .interact()
            .unwrap_or(false);
        if !overwrite {
            println!("Cancelled.");
            return Ok(());
        }
        println!();
    }

    config.github.username = prompt("GitHub username", &config.github.username)?;
    config.github.token = prompt("GitHub token (repo scope)", &config.github.token)?;
    config.notification.slack_webhook = prompt("Slack webhook URL", &config.notification.slack_webhook)?;
    config.notification.slack_channel = prompt("Slack channel override (optional)", &config.notification.slack_channel)?;

    config.github.check_interval = Input::new()
        .with_prompt("Check interval (seconds)")
        .default(config.github.check_interval)
        .validate_with(|v: &u64| if *v > 0 { Ok(()) } else { Err("must be greater than 0") })
        .interact_text()
        .context("Failed to read check interval")?;

    config.save(config_path)?;
    println!("\nConfig written to {}", config_path.display());
    report_missing(&config);
    Ok(())
}

fn prompt(label: &str, current: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(label)
        .default(current.to_string())
        .allow_empty(true)
        .interact_text()
        .with_context(|| format!("Failed to read {}", label))?;
    Ok(value.trim().to_string())
}

fn report_missing(config: &Config) {
    if let Err(e) = config.validate() {
        println!("Still incomplete: {}", e);
    } else if !config.has_webhook() {
        println!("No Slack webhook set, notifications will only be logged (dry-run).");
    } else {
        println!("Run `gpn test-notify` to check the webhook, then `gpn run`.");
    }
}
