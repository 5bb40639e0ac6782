//! GitHub PR Notifier CLI
//!
//! 轮询分配给自己或自己创建的 PR，把新评论和 review 推送到 Slack

use anyhow::Result;
use clap::{Parser, Subcommand};
use github_pr_notifier::cli::{CheckArgs, InitArgs, RefreshArgs, RunArgs, StatusArgs, TestNotifyArgs};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "gpn")]
#[command(about = "GitHub PR Notifier - 把 PR 上的新评论和 review 推送到 Slack")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.github-pr-notifier/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 常驻运行，按间隔检查新活动
    Run(RunArgs),
    /// 执行一次检查后退出
    Check(CheckArgs),
    /// 刷新追踪的 PR 列表
    Refresh(RefreshArgs),
    /// 查看本地状态
    Status(StatusArgs),
    /// 生成或更新配置文件
    Init(InitArgs),
    /// 发送一条测试通知
    TestNotify(TestNotifyArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，例如: RUST_LOG=debug gpn run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("github_pr_notifier=info,gpn=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let config_path = github_pr_notifier::cli::config_path(cli.config.as_deref());

    // 阻塞 HTTP 客户端不能在异步上下文中使用，单次命令放到阻塞线程执行
    match cli.command {
        Commands::Run(args) => github_pr_notifier::cli::handle_run(args, &config_path).await?,
        Commands::Check(args) => {
            tokio::task::spawn_blocking(move || github_pr_notifier::cli::handle_check(args, &config_path)).await??
        }
        Commands::Refresh(args) => {
            tokio::task::spawn_blocking(move || github_pr_notifier::cli::handle_refresh(args, &config_path)).await??
        }
        Commands::Status(args) => github_pr_notifier::cli::handle_status(args, &config_path)?,
        Commands::Init(args) => github_pr_notifier::cli::handle_init(args, &config_path)?,
        Commands::TestNotify(args) => {
            tokio::task::spawn_blocking(move || github_pr_notifier::cli::handle_test_notify(args, &config_path)).await??
        }
    }

    Ok(())
}
