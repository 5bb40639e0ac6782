//! 常驻轮询进程
//!
//! 每个 tick 在阻塞线程上跑一个检测周期，周期之间不重叠。
//! 收到 Ctrl-C 时置位中断标志，等待进行中的周期放弃后退出。

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::detector::{ChangeDetector, CycleReport};
use crate::error::Error;

/// 单实例锁，进程退出或 drop 时释放
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// 默认路径 `~/.github-pr-notifier/daemon.lock`
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("daemon.lock")
    }

    /// 获取独占锁；已有实例持有时立即失败
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "Another notifier instance is already running (lock held on {})",
                path.display()
            )
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// 轮询参数
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub check_interval: Duration,
    pub refresh_interval: Duration,
    /// 跑满指定周期数后退出，None 表示一直运行
    pub max_cycles: Option<usize>,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(1800),
            max_cycles: None,
        }
    }
}

/// 退出时的汇总
#[derive(Debug, Default, Clone)]
pub struct DaemonSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub dispatched: usize,
    pub interrupted: bool,
}

/// 轮询进程
pub struct Daemon {
    options: DaemonOptions,
    interrupt: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(options: DaemonOptions) -> Self {
        Self {
            options,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 交给检测器的中断标志
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// 运行直到 Ctrl-C
    pub async fn run(self, detector: ChangeDetector) -> Result<DaemonSummary> {
        self.run_until(detector, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// 运行直到 `shutdown` 完成或跑满 `max_cycles`
    pub async fn run_until<F>(self, detector: ChangeDetector, shutdown: F) -> Result<DaemonSummary>
    where
        F: Future<Output = ()>,
    {
        let detector = detector.with_interrupt(self.interrupt.clone());
        let refresh_interval = chrono::Duration::from_std(self.options.refresh_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(1800));

        info!(
            check_interval_secs = self.options.check_interval.as_secs(),
            refresh_interval_secs = self.options.refresh_interval.as_secs(),
            tracked = detector.registry().prs().len(),
            "Notifier daemon started"
        );

        let mut ticker = tokio::time::interval(self.options.check_interval);
        // 周期超时后不补跑积压的 tick
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut summary = DaemonSummary::default();
        let mut detector = Some(detector);

        loop {
            if let Some(max) = self.options.max_cycles {
                if summary.cycles >= max {
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    summary.interrupted = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            let Some(mut det) = detector.take() else {
                break;
            };
            let mut cycle = tokio::task::spawn_blocking(move || {
                let result = run_tick(&mut det, refresh_interval);
                (det, result)
            });

            let joined = tokio::select! {
                joined = &mut cycle => joined,
                _ = &mut shutdown => {
                    info!("Shutdown requested, waiting for the running cycle to stop");
                    self.interrupt.store(true, Ordering::Relaxed);
                    summary.interrupted = true;
                    cycle.await
                }
            };

            let (det, result) = joined.map_err(|e| anyhow!("Detection cycle task failed: {}", e))?;
            detector = Some(det);
            summary.cycles += 1;

            match result {
                Ok(report) => summary.dispatched += report.dispatched,
                Err(Error::Interrupted) => break,
                Err(e) if e.is_transient() => {
                    summary.failed_cycles += 1;
                    warn!(error = %e, "Detection cycle skipped, will retry on the next tick");
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    error!(error = %e, "Detection cycle failed, will retry on the next tick");
                }
            }

            if summary.interrupted {
                break;
            }
        }

        // 阻塞 HTTP 客户端需要在阻塞线程上释放
        if let Some(det) = detector {
            let _ = tokio::task::spawn_blocking(move || drop(det)).await;
        }

        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            dispatched = summary.dispatched,
            "Notifier daemon stopped"
        );
        Ok(summary)
    }
}

/// 到期时先刷新追踪列表，再跑检测周期
fn run_tick(
    detector: &mut ChangeDetector,
    refresh_interval: chrono::Duration,
) -> crate::error::Result<CycleReport> {
    if !detector.registry().is_empty() && detector.registry_due(refresh_interval) {
        if let Err(e) = detector.refresh_registry() {
            warn!(error = %e, "Periodic PR list refresh failed, keeping cached list");
        }
    }
    detector.run_cycle()
}
