mod common;

use common::*;
use github_pr_notifier::{ChangeDetector, Daemon, DaemonOptions, DedupStore, ManualClock, NotificationDispatcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn options(max_cycles: usize) -> DaemonOptions {
    DaemonOptions {
        check_interval: Duration::from_millis(10),
        refresh_interval: Duration::from_secs(1800),
        max_cycles: Some(max_cycles),
    }
}

fn detector(source: Arc<MockSource>, channel: Arc<RecordingChannel>, state_path: &Path) -> ChangeDetector {
    ChangeDetector::new(
        source,
        NotificationDispatcher::new().with_channel(channel),
        DedupStore::new(state_path),
        "octocat",
    )
    .with_clock(Arc::new(ManualClock::new(t0())))
}

#[tokio::test]
async fn test_daemon_runs_cycles_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("cache.json");
    let widgets = pr("acme", "widgets", 42);
    let source = Arc::new(MockSource::new(vec![widgets.clone()]));
    source.add_issue_comment(&widgets, comment(1, user("alice"), "ping", t0() + chrono::Duration::minutes(1)));
    let channel = Arc::new(RecordingChannel::new());

    let summary = Daemon::new(options(3))
        .run_until(detector(source.clone(), channel.clone(), &state_path), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.failed_cycles, 0);
    assert_eq!(summary.dispatched, 1);
    assert!(!summary.interrupted);
    assert_eq!(channel.get_send_count(), 1);
    assert!(state_path.exists());
}

#[tokio::test]
async fn test_daemon_keeps_running_after_failed_cycles() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("cache.json");
    let source = Arc::new(MockSource::new(vec![pr("acme", "widgets", 42)]));
    source.fail_search(true);
    let channel = Arc::new(RecordingChannel::new());

    let summary = Daemon::new(options(2))
        .run_until(detector(source.clone(), channel, &state_path), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.failed_cycles, 2);
    assert!(!state_path.exists());
}

#[tokio::test]
async fn test_shutdown_before_first_tick() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("cache.json");
    let source = Arc::new(MockSource::new(vec![pr("acme", "widgets", 42)]));
    let channel = Arc::new(RecordingChannel::new());

    let summary = Daemon::new(options(5))
        .run_until(detector(source.clone(), channel.clone(), &state_path), async {})
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.cycles, 0);
    assert_eq!(source.search_calls(), 0);
    assert!(!state_path.exists());
}
