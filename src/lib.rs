//! GitHub PR Notifier - 监控 PR 上的新评论和 review，推送到 Slack

pub mod activity;
pub mod cli;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod detector;
pub mod error;
pub mod github;
pub mod notification;
pub mod registry;
pub mod store;

pub use activity::{truncate_body, ActivityEvent, AuthorFilter, CommentKind, EventBase, ReviewState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LoadedConfig};
pub use daemon::{Daemon, DaemonOptions, DaemonSummary, InstanceLock};
pub use detector::{ChangeDetector, CycleReport};
pub use error::{Error, Result};
pub use github::{GithubClient, GithubClientConfig, RawComment, RawReview, ReviewSource, User};
pub use notification::{
    NotificationChannel, NotificationDispatcher, NotificationMessage, RetryConfig, SendResult, SlackChannel,
    SlackConfig,
};
pub use registry::{PrRegistry, TrackedPr};
pub use store::{BoundedIdSet, DedupState, DedupStore, MAX_NOTIFIED_IDS};
