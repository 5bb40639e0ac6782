//! 通知层 - 把活动事件渲染成消息并发送到 Slack
//!
//! # 使用示例
//! ```ignore
//! use github_pr_notifier::notification::{NotificationDispatcher, SlackChannel};
//!
//! let dispatcher = NotificationDispatcher::new()
//!     .with_channel(Arc::new(SlackChannel::new(config.slack_config())?))
//!     .with_retry(config.retry_config());
//!
//! dispatcher.dispatch(&event)?;
//! ```

pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod formatter;

pub use channel::{ActionLink, MessageMetadata, NotificationChannel, NotificationMessage, SendResult};
pub use channels::{SlackChannel, SlackConfig};
pub use dispatcher::{NotificationDispatcher, RetryConfig};
