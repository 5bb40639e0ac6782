//! 通知分发器 - 渲染事件并发送到唯一的渠道
//!
//! 默认失败即放弃（不排队、不重试），调用方照常记录事件 id，
//! 避免同一事件每个周期都重复通知。可选配置有界重试。

use super::channel::{NotificationChannel, NotificationMessage, SendResult};
use super::formatter;
use crate::activity::ActivityEvent;
use crate::error::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 发送重试配置（指数退避）
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 首次失败后的最大重试次数，0 表示不重试
    pub max_retries: u32,
    /// 初始退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 最大退避（毫秒）
    pub max_backoff_ms: u64,
    /// 退避倍数
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 第 `retry` 次重试（从 0 开始）前的等待时间
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry as i32);
        let ms = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// 通知分发器
pub struct NotificationDispatcher {
    channel: Option<Arc<dyn NotificationChannel>>,
    /// 是否为 dry-run 模式
    dry_run: bool,
    retry: RetryConfig,
}

impl NotificationDispatcher {
    /// 未配置渠道的分发器只打印日志
    pub fn new() -> Self {
        Self {
            channel: None,
            dry_run: false,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        info!(channel = channel.name(), "Registering notification channel");
        self.channel = Some(channel);
        self
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.name())
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run || self.channel.is_none()
    }

    /// 渲染并发送一个活动事件
    pub fn dispatch(&self, event: &ActivityEvent) -> Result<SendResult> {
        let message = formatter::render(event, Utc::now());
        self.send(&message)
    }

    /// 发送已渲染的消息；重试耗尽后返回 [`Error::Delivery`]
    pub fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        let channel = match (&self.channel, self.dry_run) {
            (Some(channel), false) => channel,
            _ => {
                info!(
                    title = %message.title,
                    body = %message.body,
                    url = ?message.link.as_ref().map(|l| l.url.as_str()),
                    "[DRY-RUN] Notification not sent"
                );
                return Ok(SendResult::Skipped("dry-run".to_string()));
            }
        };

        let mut last_error = String::new();
        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let wait = self.retry.backoff_for(attempt - 1);
                warn!(
                    channel = channel.name(),
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Retrying notification"
                );
                std::thread::sleep(wait);
            }

            match channel.send(message) {
                Ok(SendResult::Failed(reason)) => last_error = reason,
                Ok(result) => return Ok(result),
                Err(e) => last_error = e.to_string(),
            }
        }

        warn!(channel = channel.name(), error = %last_error, "Channel send failed");
        Err(Error::Delivery(last_error))
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    /// 测试用的 mock 渠道
    struct MockChannel {
        name: String,
        send_count: AtomicUsize,
    }

    impl MockChannel {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                send_count: AtomicUsize::new(0),
            }
        }

        fn get_send_count(&self) -> usize {
            self.send_count.load(Ordering::SeqCst)
        }
    }

    impl NotificationChannel for MockChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn send(&self, _message: &NotificationMessage) -> Result<SendResult> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            Ok(SendResult::Sent)
        }
    }

    /// 前 N 次失败，之后成功
    struct FailingMockChannel {
        failures_remaining: AtomicU32,
        send_attempts: AtomicU32,
    }

    impl FailingMockChannel {
        fn new(fail_count: u32) -> Self {
            Self {
                failures_remaining: AtomicU32::new(fail_count),
                send_attempts: AtomicU32::new(0),
            }
        }

        fn get_attempt_count(&self) -> u32 {
            self.send_attempts.load(Ordering::SeqCst)
        }
    }

    impl NotificationChannel for FailingMockChannel {
        fn name(&self) -> &str {
            "failing"
        }

        fn send(&self, _message: &NotificationMessage) -> Result<SendResult> {
            self.send_attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                Ok(SendResult::Failed("transient error".to_string()))
            } else {
                Ok(SendResult::Sent)
            }
        }
    }

    fn no_wait(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_dispatcher_send() {
        let channel = Arc::new(MockChannel::new("test"));
        let dispatcher = NotificationDispatcher::new().with_channel(channel.clone());

        let message = NotificationMessage::new("title", "body");
        let result = dispatcher.send(&message).unwrap();

        assert_eq!(result, SendResult::Sent);
        assert_eq!(channel.get_send_count(), 1);
        assert_eq!(dispatcher.channel_name(), Some("test"));
    }

    #[test]
    fn test_dispatcher_dry_run() {
        let channel = Arc::new(MockChannel::new("test"));
        let dispatcher = NotificationDispatcher::new()
            .with_channel(channel.clone())
            .with_dry_run(true);

        let result = dispatcher.send(&NotificationMessage::new("t", "b")).unwrap();

        assert_eq!(result, SendResult::Skipped("dry-run".to_string()));
        assert_eq!(channel.get_send_count(), 0); // 不应该实际发送
    }

    #[test]
    fn test_dispatcher_without_channel_is_dry_run() {
        let dispatcher = NotificationDispatcher::new();
        assert!(dispatcher.is_dry_run());
        let result = dispatcher.send(&NotificationMessage::new("t", "b")).unwrap();
        assert!(matches!(result, SendResult::Skipped(_)));
    }

    #[test]
    fn test_no_retry_by_default() {
        let channel = Arc::new(FailingMockChannel::new(1));
        let dispatcher = NotificationDispatcher::new().with_channel(channel.clone());

        let result = dispatcher.send(&NotificationMessage::new("t", "b"));

        assert!(matches!(result, Err(Error::Delivery(_))));
        assert_eq!(channel.get_attempt_count(), 1);
    }

    #[test]
    fn test_retry_succeeds_after_transient_failures() {
        let channel = Arc::new(FailingMockChannel::new(2)); // 失败两次后成功
        let dispatcher = NotificationDispatcher::new()
            .with_channel(channel.clone())
            .with_retry(no_wait(3));

        let result = dispatcher.send(&NotificationMessage::new("t", "b")).unwrap();

        assert_eq!(result, SendResult::Sent);
        assert_eq!(channel.get_attempt_count(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_max_retries() {
        let channel = Arc::new(FailingMockChannel::new(10));
        let dispatcher = NotificationDispatcher::new()
            .with_channel(channel.clone())
            .with_retry(no_wait(2));

        let err = dispatcher.send(&NotificationMessage::new("t", "b")).unwrap_err();

        assert!(err.to_string().contains("transient error"));
        assert_eq!(channel.get_attempt_count(), 3);
    }

    #[test]
    fn test_backoff_respects_max() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.backoff_for(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for(3), Duration::from_millis(500)); // 封顶，不是 800
    }
}
