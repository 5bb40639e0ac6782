//! 通知渠道 trait 定义

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// 与具体渠道无关的通知消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// 标题，如 `widgets PR #42 has a new comment`
    pub title: String,
    /// 正文，如 `alice: looks good`
    pub body: String,
    /// 所属 PR 的说明行，如 `widgets #42 - Add widget`
    pub context: Option<String>,
    /// 唯一的跳转链接
    pub link: Option<ActionLink>,
    pub metadata: MessageMetadata,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            context: None,
            link: None,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.link = Some(ActionLink {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 跳转按钮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLink {
    pub label: String,
    pub url: String,
}

/// 消息元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// "comment" | "review"
    pub event_type: String,
    pub event_id: Option<String>,
    /// 评论者或 reviewer 的登录名
    pub author: Option<String>,
    /// `owner/repo#number`
    pub thread: Option<String>,
    pub thread_url: Option<String>,
    /// RFC 3339 通知时间
    pub timestamp: Option<String>,
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（dry-run 或未配置渠道）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

/// 通知渠道 trait
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 同步发送一条消息
    fn send(&self, message: &NotificationMessage) -> Result<SendResult>;
}
