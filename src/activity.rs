//! 活动事件 - 评论与 review 的统一表示
//!
//! 事件只在单个检测周期内存在，持久化的只有它们的 id。

use chrono::{DateTime, Utc};
use std::fmt;

use crate::registry::TrackedPr;

/// 摘要最大字符数
pub const EXCERPT_MAX_CHARS: usize = 100;
/// 截断标记
pub const ELLIPSIS: &str = "...";
/// GitHub App 账号的保留后缀
pub const BOT_LOGIN_SUFFIX: &str = "[bot]";

/// 按字符截断正文，超过 100 字符时追加 `...`
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((cut, _)) => format!("{}{}", &body[..cut], ELLIPSIS),
        None => body.to_string(),
    }
}

/// Review 状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    /// 未识别的原始状态
    Other(String),
}

impl ReviewState {
    /// 映射 GitHub 原始状态，未知值不报错
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "APPROVED" => ReviewState::Approved,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            "COMMENTED" => ReviewState::Commented,
            "DISMISSED" => ReviewState::Dismissed,
            _ => ReviewState::Other(raw.to_string()),
        }
    }

    /// 通知正文里使用的动词
    pub fn verb(&self) -> &str {
        match self {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "requested changes",
            ReviewState::Commented => "commented",
            ReviewState::Dismissed => "dismissed the review",
            ReviewState::Other(raw) => raw,
        }
    }
}

/// 评论来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// PR 会话区评论
    Issue,
    /// 代码行上的评论
    ReviewThread,
}

/// 事件公共字段
#[derive(Debug, Clone, PartialEq)]
pub struct EventBase {
    pub source_thread: TrackedPr,
    pub author_login: String,
    pub author_is_bot: bool,
    pub submitted_at: DateTime<Utc>,
    /// 已截断的正文
    pub body_excerpt: String,
    pub permalink: String,
    pub event_id: String,
}

/// 活动事件
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    Comment {
        base: EventBase,
        kind: CommentKind,
    },
    Review {
        base: EventBase,
        state: ReviewState,
    },
}

impl ActivityEvent {
    pub fn base(&self) -> &EventBase {
        match self {
            ActivityEvent::Comment { base, .. } | ActivityEvent::Review { base, .. } => base,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.base().event_id
    }

    /// "comment" | "review"
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActivityEvent::Comment { .. } => "comment",
            ActivityEvent::Review { .. } => "review",
        }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base();
        write!(
            f,
            "{} {} on {} by {}",
            self.kind_name(),
            base.event_id,
            base.source_thread,
            base.author_login
        )
    }
}

/// 作者分类：自己 / bot / 其他人
#[derive(Debug, Clone)]
pub struct AuthorFilter {
    me: String,
    bot_logins: Vec<String>,
}

impl AuthorFilter {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            bot_logins: Vec::new(),
        }
    }

    /// 额外视为 bot 的账号（例如 CI 用的普通账号）
    pub fn with_bot_logins(mut self, logins: Vec<String>) -> Self {
        self.bot_logins = logins;
        self
    }

    /// GitHub 登录名不区分大小写
    pub fn is_self(&self, login: &str) -> bool {
        login.eq_ignore_ascii_case(&self.me)
    }

    pub fn is_bot(&self, login: &str, flagged_bot: bool) -> bool {
        flagged_bot
            || login.to_ascii_lowercase().ends_with(BOT_LOGIN_SUFFIX)
            || self.bot_logins.iter().any(|b| b.eq_ignore_ascii_case(login))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_body() {
        let body = "a".repeat(150);
        let excerpt = truncate_body(&body);
        assert_eq!(excerpt, format!("{}...", "a".repeat(100)));
    }

    #[test]
    fn test_truncate_short_body_verbatim() {
        let body = "b".repeat(80);
        assert_eq!(truncate_body(&body), body);
    }

    #[test]
    fn test_truncate_exactly_limit() {
        let body = "c".repeat(100);
        assert_eq!(truncate_body(&body), body);
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let body = "レビュー".repeat(30); // 120 字符
        let excerpt = truncate_body(&body);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 103);
    }

    #[test]
    fn test_review_state_mapping() {
        assert_eq!(ReviewState::from_raw("APPROVED"), ReviewState::Approved);
        assert_eq!(ReviewState::from_raw("CHANGES_REQUESTED"), ReviewState::ChangesRequested);
        assert_eq!(ReviewState::from_raw("commented"), ReviewState::Commented);
        assert_eq!(ReviewState::from_raw("DISMISSED"), ReviewState::Dismissed);
        assert_eq!(
            ReviewState::from_raw("SOMETHING_NEW"),
            ReviewState::Other("SOMETHING_NEW".to_string())
        );
    }

    #[test]
    fn test_review_state_verbs() {
        assert_eq!(ReviewState::Approved.verb(), "approved");
        assert_eq!(ReviewState::ChangesRequested.verb(), "requested changes");
        assert_eq!(ReviewState::Commented.verb(), "commented");
        assert_eq!(ReviewState::Dismissed.verb(), "dismissed the review");
        assert_eq!(ReviewState::Other("PENDING".to_string()).verb(), "PENDING");
    }

    #[test]
    fn test_author_filter() {
        let filter = AuthorFilter::new("Alice").with_bot_logins(vec!["ci-runner".to_string()]);
        assert!(filter.is_self("alice"));
        assert!(!filter.is_self("bob"));

        assert!(filter.is_bot("renovate[bot]", false));
        assert!(filter.is_bot("Dependabot[BOT]", false));
        assert!(filter.is_bot("some-app", true));
        assert!(filter.is_bot("CI-Runner", false));
        assert!(!filter.is_bot("bob", false));
    }
}
