//! 消息格式化 - ActivityEvent → NotificationMessage
//!
//! ```text
//! 标题: widgets PR #42 has a new review
//! 正文: bob requested changes: please add tests
//! 链接: View review → review 地址（缺失时用 PR 地址）
//! ```

use chrono::{DateTime, SecondsFormat, Utc};

use super::channel::{MessageMetadata, NotificationMessage};
use crate::activity::ActivityEvent;

/// `{repo} PR #{number} has a new {comment|review}`
pub fn title(event: &ActivityEvent) -> String {
    let pr = &event.base().source_thread;
    format!("{} PR #{} has a new {}", pr.repo, pr.number, event.kind_name())
}

/// 评论：`{author}: {excerpt}`；review：`{reviewer} {verb}[: {excerpt}]`
pub fn body(event: &ActivityEvent) -> String {
    match event {
        ActivityEvent::Comment { base, .. } => {
            format!("{}: {}", base.author_login, base.body_excerpt)
        }
        ActivityEvent::Review { base, state } => {
            if base.body_excerpt.is_empty() {
                format!("{} {}", base.author_login, state.verb())
            } else {
                format!("{} {}: {}", base.author_login, state.verb(), base.body_excerpt)
            }
        }
    }
}

/// PR 说明行 `{repo} #{number} - {title}`
pub fn context_line(event: &ActivityEvent) -> String {
    let pr = &event.base().source_thread;
    if pr.title.is_empty() {
        format!("{} #{}", pr.repo, pr.number)
    } else {
        format!("{} #{} - {}", pr.repo, pr.number, pr.title)
    }
}

/// 事件链接；为空时回退到 PR 地址
pub fn permalink(event: &ActivityEvent) -> &str {
    let base = event.base();
    if base.permalink.is_empty() {
        &base.source_thread.url
    } else {
        &base.permalink
    }
}

fn link_label(event: &ActivityEvent) -> &'static str {
    match event {
        ActivityEvent::Comment { .. } => "View comment",
        ActivityEvent::Review { .. } => "View review",
    }
}

/// 渲染完整消息
pub fn render(event: &ActivityEvent, now: DateTime<Utc>) -> NotificationMessage {
    let base = event.base();
    let metadata = MessageMetadata {
        event_type: event.kind_name().to_string(),
        event_id: Some(base.event_id.clone()),
        author: Some(base.author_login.clone()),
        thread: Some(base.source_thread.key()),
        thread_url: Some(base.source_thread.url.clone()).filter(|u| !u.is_empty()),
        timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    };

    NotificationMessage::new(title(event), body(event))
        .with_context(context_line(event))
        .with_link(link_label(event), permalink(event))
        .with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{CommentKind, EventBase, ReviewState};
    use crate::registry::TrackedPr;

    fn base(permalink: &str, excerpt: &str) -> EventBase {
        EventBase {
            source_thread: TrackedPr {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                number: 42,
                title: "Add widget".to_string(),
                url: "https://github.com/acme/widgets/pull/42".to_string(),
            },
            author_login: "bob".to_string(),
            author_is_bot: false,
            submitted_at: Utc::now(),
            body_excerpt: excerpt.to_string(),
            permalink: permalink.to_string(),
            event_id: "99".to_string(),
        }
    }

    fn review(state: ReviewState, excerpt: &str) -> ActivityEvent {
        ActivityEvent::Review {
            base: base("https://github.com/acme/widgets/pull/42#pullrequestreview-99", excerpt),
            state,
        }
    }

    #[test]
    fn test_comment_rendering() {
        let event = ActivityEvent::Comment {
            base: base("https://github.com/acme/widgets/pull/42#issuecomment-99", "looks good"),
            kind: CommentKind::Issue,
        };
        let msg = render(&event, Utc::now());
        assert_eq!(msg.title, "widgets PR #42 has a new comment");
        assert_eq!(msg.body, "bob: looks good");
        assert_eq!(msg.context.as_deref(), Some("widgets #42 - Add widget"));
        let link = msg.link.unwrap();
        assert_eq!(link.label, "View comment");
        assert!(link.url.ends_with("#issuecomment-99"));
        assert_eq!(msg.metadata.thread.as_deref(), Some("acme/widgets#42"));
        assert_eq!(msg.metadata.author.as_deref(), Some("bob"));
    }

    #[test]
    fn test_review_bodies_per_state() {
        assert_eq!(body(&review(ReviewState::Approved, "")), "bob approved");
        assert_eq!(
            body(&review(ReviewState::ChangesRequested, "add tests")),
            "bob requested changes: add tests"
        );
        assert_eq!(body(&review(ReviewState::Commented, "nit")), "bob commented: nit");
        assert_eq!(body(&review(ReviewState::Dismissed, "")), "bob dismissed the review");
        assert_eq!(
            body(&review(ReviewState::Other("ESCALATED".to_string()), "")),
            "bob ESCALATED"
        );
        assert_eq!(
            title(&review(ReviewState::Approved, "")),
            "widgets PR #42 has a new review"
        );
    }

    #[test]
    fn test_review_permalink_falls_back_to_thread_url() {
        let event = ActivityEvent::Review {
            base: base("", ""),
            state: ReviewState::Approved,
        };
        let msg = render(&event, Utc::now());
        let link = msg.link.unwrap();
        assert_eq!(link.label, "View review");
        assert_eq!(link.url, "https://github.com/acme/widgets/pull/42");
    }
}
