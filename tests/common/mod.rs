//! 集成测试共用的 mock 数据源和通知渠道

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use github_pr_notifier::{
    Error, NotificationChannel, NotificationMessage, RawComment, RawReview, Result, ReviewSource,
    SendResult, TrackedPr, User,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
}

pub fn pr(owner: &str, repo: &str, number: u64) -> TrackedPr {
    TrackedPr {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
        title: format!("PR {}", number),
        url: format!("https://github.com/{}/{}/pull/{}", owner, repo, number),
    }
}

pub fn user(login: &str) -> User {
    User {
        login: login.to_string(),
        user_type: "User".to_string(),
    }
}

pub fn bot_user(login: &str) -> User {
    User {
        login: login.to_string(),
        user_type: "Bot".to_string(),
    }
}

pub fn comment(id: u64, author: User, body: &str, at: DateTime<Utc>) -> RawComment {
    RawComment {
        id,
        user: Some(author),
        body: Some(body.to_string()),
        html_url: format!("https://github.com/acme/widgets/pull/42#issuecomment-{}", id),
        created_at: at,
        updated_at: Some(at),
    }
}

pub fn review(id: u64, author: User, state: &str, body: &str, at: Option<DateTime<Utc>>) -> RawReview {
    RawReview {
        id,
        user: Some(author),
        body: Some(body.to_string()),
        state: state.to_string(),
        html_url: Some(format!("https://github.com/acme/widgets/pull/42#pullrequestreview-{}", id)),
        submitted_at: at,
    }
}

/// 内存中的 GitHub
#[derive(Default)]
pub struct MockSource {
    prs: Mutex<Vec<TrackedPr>>,
    issue_comments: Mutex<HashMap<String, Vec<RawComment>>>,
    review_comments: Mutex<HashMap<String, Vec<RawComment>>>,
    reviews: Mutex<HashMap<String, Vec<RawReview>>>,
    failing: Mutex<HashSet<String>>,
    search_fails: AtomicBool,
    search_calls: AtomicUsize,
    since_seen: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl MockSource {
    pub fn new(prs: Vec<TrackedPr>) -> Self {
        let source = Self::default();
        *source.prs.lock().unwrap() = prs;
        source
    }

    pub fn set_prs(&self, prs: Vec<TrackedPr>) {
        *self.prs.lock().unwrap() = prs;
    }

    pub fn add_issue_comment(&self, pr: &TrackedPr, c: RawComment) {
        self.issue_comments.lock().unwrap().entry(pr.key()).or_default().push(c);
    }

    pub fn add_review_comment(&self, pr: &TrackedPr, c: RawComment) {
        self.review_comments.lock().unwrap().entry(pr.key()).or_default().push(c);
    }

    pub fn add_review(&self, pr: &TrackedPr, r: RawReview) {
        self.reviews.lock().unwrap().entry(pr.key()).or_default().push(r);
    }

    pub fn fail_pr(&self, pr: &TrackedPr, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(pr.key());
        } else {
            set.remove(&pr.key());
        }
    }

    pub fn fail_search(&self, failing: bool) {
        self.search_fails.store(failing, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// 某个 PR 每次拉取评论时使用的 since
    pub fn since_for(&self, pr: &TrackedPr) -> Vec<DateTime<Utc>> {
        let key = pr.key();
        self.since_seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, s)| *s)
            .collect()
    }

    fn check(&self, pr: &TrackedPr) -> Result<()> {
        if self.failing.lock().unwrap().contains(&pr.key()) {
            return Err(Error::UpstreamUnavailable(format!("{} returned 502", pr.key())));
        }
        Ok(())
    }
}

impl ReviewSource for MockSource {
    fn search_open_prs(&self, query: &str) -> Result<Vec<TrackedPr>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.search_fails.load(Ordering::SeqCst) {
            return Err(Error::UpstreamUnavailable("search returned 503".to_string()));
        }
        if query.contains("assignee:") {
            Ok(self.prs.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn list_issue_comments(&self, pr: &TrackedPr, since: DateTime<Utc>) -> Result<Vec<RawComment>> {
        self.since_seen.lock().unwrap().push((pr.key(), since));
        self.check(pr)?;
        Ok(self.issue_comments.lock().unwrap().get(&pr.key()).cloned().unwrap_or_default())
    }

    fn list_review_comments(&self, pr: &TrackedPr, _since: DateTime<Utc>) -> Result<Vec<RawComment>> {
        self.check(pr)?;
        Ok(self.review_comments.lock().unwrap().get(&pr.key()).cloned().unwrap_or_default())
    }

    fn list_reviews(&self, pr: &TrackedPr) -> Result<Vec<RawReview>> {
        self.check(pr)?;
        Ok(self.reviews.lock().unwrap().get(&pr.key()).cloned().unwrap_or_default())
    }
}

/// 记录收到的消息；`failing` 为 true 时返回失败
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<NotificationMessage>>,
    send_count: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let channel = Self::default();
        channel.failing.store(true, Ordering::SeqCst);
        channel
    }

    pub fn get_send_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, message: &NotificationMessage) -> Result<SendResult> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Ok(SendResult::Failed("webhook returned 500".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(SendResult::Sent)
    }
}
