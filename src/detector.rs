//! 变更检测器 - 一个检测周期的完整流程
//!
//! 1. 追踪列表为空时先同步刷新（冷启动）
//! 2. 逐个 PR 拉取水位线之后的评论、代码行评论和 review；单个 PR 失败只记录日志
//! 3. 过滤：自己的跳过、已通知的跳过、bot 的只记录不通知
//! 4. 发送通知，无论成功与否都记录事件 id
//! 5. 全部处理完后推进水位线，一次性写入状态文件
//!
//! 中途收到关闭信号时放弃本周期，不写状态文件。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::activity::{truncate_body, ActivityEvent, AuthorFilter, CommentKind, EventBase, ReviewState};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::github::{RawComment, RawReview, ReviewSource};
use crate::notification::{NotificationDispatcher, SendResult};
use crate::registry::{PrRegistry, TrackedPr};
use crate::store::{DedupState, DedupStore};

/// 单个周期的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// 本周期检查的 PR 数
    pub threads: usize,
    /// 拉取失败的 PR
    pub failed_threads: Vec<String>,
    pub dispatched: usize,
    /// dry-run 下只记录日志、未真正发送的事件
    pub dry_run_skipped: usize,
    pub delivery_failures: usize,
    pub absorbed_bots: usize,
    pub skipped_self: usize,
    pub skipped_seen: usize,
    /// 提交后的水位线
    pub watermark: DateTime<Utc>,
}

impl CycleReport {
    fn new(threads: usize, watermark: DateTime<Utc>) -> Self {
        Self {
            threads,
            failed_threads: Vec::new(),
            dispatched: 0,
            dry_run_skipped: 0,
            delivery_failures: 0,
            absorbed_bots: 0,
            skipped_self: 0,
            skipped_seen: 0,
            watermark,
        }
    }
}

/// 单个 PR 在本周期拉到的原始数据
struct ThreadActivity {
    comments: Vec<(RawComment, CommentKind)>,
    reviews: Vec<RawReview>,
}

/// 变更检测器
pub struct ChangeDetector {
    source: Arc<dyn ReviewSource>,
    dispatcher: NotificationDispatcher,
    store: DedupStore,
    registry: PrRegistry,
    authors: AuthorFilter,
    username: String,
    clock: Arc<dyn Clock>,
    interrupt: Arc<AtomicBool>,
}

impl ChangeDetector {
    pub fn new(
        source: Arc<dyn ReviewSource>,
        dispatcher: NotificationDispatcher,
        store: DedupStore,
        username: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            source,
            dispatcher,
            store,
            registry: PrRegistry::new(),
            authors: AuthorFilter::new(username.clone()),
            username,
            clock: Arc::new(SystemClock),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 注入带缓存列表的注册表
    pub fn with_registry(mut self, registry: PrRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_author_filter(mut self, authors: AuthorFilter) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 共享的中断标志，置位后当前周期在下一个 PR 前放弃
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn registry(&self) -> &PrRegistry {
        &self.registry
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// 距上次刷新是否已超过 `interval`
    pub fn registry_due(&self, interval: chrono::Duration) -> bool {
        self.registry.needs_refresh(self.clock.now(), interval)
    }

    /// 刷新追踪列表；失败时保留旧列表
    pub fn refresh_registry(&mut self) -> Result<usize> {
        let now = self.clock.now();
        let prs = self
            .registry
            .refresh(self.source.as_ref(), &self.username, now)?;
        Ok(prs.len())
    }

    /// 执行一个检测周期
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = self.clock.now();
        let mut state = self.store.load_or_reset(started);

        if self.registry.is_empty() {
            info!("No tracked PRs cached, refreshing before the cycle");
            if let Err(e) = self.refresh_registry() {
                if self.registry.is_empty() {
                    return Err(e);
                }
            }
        }

        let prs = self.registry.prs().to_vec();
        let mut report = CycleReport::new(prs.len(), state.watermark());
        let mut retry_since = BTreeMap::new();

        debug!(
            watermark = %state.watermark(),
            tracked = prs.len(),
            "Starting detection cycle"
        );

        for pr in &prs {
            if self.is_interrupted() {
                warn!(pr = %pr, "Shutdown requested, abandoning cycle without saving");
                return Err(Error::Interrupted);
            }

            let key = pr.key();
            let since = state.since_for(&key);
            match self.fetch_thread(pr, since) {
                Ok(activity) => self.process_thread(pr, activity, &mut state, &mut report),
                Err(e) => {
                    warn!(
                        pr = %key,
                        since = %since,
                        error = %e,
                        "Failed to fetch PR activity, will retry from the previous watermark"
                    );
                    report.failed_threads.push(key.clone());
                    retry_since.insert(key, since);
                }
            }
        }

        // 成功的 PR 移出重试表；不再追踪的 PR 自然被丢弃
        state.retry_since = retry_since;
        // 水位线取周期开始时间，与下个周期的重叠部分由 id 集合去重
        state.advance_watermark(started);
        state.assigned_prs = self.registry.prs().to_vec();
        self.store.save(&state)?;
        report.watermark = state.watermark();

        info!(
            threads = report.threads,
            failed = report.failed_threads.len(),
            dispatched = report.dispatched,
            dry_run_skipped = report.dry_run_skipped,
            delivery_failures = report.delivery_failures,
            absorbed_bots = report.absorbed_bots,
            watermark = %report.watermark,
            "Detection cycle complete"
        );
        Ok(report)
    }

    /// 先拉完三类数据再处理，避免半途失败时只发出部分通知
    fn fetch_thread(&self, pr: &TrackedPr, since: DateTime<Utc>) -> Result<ThreadActivity> {
        let issue_comments = self.source.list_issue_comments(pr, since)?;
        let review_comments = self.source.list_review_comments(pr, since)?;
        let reviews = self.source.list_reviews(pr)?;

        // GitHub 的 since 按 updated_at 过滤，旧评论被编辑后也会返回，这里按创建时间再筛一次
        let comments = issue_comments
            .into_iter()
            .map(|c| (c, CommentKind::Issue))
            .chain(review_comments.into_iter().map(|c| (c, CommentKind::ReviewThread)))
            .filter(|(c, _)| c.created_at > since)
            .collect();

        // reviews 接口没有 since 参数，只能本地过滤；PENDING review 没有提交时间
        let reviews = reviews
            .into_iter()
            .filter(|r| r.submitted_at.map(|t| t > since).unwrap_or(false))
            .collect();

        Ok(ThreadActivity { comments, reviews })
    }

    fn process_thread(
        &self,
        pr: &TrackedPr,
        activity: ThreadActivity,
        state: &mut DedupState,
        report: &mut CycleReport,
    ) {
        for (comment, kind) in activity.comments {
            let id = comment.id.to_string();
            let login = comment.author_login();

            if self.authors.is_self(login) {
                report.skipped_self += 1;
                continue;
            }
            if state.notified_comments.contains(&id) {
                report.skipped_seen += 1;
                continue;
            }
            if self.authors.is_bot(login, comment.author_is_bot_type()) {
                debug!(pr = %pr, id = %id, author = %login, "Bot comment recorded without notification");
                state.notified_comments.push(id);
                report.absorbed_bots += 1;
                continue;
            }

            let event = ActivityEvent::Comment {
                base: EventBase {
                    source_thread: pr.clone(),
                    author_login: login.to_string(),
                    author_is_bot: false,
                    submitted_at: comment.created_at,
                    body_excerpt: truncate_body(comment.body.as_deref().unwrap_or("")),
                    permalink: comment.html_url.clone(),
                    event_id: id.clone(),
                },
                kind,
            };
            self.deliver(&event, report);
            state.notified_comments.push(id);
        }

        for review in activity.reviews {
            let id = review.id.to_string();
            let login = review.author_login();

            if self.authors.is_self(login) {
                report.skipped_self += 1;
                continue;
            }
            if state.notified_reviews.contains(&id) {
                report.skipped_seen += 1;
                continue;
            }
            if self.authors.is_bot(login, review.author_is_bot_type()) {
                debug!(pr = %pr, id = %id, author = %login, "Bot review recorded without notification");
                state.notified_reviews.push(id);
                report.absorbed_bots += 1;
                continue;
            }

            let Some(submitted_at) = review.submitted_at else {
                continue;
            };
            let event = ActivityEvent::Review {
                base: EventBase {
                    source_thread: pr.clone(),
                    author_login: login.to_string(),
                    author_is_bot: false,
                    submitted_at,
                    body_excerpt: truncate_body(review.body.as_deref().unwrap_or("")),
                    permalink: review.html_url.clone().unwrap_or_default(),
                    event_id: id.clone(),
                },
                state: ReviewState::from_raw(&review.state),
            };
            self.deliver(&event, report);
            state.notified_reviews.push(id);
        }
    }

    /// 发送失败只记日志，调用方仍会记录 id
    fn deliver(&self, event: &ActivityEvent, report: &mut CycleReport) {
        match self.dispatcher.dispatch(event) {
            Ok(SendResult::Failed(reason)) => {
                warn!(event = %event, error = %reason, "Notification failed, event marked as seen");
                report.delivery_failures += 1;
            }
            Ok(SendResult::Skipped(reason)) => {
                debug!(event = %event, reason = %reason, "Notification skipped");
                report.dry_run_skipped += 1;
            }
            Ok(SendResult::Sent) => {
                debug!(event = %event, "Notification dispatched");
                report.dispatched += 1;
            }
            Err(e) => {
                warn!(event = %event, error = %e, "Notification failed, event marked as seen");
                report.delivery_failures += 1;
            }
        }
    }
}
