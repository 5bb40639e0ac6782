//! 去重状态存储 - 本地 JSON 状态文件
//!
//! 存储位置：`~/.github-pr-notifier/cache.json`
//!
//! ```json
//! {
//!   "version": 2,
//!   "last_checked": "2026-10-19T08:00:00Z",
//!   "notified_comments": ["1789012345"],
//!   "notified_reviews": ["2100000001"],
//!   "first_run": "2026-09-01T00:00:00Z",
//!   "assigned_prs": [{"owner": "acme", "repo": "widgets", "number": 42, "title": "...", "url": "..."}],
//!   "retry_since": {"acme/widgets#42": "2026-10-19T07:55:00Z"}
//! }
//! ```
//!
//! 旧版本文件缺少的字段全部取默认值，不会导致加载失败。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::registry::TrackedPr;

/// 每个 id 集合最多保留的条目数
pub const MAX_NOTIFIED_IDS: usize = 1000;
/// 当前状态文件版本
pub const STATE_VERSION: u32 = 2;

/// 有界 id 集合，按插入顺序淘汰最旧的条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct BoundedIdSet {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl BoundedIdSet {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// 追加 id；已存在时不做任何事（不刷新新旧顺序）
    pub fn push(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.members.contains(&id) {
            return;
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
        self.truncate();
    }

    fn truncate(&mut self) {
        while self.order.len() > MAX_NOTIFIED_IDS {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 从旧到新
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

impl Default for BoundedIdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for BoundedIdSet {
    fn from(ids: Vec<String>) -> Self {
        let mut set = Self::new();
        for id in ids {
            set.push(id);
        }
        set
    }
}

impl From<BoundedIdSet> for Vec<String> {
    fn from(set: BoundedIdSet) -> Self {
        set.order.into_iter().collect()
    }
}

fn current_version() -> u32 {
    STATE_VERSION
}

/// 去重状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupState {
    #[serde(default = "current_version")]
    pub version: u32,
    /// 水位线：只检查此时间之后提交的活动
    #[serde(default = "Utc::now")]
    pub last_checked: DateTime<Utc>,
    #[serde(default)]
    pub notified_comments: BoundedIdSet,
    #[serde(default)]
    pub notified_reviews: BoundedIdSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_run: Option<DateTime<Utc>>,
    /// 最近一次刷新得到的追踪 PR 列表
    #[serde(default)]
    pub assigned_prs: Vec<TrackedPr>,
    /// 上次拉取失败的 PR 仍需从这个时间开始检查
    #[serde(default)]
    pub retry_since: BTreeMap<String, DateTime<Utc>>,
}

impl DedupState {
    /// 首次运行：从当前时间开始，不回放历史
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            version: STATE_VERSION,
            last_checked: now,
            notified_comments: BoundedIdSet::new(),
            notified_reviews: BoundedIdSet::new(),
            first_run: Some(now),
            assigned_prs: Vec::new(),
            retry_since: BTreeMap::new(),
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.last_checked
    }

    pub fn first_run(&self) -> DateTime<Utc> {
        self.first_run.unwrap_or(self.last_checked)
    }

    /// 指定 PR 本周期的检查起点
    pub fn since_for(&self, pr_key: &str) -> DateTime<Utc> {
        self.retry_since
            .get(pr_key)
            .copied()
            .unwrap_or(self.last_checked)
    }

    /// 水位线只前进不后退
    pub fn advance_watermark(&mut self, now: DateTime<Utc>) {
        if now > self.last_checked {
            self.last_checked = now;
        }
    }

    /// 加载后补齐旧文件缺失的字段
    fn normalize(mut self) -> Self {
        if self.first_run.is_none() {
            self.first_run = Some(self.last_checked);
        }
        self.version = STATE_VERSION;
        self
    }
}

/// 状态文件读写
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认路径 `~/.github-pr-notifier/cache.json`
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("cache.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// 读取状态
    ///
    /// 文件不存在时返回以 `now` 为起点的新状态；文件存在但无法解析时返回
    /// [`Error::CorruptState`]。
    pub fn load(&self, now: DateTime<Utc>) -> Result<DedupState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file yet, starting fresh");
            return Ok(DedupState::fresh(now));
        }

        let content = fs::read_to_string(&self.path)?;
        let state: DedupState =
            serde_json::from_str(&content).map_err(|e| Error::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(state.normalize())
    }

    /// 读取状态，损坏或不可读时重置为以 `now` 为起点的新状态（绝不回放全部历史）
    pub fn load_or_reset(&self, now: DateTime<Utc>) -> DedupState {
        match self.load(now) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "State file unusable, reinitialising from current time");
                DedupState::fresh(now)
            }
        }
    }

    /// 原子写入：临时文件 + fsync + rename，期间持有独占锁
    pub fn save(&self, state: &DedupState) -> Result<()> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.write_atomically(state);

        lock.unlock()?;
        result
    }

    fn write_atomically(&self, state: &DedupState) -> Result<()> {
        let temp_path = self.temp_path();
        {
            let mut temp_file = File::create(&temp_path)?;
            temp_file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
            temp_file.flush()?;
            temp_file.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(
            path = %self.path.display(),
            comments = state.notified_comments.len(),
            reviews = state.notified_reviews.len(),
            "State saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_push_ignores_duplicates() {
        let mut set = BoundedIdSet::new();
        set.push("1");
        set.push("2");
        set.push("1");
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_bounded_set_evicts_oldest() {
        let mut set = BoundedIdSet::new();
        for i in 0..(MAX_NOTIFIED_IDS + 5) {
            set.push(i.to_string());
        }
        assert_eq!(set.len(), MAX_NOTIFIED_IDS);
        assert!(!set.contains("0"));
        assert!(!set.contains("4"));
        assert!(set.contains("5"));
        assert!(set.contains(&(MAX_NOTIFIED_IDS + 4).to_string()));
        assert_eq!(set.iter().next().map(String::as_str), Some("5"));
    }

    #[test]
    fn test_oversized_array_is_truncated_on_load() {
        let ids: Vec<String> = (0..1200).map(|i| i.to_string()).collect();
        let set: BoundedIdSet = serde_json::from_value(serde_json::json!(ids)).unwrap();
        assert_eq!(set.len(), MAX_NOTIFIED_IDS);
        assert!(set.contains("1199"));
        assert!(!set.contains("199"));
    }

    #[test]
    fn test_v1_record_without_reviews_loads() {
        let json = r#"{
            "last_checked": "2026-05-01T12:00:00.000Z",
            "notified_comments": ["11", "12"],
            "assigned_prs": []
        }"#;
        let state: DedupState = serde_json::from_str(json).unwrap();
        let state = state.normalize();
        assert_eq!(state.notified_comments.len(), 2);
        assert!(state.notified_reviews.is_empty());
        assert!(state.retry_since.is_empty());
        assert_eq!(state.first_run(), state.last_checked);
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_advance_watermark_is_monotonic() {
        let now = Utc::now();
        let mut state = DedupState::fresh(now);
        state.advance_watermark(now - Duration::seconds(10));
        assert_eq!(state.watermark(), now);
        state.advance_watermark(now + Duration::seconds(10));
        assert_eq!(state.watermark(), now + Duration::seconds(10));
    }

    #[test]
    fn test_since_for_prefers_retry_watermark() {
        let now = Utc::now();
        let mut state = DedupState::fresh(now);
        let older = now - Duration::minutes(5);
        state.retry_since.insert("acme/widgets#42".to_string(), older);
        assert_eq!(state.since_for("acme/widgets#42"), older);
        assert_eq!(state.since_for("acme/widgets#7"), now);
    }
}
