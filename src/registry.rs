//! 追踪 PR 列表 - 分配给我 ∪ 我创建的 open PR
//!
//! 每次刷新整体替换列表；刷新失败时保留旧列表（宁可陈旧，不可为空）。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

use crate::error::Result;
use crate::github::ReviewSource;

/// 被追踪的 PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPr {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    /// PR 页面地址
    #[serde(default)]
    pub url: String,
}

impl TrackedPr {
    /// 唯一标识 `owner/repo#number`
    pub fn key(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }

    fn identity(&self) -> (&str, &str, u64) {
        (&self.owner, &self.repo, self.number)
    }
}

impl fmt::Display for TrackedPr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// 按 (owner, repo, number) 去重，保留首次出现
pub fn dedup_prs(prs: impl IntoIterator<Item = TrackedPr>) -> Vec<TrackedPr> {
    let mut seen: HashSet<(String, String, u64)> = HashSet::new();
    let mut unique = Vec::new();
    for pr in prs {
        let (owner, repo, number) = pr.identity();
        if seen.insert((owner.to_string(), repo.to_string(), number)) {
            unique.push(pr);
        }
    }
    unique
}

/// PR 注册表（缓存 + 刷新）
#[derive(Debug, Default)]
pub struct PrRegistry {
    prs: Vec<TrackedPr>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl PrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用状态文件里缓存的列表初始化（尚未在本进程内刷新过）
    pub fn from_cached(prs: Vec<TrackedPr>) -> Self {
        Self {
            prs,
            last_refreshed: None,
        }
    }

    pub fn prs(&self) -> &[TrackedPr] {
        &self.prs
    }

    pub fn is_empty(&self) -> bool {
        self.prs.is_empty()
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// 距离上次刷新是否已超过 `interval`（本进程内从未刷新过也算）
    pub fn needs_refresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_refreshed {
            Some(at) => now - at >= interval,
            None => true,
        }
    }

    /// 重新查询分配给 `username` 以及由 `username` 创建的 open PR
    ///
    /// 失败时缓存保持不变，错误交给调用方记录。
    pub fn refresh(
        &mut self,
        source: &dyn ReviewSource,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<&[TrackedPr]> {
        let assigned = source
            .search_open_prs(&format!("is:pr is:open assignee:{}", username))
            .map_err(|e| {
                warn!(error = %e, kept = self.prs.len(), "Assigned PR search failed, keeping cached list");
                e
            })?;
        let authored = source
            .search_open_prs(&format!("is:pr is:open author:{}", username))
            .map_err(|e| {
                warn!(error = %e, kept = self.prs.len(), "Authored PR search failed, keeping cached list");
                e
            })?;

        let assigned_count = assigned.len();
        let authored_count = authored.len();
        self.prs = dedup_prs(assigned.into_iter().chain(authored));
        self.last_refreshed = Some(now);

        info!(
            assigned = assigned_count,
            authored = authored_count,
            tracked = self.prs.len(),
            "Tracked PR list refreshed"
        );
        Ok(&self.prs)
    }
}
