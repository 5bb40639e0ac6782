//! GitHub 数据源
//!
//! 检测器只依赖 [`ReviewSource`] trait；[`GithubClient`] 是基于 REST v3 的实现，
//! 测试中可以换成内存 mock。

pub mod client;
pub mod types;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::registry::TrackedPr;

pub use client::{GithubClient, GithubClientConfig};
pub use types::{RawComment, RawReview, SearchItem, User};

/// 代码评审平台的数据源
pub trait ReviewSource: Send + Sync {
    /// 按搜索语句查找 open PR（例如 `is:pr is:open assignee:alice`）
    fn search_open_prs(&self, query: &str) -> Result<Vec<TrackedPr>>;

    /// PR 会话区评论（issue comments），`since` 之后更新过的
    fn list_issue_comments(&self, pr: &TrackedPr, since: DateTime<Utc>) -> Result<Vec<RawComment>>;

    /// 代码行评论（review comments），`since` 之后更新过的
    fn list_review_comments(&self, pr: &TrackedPr, since: DateTime<Utc>)
        -> Result<Vec<RawComment>>;

    /// 全部 review（GitHub 不支持 since 过滤）
    fn list_reviews(&self, pr: &TrackedPr) -> Result<Vec<RawReview>>;
}
