//! GitHub REST 响应结构（只保留用到的字段）

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::registry::TrackedPr;

/// 已删除账号在 GitHub 上显示为 ghost
const GHOST_LOGIN: &str = "ghost";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub login: String,
    /// "User" | "Bot" | "Organization"
    #[serde(rename = "type", default)]
    pub user_type: String,
}

impl User {
    pub fn is_bot_type(&self) -> bool {
        self.user_type.eq_ignore_ascii_case("bot")
    }
}

/// issue comment 与 review comment 共用的字段
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RawComment {
    pub fn author_login(&self) -> &str {
        self.user.as_ref().map(|u| u.login.as_str()).unwrap_or(GHOST_LOGIN)
    }

    pub fn author_is_bot_type(&self) -> bool {
        self.user.as_ref().map(User::is_bot_type).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReview {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub body: Option<String>,
    /// APPROVED / CHANGES_REQUESTED / COMMENTED / DISMISSED / PENDING
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub html_url: Option<String>,
    /// PENDING 状态的 review 没有提交时间
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl RawReview {
    pub fn author_login(&self) -> &str {
        self.user.as_ref().map(|u| u.login.as_str()).unwrap_or(GHOST_LOGIN)
    }

    pub fn author_is_bot_type(&self) -> bool {
        self.user.as_ref().map(User::is_bot_type).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    /// 形如 `https://api.github.com/repos/{owner}/{repo}`
    pub repository_url: String,
}

fn repository_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/repos/([^/]+)/([^/]+?)/?$").expect("valid regex"))
}

/// 从 repository_url 解析 (owner, repo)，兼容 GitHub Enterprise 的 `/api/v3/repos/...`
pub fn parse_repository_url(url: &str) -> Option<(String, String)> {
    let caps = repository_url_regex().captures(url)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

impl SearchItem {
    pub fn into_tracked(self) -> Option<TrackedPr> {
        let (owner, repo) = parse_repository_url(&self.repository_url)?;
        Some(TrackedPr {
            owner,
            repo,
            number: self.number,
            title: self.title,
            url: self.html_url,
        })
    }
}
