//! GitHub REST v3 客户端（blocking reqwest）

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{RawComment, RawReview, SearchResponse};
use super::ReviewSource;
use crate::error::{Error, Result};
use crate::registry::TrackedPr;

/// 默认 API 地址
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: &str = "100";
/// 单个列表最多翻页数
const MAX_PAGES: usize = 10;
/// 错误信息里保留的响应体长度
const ERROR_BODY_LIMIT: usize = 200;

/// GitHub 客户端配置
#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitHub REST 客户端
#[derive(Debug)]
pub struct GithubClient {
    client: Client,
    config: GithubClientConfig,
}

impl GithubClient {
    pub fn new(config: GithubClientConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::ConfigurationIncomplete("github.token".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse_with_params(&format!("{}{}", base, path), params)
            .map_err(|e| Error::UpstreamUnavailable(format!("invalid URL {}{}: {}", base, path, e)))
    }

    fn get(&self, url: &Url) -> Result<Response> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, "github-pr-notifier")
            .send()?;

        debug!(
            url = %url,
            status = %response.status(),
            elapsed_ms = start.elapsed().as_millis(),
            "GitHub API request completed"
        );

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let rate_limit = rate_limit_detail(status, response.headers());
        let body = response.text().unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        let message = match rate_limit {
            Some(detail) => format!("GitHub API {} for {}: {}", status, url.path(), detail),
            None => format!("GitHub API {} for {}: {}", status, url.path(), snippet),
        };
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = %status, "GitHub rejected the token or rate limit was hit");
        }
        Err(Error::UpstreamUnavailable(message))
    }

    /// GET 并解析 JSON，同时返回下一页地址
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<(T, Option<Url>)> {
        let response = self.get(url)?;
        let next = next_page_url(response.headers());
        let body = response.text()?;
        let parsed = serde_json::from_str(&body).map_err(|e| {
            Error::UpstreamUnavailable(format!("Failed to parse response from {}: {}", url.path(), e))
        })?;
        Ok((parsed, next))
    }

    /// 按 Link 头依次取完所有页（最多 MAX_PAGES 页）
    fn get_all<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next {
            if pages >= MAX_PAGES {
                warn!(url = %url, max_pages = MAX_PAGES, "Pagination limit reached, remaining pages skipped");
                break;
            }
            let (page, following): (Vec<T>, _) = self.get_json(&url)?;
            items.extend(page);
            next = following;
            pages += 1;
        }

        Ok(items)
    }
}

impl ReviewSource for GithubClient {
    fn search_open_prs(&self, query: &str) -> Result<Vec<TrackedPr>> {
        let mut next = Some(self.endpoint(
            "/search/issues",
            &[("q", query.to_string()), ("per_page", PER_PAGE.to_string())],
        )?);
        let mut prs = Vec::new();
        let mut pages = 0;

        while let Some(url) = next {
            if pages >= MAX_PAGES {
                break;
            }
            let (page, following): (SearchResponse, _) = self.get_json(&url)?;
            if page.incomplete_results {
                warn!(query = %query, "GitHub search returned incomplete results");
            }
            prs.extend(page.items.into_iter().filter_map(|item| {
                let number = item.number;
                let parsed = item.into_tracked();
                if parsed.is_none() {
                    warn!(number, "Skipping search item with unrecognised repository_url");
                }
                parsed
            }));
            next = following;
            pages += 1;
        }

        Ok(prs)
    }

    fn list_issue_comments(&self, pr: &TrackedPr, since: DateTime<Utc>) -> Result<Vec<RawComment>> {
        let url = self.endpoint(
            &format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number),
            &[("since", format_since(since)), ("per_page", PER_PAGE.to_string())],
        )?;
        self.get_all(url)
    }

    fn list_review_comments(&self, pr: &TrackedPr, since: DateTime<Utc>) -> Result<Vec<RawComment>> {
        let url = self.endpoint(
            &format!("/repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number),
            &[("since", format_since(since)), ("per_page", PER_PAGE.to_string())],
        )?;
        self.get_all(url)
    }

    fn list_reviews(&self, pr: &TrackedPr) -> Result<Vec<RawReview>> {
        let url = self.endpoint(
            &format!("/repos/{}/{}/pulls/{}/reviews", pr.owner, pr.repo, pr.number),
            &[("per_page", PER_PAGE.to_string())],
        )?;
        self.get_all(url)
    }
}

fn format_since(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn link_next_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("valid regex"))
}

/// 解析 `Link: <...>; rel="next", <...>; rel="last"`
fn parse_next_link(link: &str) -> Option<Url> {
    let caps = link_next_regex().captures(link)?;
    Url::parse(&caps[1]).ok()
}

fn next_page_url(headers: &HeaderMap) -> Option<Url> {
    headers
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next_link)
}

/// 额度耗尽时给出重置时间
fn rate_limit_detail(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    if !matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) {
        return None;
    }
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?;
    if remaining != "0" {
        return None;
    }
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "unknown".to_string());
    Some(format!("rate limit exhausted, resets at {}", reset))
}
