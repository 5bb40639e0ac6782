//! 错误类型
//!
//! 库内部统一使用 [`Error`]，CLI 层再包装成 `anyhow::Error`。

use std::path::PathBuf;
use thiserror::Error;

/// 通知器错误
#[derive(Debug, Error)]
pub enum Error {
    /// GitHub 或 Slack 不可达、认证失败、返回非 2xx 或无法解析
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Slack webhook 发送失败
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// 状态文件存在但无法解码
    #[error("corrupt state file {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// 启动前配置不完整
    #[error("configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// 检测周期被关闭信号中断，未提交任何状态
    #[error("detection cycle interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 是否为可恢复的上游错误（跳过本线程/本周期即可）
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_) | Error::Delivery(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::UpstreamUnavailable(format!("request timed out: {}", e))
        } else {
            Error::UpstreamUnavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::UpstreamUnavailable("503".into()).is_transient());
        assert!(Error::Delivery("404".into()).is_transient());
        assert!(!Error::ConfigurationIncomplete("token".into()).is_transient());
        assert!(!Error::Interrupted.is_transient());
    }

    #[test]
    fn test_corrupt_state_message_names_path() {
        let err = Error::CorruptState {
            path: PathBuf::from("/tmp/cache.json"),
            reason: "expected value at line 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cache.json"));
        assert!(msg.contains("expected value"));
    }
}
