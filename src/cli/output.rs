//! 命令输出格式化

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// 以带缩进的 JSON 打印
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// 本地时区显示，便于人读
pub fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
