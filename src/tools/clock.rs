//! 当前时间工具（getCurrentTime）：无参数，返回本地时区的可读时间，不会失败

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::json;

use crate::tools::{Tool, ToolArgs, ToolError, ToolOutput};

/// 形如 `10/19/2026, 10:04:05 PM`
const TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIME_FORMAT).to_string()
}

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "getCurrentTime"
    }

    fn description(&self) -> &str {
        "Get the current local date and time."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({
            "time": format_timestamp(&Local::now()),
        })))
    }
}
