//! 打开网页工具（openWebsite）
//!
//! 纯函数：不在本机启动浏览器，只返回 OPEN_URL 客户端动作，由调用方（UI）负责打开。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{parameters_schema_for, parse_args};
use crate::tools::{ClientAction, Tool, ToolArgs, ToolError, ToolOutput};

#[derive(Deserialize, JsonSchema)]
struct OpenUrlArgs {
    /// The full URL to open, e.g. https://github.com
    url: String,
}

/// 没有 scheme 的地址补上 https://
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url))
    }
}

pub struct OpenUrlTool;

#[async_trait]
impl Tool for OpenUrlTool {
    fn name(&self) -> &str {
        "openWebsite"
    }

    fn description(&self) -> &str {
        "Open a website in the user's browser. Provide the full URL including https://."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(parameters_schema_for::<OpenUrlArgs>())
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: OpenUrlArgs = parse_args(args)?;
        let url = normalize_url(&args.url)
            .ok_or_else(|| ToolError::InvalidArguments("url must not be empty".to_string()))?;
        Ok(ToolOutput::new(json!({
            "success": true,
            "message": format!("Opening {}", url),
        }))
        .with_action(ClientAction::OpenUrl { url }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> ToolArgs {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://github.com").as_deref(), Some("https://github.com"));
        assert_eq!(normalize_url("HTTP://x.org").as_deref(), Some("HTTP://x.org"));
        assert_eq!(normalize_url(" github.com ").as_deref(), Some("https://github.com"));
        assert_eq!(normalize_url("  "), None);
    }

    #[tokio::test]
    async fn test_returns_open_url_action() {
        let out = OpenUrlTool
            .execute(&args(json!({"url": "https://github.com"})))
            .await
            .unwrap();
        assert_eq!(out.payload["success"], true);
        assert_eq!(
            out.client_action,
            Some(ClientAction::OpenUrl {
                url: "https://github.com".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_url_is_error() {
        assert!(matches!(
            OpenUrlTool.execute(&ToolArgs::new()).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(OpenUrlTool.execute(&args(json!({"url": ""}))).await.is_err());
    }
}
