//! 打开应用工具（openApplication）：通过主机 AppLauncher 按名称启动本机应用
//!
//! 启动失败转为带应用名的错误消息，从不向上抛出。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::host::AppLauncher;
use crate::tools::schema::{parameters_schema_for, parse_args};
use crate::tools::{Tool, ToolArgs, ToolError, ToolOutput};

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct OpenApplicationArgs {
    /// Name of the application, e.g. "Calculator" or "Spotify"
    app_name: String,
}

pub struct OpenApplicationTool {
    launcher: Arc<dyn AppLauncher>,
}

impl OpenApplicationTool {
    pub fn new(launcher: Arc<dyn AppLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl Tool for OpenApplicationTool {
    fn name(&self) -> &str {
        "openApplication"
    }

    fn description(&self) -> &str {
        "Open an application installed on this computer by its name."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(parameters_schema_for::<OpenApplicationArgs>())
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: OpenApplicationArgs = parse_args(args)?;
        let app = args.app_name.trim();
        match self.launcher.launch(app).await {
            Ok(()) => Ok(ToolOutput::new(json!({
                "success": true,
                "message": format!("Opened {}.", app),
            }))),
            Err(reason) => {
                tracing::warn!(app = %app, reason = %reason, "open application failed");
                Err(ToolError::Failed(format!("Failed to open {}: {}", app, reason)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AppLauncher for RecordingLauncher {
        async fn launch(&self, app_name: &str) -> Result<(), String> {
            self.launched.lock().unwrap().push(app_name.to_string());
            if self.fail {
                Err("not installed".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn app(name: &str) -> ToolArgs {
        json!({ "appName": name }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_launches_named_app() {
        let launcher = Arc::new(RecordingLauncher::default());
        let tool = OpenApplicationTool::new(launcher.clone());
        let out = tool.execute(&app("Calculator")).await.unwrap();
        assert_eq!(out.payload["success"], true);
        assert_eq!(*launcher.launched.lock().unwrap(), vec!["Calculator"]);
    }

    #[tokio::test]
    async fn test_failure_names_the_app() {
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..Default::default()
        });
        let tool = OpenApplicationTool::new(launcher);
        let err = tool.execute(&app("Spotify")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to open Spotify: not installed");
    }

    #[test]
    fn test_schema_uses_camel_case_name() {
        let schema = OpenApplicationTool::new(Arc::new(RecordingLauncher::default()))
            .parameters_schema()
            .unwrap();
        assert!(schema["properties"].get("appName").is_some());
    }
}
