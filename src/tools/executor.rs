//! 工具执行器
//!
//! 持有 ToolRegistry、单次调用超时与并发许可；execute 把一次 ToolCallRequest 解析为 ToolCallResult：
//! 未注册的工具返回 None（由调用方丢弃），工具失败或超时转为 `{error}` 载荷而不是错误；
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::llm::ToolCallRequest;
use crate::tools::{ClientAction, ToolRegistry, ToolSpec};

/// 默认单轮并发执行的工具数
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// 一次工具调用的结果，按请求 id 回填
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub payload: Value,
    pub client_action: Option<ClientAction>,
}

/// 工具执行器：对每次调用施加超时与并发限制，并把失败映射为错误载荷
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// 覆盖单次调用超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.registry.list_specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行一次调用；工具未注册时返回 None
    pub async fn execute(&self, call: &ToolCallRequest) -> Option<ToolCallResult> {
        let Some(tool) = self.registry.resolve(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown tool requested, skipping");
            return None;
        };

        let _permit = self.permits.acquire().await.ok();
        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(&call.arguments)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit, "tool");

        let (payload, client_action) = match result {
            Ok(Ok(output)) => (output.payload, output.client_action),
            Ok(Err(e)) => (json!({ "error": e.to_string() }), None),
            Err(_) => (
                json!({
                    "error": format!("Tool {} timed out after {}s", call.name, self.timeout.as_secs_f64())
                }),
                None,
            ),
        };

        Some(ToolCallResult {
            id: call.id.clone(),
            name: call.name.clone(),
            payload,
            client_action,
        })
    }

    /// 并发执行一轮中的全部调用，结果保持请求顺序，未注册的工具被丢弃
    pub async fn execute_batch(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        join_all(calls.iter().map(|call| self.execute(call)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

fn args_preview(args: &serde_json::Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
