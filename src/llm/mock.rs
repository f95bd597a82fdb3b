//! 离线网关（无需 API）
//!
//! - MockGateway：按关键词请求一次对应工具，拿到结果后把结果原样回给用户，便于本地跑通编排流程。
//! - ScriptedGateway：按预设脚本逐轮返回，记录每轮收到的片段与建会话次数，供测试断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{
    GatewayResponse, LlmError, MessagePart, ModelGateway, ModelSession, SessionConfig,
    ToolCallRequest,
};

/// Mock 网关：关键词 → 工具调用；函数结果 → 回显
#[derive(Debug, Default)]
pub struct MockGateway {
    sessions: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn create_session(
        &self,
        _config: &SessionConfig,
    ) -> Result<Box<dyn ModelSession>, LlmError> {
        let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Box::new(MockSession {
            id: format!("mock-{}", n),
            calls: 0,
        }))
    }
}

struct MockSession {
    id: String,
    calls: usize,
}

impl MockSession {
    fn pick_tool(&self, text: &str) -> Option<(&'static str, Value)> {
        let lower = text.to_lowercase();
        if lower.contains("time") {
            Some(("getCurrentTime", json!({})))
        } else if lower.contains("system") {
            Some(("getSystemInfo", json!({})))
        } else if let Some(rest) = lower.strip_prefix("weather in ") {
            Some(("getWeather", json!({ "location": rest.trim() })))
        } else if let Some(rest) = lower.strip_prefix("open ") {
            let target = rest.trim();
            if target.contains('.') {
                Some(("openWebsite", json!({ "url": target })))
            } else {
                Some(("openApplication", json!({ "appName": target })))
            }
        } else {
            None
        }
    }
}

#[async_trait]
impl ModelSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_turn(&mut self, parts: Vec<MessagePart>) -> Result<GatewayResponse, LlmError> {
        let mut results = Vec::new();
        let mut text = None;
        let mut attachments = 0;
        for part in &parts {
            match part {
                MessagePart::FunctionResult { name, payload, .. } => {
                    results.push(format!("{}: {}", name, payload))
                }
                MessagePart::Text { text: t } => text = Some(t.clone()),
                MessagePart::Binary { .. } => attachments += 1,
            }
        }

        if !results.is_empty() {
            return Ok(GatewayResponse::final_text(format!(
                "Mock result -> {}",
                results.join("; ")
            )));
        }

        let text = text.unwrap_or_default();
        if let Some((tool, args)) = self.pick_tool(&text) {
            self.calls += 1;
            let id = format!("{}-call-{}", self.id, self.calls);
            return Ok(GatewayResponse::calls(vec![ToolCallRequest::new(id, tool, args)]));
        }

        Ok(GatewayResponse::final_text(format!(
            "Echo from Mock: {} ({} attachment(s))",
            if text.is_empty() { "(no input)" } else { text.as_str() },
            attachments
        )))
    }
}

/// 脚本中的一步：正常响应或网关错误
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Respond(GatewayResponse),
    Fail(String),
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    received: Vec<Vec<MessagePart>>,
    session_ids: Vec<String>,
    sent_by_session: Vec<String>,
}

/// 脚本网关：所有会话共享同一个步骤队列；队列耗尽时返回空最终回答
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<ScriptState>>,
    fail_create: Arc<Mutex<Option<String>>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedGateway {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let gateway = Self::default();
        gateway.push_steps(steps);
        gateway
    }

    /// 每轮响应前等待一段时间（超时与并发测试用）
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_steps(&self, steps: impl IntoIterator<Item = ScriptStep>) {
        if let Ok(mut state) = self.state.lock() {
            state.steps.extend(steps);
        }
    }

    /// 下一次 create_session 返回错误
    pub fn fail_next_create(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.fail_create.lock() {
            *slot = Some(message.into());
        }
    }

    pub fn sessions_created(&self) -> usize {
        self.state.lock().map(|s| s.session_ids.len()).unwrap_or(0)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.session_ids.clone())
            .unwrap_or_default()
    }

    /// 每轮收到的片段（按时间顺序）
    pub fn received(&self) -> Vec<Vec<MessagePart>> {
        self.state
            .lock()
            .map(|s| s.received.clone())
            .unwrap_or_default()
    }

    /// 每轮由哪个会话发出
    pub fn sent_by_session(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.sent_by_session.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn create_session(
        &self,
        _config: &SessionConfig,
    ) -> Result<Box<dyn ModelSession>, LlmError> {
        if let Some(msg) = self.fail_create.lock().ok().and_then(|mut s| s.take()) {
            return Err(LlmError::SessionCreation(msg));
        }
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(mut state) = self.state.lock() {
            state.session_ids.push(id.clone());
        }
        Ok(Box::new(ScriptedSession {
            id,
            gateway: self.clone(),
        }))
    }
}

struct ScriptedSession {
    id: String,
    gateway: ScriptedGateway,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_turn(&mut self, parts: Vec<MessagePart>) -> Result<GatewayResponse, LlmError> {
        let step = {
            let mut state = self
                .gateway
                .state
                .lock()
                .map_err(|e| LlmError::Transport(e.to_string()))?;
            state.received.push(parts);
            state.sent_by_session.push(self.id.clone());
            state.steps.pop_front()
        };
        if let Some(delay) = self.gateway.delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            Some(ScriptStep::Respond(resp)) => Ok(resp),
            Some(ScriptStep::Fail(msg)) => Err(LlmError::Transport(msg)),
            None => Ok(GatewayResponse::default()),
        }
    }
}
