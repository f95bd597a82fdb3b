//! OpenAI 兼容 Chat Completions 网关
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、DeepSeek、自建代理等。
//! 会话在本地保存请求历史；一轮请求成功后才把本轮消息与助手回复写入历史。
//! 工具定义与工具调用按线上 JSON 与 async_openai 类型互转。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequest,
};
use async_openai::Client;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Map, Value};

use crate::llm::{
    GatewayResponse, LlmError, MessagePart, ModelGateway, ModelSession, SessionConfig,
    ToolCallRequest,
};
use crate::tools::ToolSpec;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 模型请求了但没有被执行的调用（未注册的工具），下一次请求前补一条 tool 消息
const UNANSWERED_CALL: &str = r#"{"error":"Tool call was not executed."}"#;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容网关：持有 Client 与 model 名，create_session 时带上系统指令与工具目录
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    model: String,
    usage: TokenUsage,
}

impl OpenAiGateway {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());
        let base = base_url.unwrap_or(OPENAI_BASE_URL).trim_end_matches('/');

        let config = OpenAIConfig::new()
            .with_api_base(base)
            .with_api_key(api_key);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client: Client::with_config(config).with_http_client(http),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn create_session(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn ModelSession>, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(config.system_instruction.clone())
            .build()?;

        // 请求模板：model 与工具定义在会话内固定，每轮只替换 messages
        let mut template = json!({ "model": self.model, "messages": [] });
        if !config.tools.is_empty() {
            template["tools"] = Value::Array(config.tools.iter().map(tool_definition).collect());
        }
        let template: CreateChatCompletionRequest = serde_json::from_value(template)
            .map_err(|e| LlmError::SessionCreation(e.to_string()))?;

        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(session = %id, model = %self.model, "openai session created");
        Ok(Box::new(OpenAiSession {
            id,
            client: self.client.clone(),
            usage: self.usage.clone(),
            template,
            history: vec![ChatCompletionRequestMessage::System(system)],
            unanswered: Vec::new(),
        }))
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}

/// 单个对话会话：请求历史 + 请求模板 + 上一次助手回复中尚未答复的调用 id
pub struct OpenAiSession {
    id: String,
    client: Client<OpenAIConfig>,
    usage: TokenUsage,
    template: CreateChatCompletionRequest,
    history: Vec<ChatCompletionRequestMessage>,
    unanswered: Vec<String>,
}

#[async_trait]
impl ModelSession for OpenAiSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_turn(&mut self, parts: Vec<MessagePart>) -> Result<GatewayResponse, LlmError> {
        let mut pending = unanswered_replies(&self.unanswered, &parts)?;
        pending.extend(to_request_messages(parts)?);

        let mut request = self.template.clone();
        request.messages = self.history.clone();
        request.messages.extend(pending.iter().cloned());

        let response = self.client.chat().create(request).await?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let raw_calls = serde_json::to_value(message.tool_calls.unwrap_or_default())
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let raw_calls = match raw_calls {
            Value::Array(calls) => calls,
            _ => Vec::new(),
        };
        let calls: Vec<ToolCallRequest> = raw_calls.iter().filter_map(parse_tool_call).collect();
        let text = message.content.filter(|t| !t.is_empty());

        let assistant = assistant_message(text.clone(), &raw_calls)?;

        self.history.extend(pending);
        self.history.push(assistant);
        self.unanswered = calls.iter().map(|c| c.id.clone()).collect();

        Ok(GatewayResponse {
            text,
            pending_calls: calls,
        })
    }
}

/// 为上一轮未被答复的调用补 tool 消息（OpenAI 要求每个 tool_call_id 都有回应）
fn unanswered_replies(
    unanswered: &[String],
    parts: &[MessagePart],
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let answered: Vec<&str> = parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::FunctionResult { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();

    unanswered
        .iter()
        .filter(|id| !answered.contains(&id.as_str()))
        .map(|id| tool_message(id, UNANSWERED_CALL.to_string()))
        .collect()
}

fn tool_message(id: &str, content: String) -> Result<ChatCompletionRequestMessage, LlmError> {
    Ok(ChatCompletionRequestMessage::Tool(
        ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(id)
            .content(content)
            .build()?,
    ))
}

/// 把本轮片段转为请求消息：函数结果各成一条 tool 消息，文本与附件合并为一条 user 消息
fn to_request_messages(
    parts: Vec<MessagePart>,
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let mut messages = Vec::new();
    let mut content = Vec::new();
    for part in parts {
        match part {
            MessagePart::Text { text } => content.push(json!({ "type": "text", "text": text })),
            MessagePart::Binary { bytes, mime_type } => {
                content.push(attachment_part(&bytes, &mime_type))
            }
            MessagePart::FunctionResult { id, payload, .. } => {
                messages.push(tool_message(&id, payload.to_string())?)
            }
        }
    }
    if !content.is_empty() {
        let content: ChatCompletionRequestUserMessageContent =
            serde_json::from_value(Value::Array(content))
                .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?,
        ));
    }
    Ok(messages)
}

/// 图片作为 data URL 发送；其余附件能按 UTF-8 解码则内联文本，否则只给出描述
fn attachment_part(bytes: &[u8], mime_type: &str) -> Value {
    if mime_type.starts_with("image/") {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        return json!({
            "type": "image_url",
            "image_url": { "url": format!("data:{};base64,{}", mime_type, data) },
        });
    }
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => format!("[Attached file ({})]\n{}", mime_type, text),
        Err(_) => format!(
            "[Attached file ({}, {} bytes): binary content not shown]",
            mime_type,
            bytes.len()
        ),
    };
    json!({ "type": "text", "text": text })
}

/// 助手回复写回历史；带工具调用时原样保留调用列表
fn assistant_message(
    text: Option<String>,
    raw_calls: &[Value],
) -> Result<ChatCompletionRequestMessage, LlmError> {
    if raw_calls.is_empty() {
        return Ok(ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(text.unwrap_or_default())
                .build()?,
        ));
    }
    serde_json::from_value(json!({
        "role": "assistant",
        "content": text,
        "tool_calls": raw_calls,
    }))
    .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

/// 无参工具也需要一个空 object schema，部分兼容端点会拒绝缺失的 parameters
fn tool_definition(spec: &ToolSpec) -> Value {
    let parameters = spec
        .parameters
        .clone()
        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": parameters,
        }
    })
}

/// 解析一次函数调用；arguments 不是 JSON object 时退化为空参数
fn parse_tool_call(raw: &Value) -> Option<ToolCallRequest> {
    let id = raw.get("id")?.as_str()?;
    let Some(function) = raw.get("function") else {
        tracing::warn!(call = %raw, "ignoring non-function tool call");
        return None;
    };
    let name = function.get("name")?.as_str()?;
    let raw_args = function
        .get("arguments")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let arguments = if raw_args.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(raw_args) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!(
                    tool = %name,
                    raw = %raw_args,
                    "tool call arguments are not a JSON object, using empty arguments"
                );
                Map::new()
            }
        }
    };
    Some(ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}
