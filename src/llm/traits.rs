//! 模型网关抽象
//!
//! 编排器只依赖这两个 trait：ModelGateway 负责建会话，ModelSession 持有历史并完成一次往返。
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock / Scripted）实现它们。

use async_openai::error::OpenAIError;
use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{GatewayResponse, MessagePart, SessionConfig};

/// 网关错误：网络、HTTP 状态、响应格式
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("session creation failed: {0}")]
    SessionCreation(String),
}

impl From<OpenAIError> for LlmError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::ApiError(api) => LlmError::Api(api.message),
            OpenAIError::Reqwest(e) => LlmError::Transport(e.to_string()),
            other => LlmError::InvalidResponse(other.to_string()),
        }
    }
}

/// 模型网关：按配置创建有状态会话
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn create_session(&self, config: &SessionConfig)
        -> Result<Box<dyn ModelSession>, LlmError>;

    /// 累计 token 使用：(prompt, completion, total)；默认 (0, 0, 0)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 有状态会话：历史由会话自身持有，调用方只传本轮片段
#[async_trait]
pub trait ModelSession: Send {
    /// 会话句柄 id（日志与测试用）
    fn id(&self) -> &str;

    async fn send_turn(&mut self, parts: Vec<MessagePart>) -> Result<GatewayResponse, LlmError>;
}
