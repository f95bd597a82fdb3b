//! 模型网关层：抽象与实现（OpenAI 兼容 / DeepSeek / Mock / Scripted）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_deepseek_gateway, DEEPSEEK_CHAT};
pub use message::{GatewayResponse, MessagePart, SessionConfig, ToolCallRequest};
pub use mock::{MockGateway, ScriptStep, ScriptedGateway};
pub use openai::{OpenAiGateway, TokenUsage, OPENAI_DEFAULT_MODEL};
pub use traits::{LlmError, ModelGateway, ModelSession};
