//! 网关消息模型：发给模型的片段（MessagePart）、模型返回（GatewayResponse）、会话配置
//!
//! 与具体后端无关；OpenAI 兼容实现在 openai.rs 中把它们转成线上格式。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolSpec;

/// 模型请求的一次函数调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// 网关分配的调用 id，回填到结果上用于对应
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 一轮对话的组成片段：文本 / 二进制附件 / 函数结果
#[derive(Clone, Debug, PartialEq)]
pub enum MessagePart {
    Text {
        text: String,
    },
    Binary {
        bytes: Vec<u8>,
        mime_type: String,
    },
    FunctionResult {
        id: String,
        name: String,
        payload: Value,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn binary(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Binary {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// 网关一次往返的结果：pending_calls 非空表示模型要求执行函数，否则 text 为最终回答
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatewayResponse {
    pub text: Option<String>,
    pub pending_calls: Vec<ToolCallRequest>,
}

impl GatewayResponse {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            pending_calls: Vec::new(),
        }
    }

    pub fn calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: None,
            pending_calls: calls,
        }
    }

    pub fn is_final(&self) -> bool {
        self.pending_calls.is_empty()
    }
}

/// 创建会话时交给网关的配置：系统指令 + 工具目录
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub system_instruction: String,
    pub tools: Vec<ToolSpec>,
}
