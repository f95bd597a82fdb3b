//! 单轮对话的错误类型
//!
//! 工具失败、未知工具、空回答都不是错误（在工具层或编排器内就地处理）；
//! 这里只有会让本轮进入 Failed 并丢弃会话的错误。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// 让本轮失败的错误：网关、轮数上限、超时、配置
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Gateway(#[from] LlmError),

    #[error("exceeded the maximum of {0} tool rounds")]
    RoundLimitExceeded(usize),

    #[error("turn timed out after {}s", .0.as_secs_f64())]
    TurnTimeout(Duration),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 失败类别（与回复文本分开的错误通道）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Gateway,
    RoundLimit,
    Timeout,
    Config,
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::Gateway(_) => FailureKind::Gateway,
            AgentError::RoundLimitExceeded(_) => FailureKind::RoundLimit,
            AgentError::TurnTimeout(_) => FailureKind::Timeout,
            AgentError::ConfigError(_) => FailureKind::Config,
        }
    }

    /// 给用户看的道歉文本，包含底层错误信息
    pub fn user_reply(&self) -> String {
        match self {
            AgentError::RoundLimitExceeded(_) | AgentError::TurnTimeout(_) => {
                format!("Sorry, I couldn't finish that request: {}.", self)
            }
            _ => format!("Sorry, something went wrong: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_reply_includes_cause() {
        let err = AgentError::from(LlmError::Transport("connection reset".to_string()));
        assert_eq!(err.kind(), FailureKind::Gateway);
        let reply = err.user_reply();
        assert!(reply.starts_with("Sorry"));
        assert!(reply.contains("connection reset"));
    }

    #[test]
    fn test_limit_replies() {
        assert_eq!(
            AgentError::RoundLimitExceeded(8).user_reply(),
            "Sorry, I couldn't finish that request: exceeded the maximum of 8 tool rounds."
        );
        let timeout = AgentError::TurnTimeout(Duration::from_millis(1500));
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert!(timeout.user_reply().contains("1.5s"));
    }
}
