//! 单轮对话编排器：多轮工具调用状态机
//!
//! NoSession -> AwaitingModel -> ResolvingTools -> AwaitingModel -> … -> Answered | Failed
//!
//! - 会话不存在时先创建（在会话锁内，整轮独占）
//! - 把附件（在前）与文本（在后）发给网关；空提交原样转发
//! - 网关要求函数调用时并发执行，按请求顺序回传结果；整轮内最后一个客户端动作生效
//! - 一轮调用全部无法解析时提前结束，用网关最后给出的文本作为回复
//! - 网关错误、轮数超限、整轮超时都进入 Failed：丢弃会话，回复道歉文本且不带客户端动作

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;

use crate::core::session::{SessionHandle, SessionSlot};
use crate::core::{AgentError, FailureKind, TurnPhase};
use crate::llm::{MessagePart, ModelGateway, SessionConfig};
use crate::tools::{ClientAction, ToolExecutor};

/// 默认工具轮数上限
pub const DEFAULT_MAX_ROUNDS: usize = 8;
/// 默认整轮超时
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

/// 单轮限制：工具轮数上限与整轮超时
#[derive(Debug, Clone, Copy)]
pub struct TurnLimits {
    pub max_rounds: usize,
    pub turn_timeout: Duration,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }
}

/// 二进制附件
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 一次用户提交：可选附件 + 可选文本
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSubmission {
    pub attachment: Option<Attachment>,
    pub text: Option<String>,
}

impl TurnSubmission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            attachment: None,
            text: Some(text.into()),
        }
    }

    pub fn with_attachment(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.attachment = Some(Attachment {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    /// 附件在前、文本在后；两者都没有时为空列表
    pub fn into_parts(self) -> Vec<MessagePart> {
        let mut parts = Vec::with_capacity(2);
        if let Some(a) = self.attachment {
            parts.push(MessagePart::binary(a.bytes, a.mime_type));
        }
        if let Some(text) = self.text {
            parts.push(MessagePart::text(text));
        }
        parts
    }
}

/// 失败通道：类别 + 底层错误消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// 一轮的结果：回复、客户端动作，以及与回复文本分开的失败信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub reply: Option<String>,
    pub action: Option<ClientAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnFailure>,
}

impl TurnOutcome {
    pub fn answered(reply: Option<String>, action: Option<ClientAction>) -> Self {
        // 没有回复文本时也不带动作
        let reply = reply.filter(|r| !r.is_empty());
        let action = if reply.is_some() { action } else { None };
        Self {
            reply,
            action,
            error: None,
        }
    }

    pub fn failed(err: &AgentError) -> Self {
        Self {
            reply: Some(err.user_reply()),
            action: None,
            error: Some(TurnFailure {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// 成功结束时的回复与动作（尚未做空文本归一化）
struct Answer {
    reply: Option<String>,
    action: Option<ClientAction>,
}

fn transition(from: TurnPhase, to: TurnPhase, round: usize) {
    if to.is_terminal() {
        tracing::info!(from = %from, to = %to, round, "turn finished");
    } else {
        tracing::debug!(from = %from, to = %to, round, "turn transition");
    }
}

/// 编排器：网关 + 工具执行器 + 会话配置 + 限制；会话状态由调用方注入
pub struct TurnOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    executor: Arc<ToolExecutor>,
    session_config: SessionConfig,
    limits: TurnLimits,
}

impl TurnOrchestrator {
    /// 会话配置由系统指令与执行器的工具目录组成
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        executor: Arc<ToolExecutor>,
        system_instruction: impl Into<String>,
    ) -> Self {
        let session_config = SessionConfig {
            system_instruction: system_instruction.into(),
            tools: executor.list_specs(),
        };
        Self {
            gateway,
            executor,
            session_config,
            limits: TurnLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: TurnLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> TurnLimits {
        self.limits
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// 驱动一轮对话；总是返回结构完整的 TurnOutcome，失败时会话已被丢弃
    pub async fn run_turn(&self, slot: &SessionSlot, submission: TurnSubmission) -> TurnOutcome {
        let mut session = slot.lock().await;

        let result = match timeout(
            self.limits.turn_timeout,
            self.drive(&mut session, submission),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(AgentError::TurnTimeout(self.limits.turn_timeout)),
        };

        match result {
            Ok(answer) => TurnOutcome::answered(answer.reply, answer.action),
            Err(e) => {
                let dropped = session.take().map(|s| s.id().to_string());
                tracing::warn!(
                    error = %e,
                    kind = ?e.kind(),
                    session = dropped.as_deref().unwrap_or("-"),
                    "turn failed, session discarded"
                );
                TurnOutcome::failed(&e)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut SessionHandle,
        submission: TurnSubmission,
    ) -> Result<Answer, AgentError> {
        if session.is_none() {
            let created = self.gateway.create_session(&self.session_config).await?;
            tracing::info!(session = %created.id(), tools = self.session_config.tools.len(), "session created");
            transition(TurnPhase::NoSession, TurnPhase::AwaitingModel, 0);
            *session = Some(created);
        }
        let Some(session) = session.as_mut() else {
            return Err(AgentError::ConfigError("session unavailable".to_string()));
        };

        let mut parts = submission.into_parts();
        let mut action: Option<ClientAction> = None;
        let mut rounds = 0;

        loop {
            let response = session.send_turn(parts).await?;

            if response.is_final() {
                transition(TurnPhase::AwaitingModel, TurnPhase::Answered, rounds);
                return Ok(Answer {
                    reply: response.text,
                    action,
                });
            }

            if rounds >= self.limits.max_rounds {
                transition(TurnPhase::AwaitingModel, TurnPhase::Failed, rounds);
                return Err(AgentError::RoundLimitExceeded(self.limits.max_rounds));
            }
            rounds += 1;
            transition(TurnPhase::AwaitingModel, TurnPhase::ResolvingTools, rounds);
            tracing::debug!(
                session = %session.id(),
                calls = ?response.pending_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "resolving tool calls"
            );

            let results = self.executor.execute_batch(&response.pending_calls).await;
            for result in &results {
                if let Some(a) = &result.client_action {
                    action = Some(a.clone());
                }
            }

            if results.is_empty() {
                // 本轮调用全部无法解析：用网关最后给出的文本结束
                transition(TurnPhase::ResolvingTools, TurnPhase::Answered, rounds);
                return Ok(Answer {
                    reply: response.text,
                    action,
                });
            }

            parts = results
                .into_iter()
                .map(|r| MessagePart::FunctionResult {
                    id: r.id,
                    name: r.name,
                    payload: r.payload,
                })
                .collect();
            transition(TurnPhase::ResolvingTools, TurnPhase::AwaitingModel, rounds);
        }
    }
}
