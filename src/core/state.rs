//! 单轮对话的状态机阶段
//!
//! NoSession -> AwaitingModel <-> ResolvingTools -> Answered | Failed；编排器在每次迁移时以 debug 级别记录。

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    NoSession,
    AwaitingModel,
    ResolvingTools,
    Answered,
    Failed,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::NoSession => "no_session",
            TurnPhase::AwaitingModel => "awaiting_model",
            TurnPhase::ResolvingTools => "resolving_tools",
            TurnPhase::Answered => "answered",
            TurnPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnPhase::Answered | TurnPhase::Failed)
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
