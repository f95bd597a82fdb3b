//! 核心编排层：错误、状态机阶段、会话、单轮编排器、构建器、优雅关闭

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod shutdown;
pub mod state;

pub use builder::{create_gateway_from_config, AssistantBuilder};
pub use error::{AgentError, FailureKind};
pub use orchestrator::{
    Attachment, TurnFailure, TurnLimits, TurnOrchestrator, TurnOutcome, TurnSubmission,
};
pub use session::{SessionSlot, SessionStore, DEFAULT_SESSION_KEY};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::TurnPhase;
