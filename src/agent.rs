//! Headless 助手运行时
//!
//! 供 CLI 与 HTTP 前端共用：一个编排器 + 按会话 key 管理的会话表。

use std::path::PathBuf;

use crate::config::{load_config, AppConfig};
use crate::core::{
    AgentError, AssistantBuilder, SessionStore, ShutdownManager, TurnOrchestrator, TurnOutcome,
    TurnSubmission, DEFAULT_SESSION_KEY,
};
use crate::tools::ToolSpec;

/// 助手：持有编排器与会话表，可在多个请求间共享（`Arc<Assistant>`）
pub struct Assistant {
    orchestrator: TurnOrchestrator,
    sessions: SessionStore,
}

impl Assistant {
    pub fn new(orchestrator: TurnOrchestrator) -> Self {
        Self {
            orchestrator,
            sessions: SessionStore::new(),
        }
    }

    /// 读取配置（可选额外文件）并按配置构建
    pub fn from_config(path: Option<PathBuf>) -> Result<Self, AgentError> {
        let cfg = load_config(path).map_err(|e| AgentError::ConfigError(e.to_string()))?;
        Ok(Self::with_config(cfg))
    }

    pub fn with_config(cfg: AppConfig) -> Self {
        Self::new(AssistantBuilder::new(cfg).build())
    }

    /// 提交一轮；session_key 为空时使用默认会话
    pub async fn submit(&self, session_key: Option<&str>, submission: TurnSubmission) -> TurnOutcome {
        let slot = self.sessions.slot(session_key).await;
        self.orchestrator.run_turn(&slot, submission).await
    }

    /// 提交一轮，但关闭信号到来时立即放弃并返回 None
    pub async fn submit_until_shutdown(
        &self,
        session_key: Option<&str>,
        submission: TurnSubmission,
        shutdown: &ShutdownManager,
    ) -> Option<TurnOutcome> {
        tokio::select! {
            reason = shutdown.wait_for_shutdown() => {
                tracing::info!(?reason, "turn abandoned on shutdown");
                None
            }
            outcome = self.submit(session_key, submission) => Some(outcome),
        }
    }

    /// 丢弃会话，下一轮重新建会话；返回之前是否存在会话
    pub async fn reset(&self, session_key: Option<&str>) -> bool {
        let existed = self.sessions.reset(session_key).await;
        tracing::info!(
            session = session_key.unwrap_or(DEFAULT_SESSION_KEY),
            existed,
            "session reset"
        );
        existed
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.orchestrator.executor().list_specs()
    }

    pub fn orchestrator(&self) -> &TurnOrchestrator {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::ShutdownReason;
    use crate::llm::{GatewayResponse, ScriptStep, ScriptedGateway};
    use std::time::Duration;

    fn assistant(gateway: &ScriptedGateway) -> Assistant {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        Assistant::new(
            AssistantBuilder::new(cfg)
                .with_gateway(Arc::new(gateway.clone()))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_by_key() {
        let gateway = ScriptedGateway::new(vec![
            ScriptStep::Respond(GatewayResponse::final_text("a")),
            ScriptStep::Respond(GatewayResponse::final_text("b")),
            ScriptStep::Respond(GatewayResponse::final_text("c")),
        ]);
        let assistant = assistant(&gateway);

        assistant.submit(None, TurnSubmission::text("hi")).await;
        assistant.submit(Some("alice"), TurnSubmission::text("hi")).await;
        assistant.submit(Some("default"), TurnSubmission::text("again")).await;

        assert_eq!(gateway.sessions_created(), 2);
        assert_eq!(assistant.sessions().len().await, 2);
    }

    #[tokio::test]
    async fn test_reset_forces_new_session() {
        let gateway = ScriptedGateway::new(vec![
            ScriptStep::Respond(GatewayResponse::final_text("one")),
            ScriptStep::Respond(GatewayResponse::final_text("two")),
        ]);
        let assistant = assistant(&gateway);

        assert!(!assistant.reset(None).await);
        assistant.submit(None, TurnSubmission::text("hi")).await;
        assert!(assistant.reset(None).await);
        let outcome = assistant.submit(None, TurnSubmission::text("hi")).await;

        assert_eq!(outcome.reply.as_deref(), Some("two"));
        assert_eq!(gateway.sessions_created(), 2);
        assert_eq!(assistant.tool_specs().len(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_turn_in_flight() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::Respond(GatewayResponse::final_text(
            "too late",
        ))])
        .with_delay(Duration::from_secs(60));
        let assistant = assistant(&gateway);
        let shutdown = Arc::new(ShutdownManager::new());

        let trigger = Arc::clone(&shutdown);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.shutdown(ShutdownReason::Interrupt);
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            assistant.submit_until_shutdown(None, TurnSubmission::text("hi"), &shutdown),
        )
        .await
        .expect("turn should be abandoned promptly");
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_turn_completes_without_shutdown() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::Respond(GatewayResponse::final_text(
            "done",
        ))]);
        let assistant = assistant(&gateway);
        let shutdown = ShutdownManager::new();

        let outcome = assistant
            .submit_until_shutdown(None, TurnSubmission::text("hi"), &shutdown)
            .await;
        assert_eq!(outcome.and_then(|o| o.reply).as_deref(), Some("done"));
    }
}
