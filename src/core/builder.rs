//! 助手构建器：统一的初始化逻辑
//!
//! CLI 与 Web 共用：按配置选择网关、注册固定的五个工具、组装执行器与编排器。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{TurnLimits, TurnOrchestrator};
use crate::host::{AppLauncher, SystemHost, SystemProbe};
use crate::llm::{
    create_deepseek_gateway, MockGateway, ModelGateway, OpenAiGateway, OPENAI_DEFAULT_MODEL,
};
use crate::tools::{
    CurrentTimeTool, OpenApplicationTool, OpenUrlTool, SystemInfoTool, ToolExecutor,
    ToolRegistry, WeatherTool,
};

/// 根据配置与环境变量选择网关（OpenAI 兼容 / DeepSeek / Mock）；没有 API Key 时回退 Mock
pub fn create_gateway_from_config(cfg: &AppConfig) -> Arc<dyn ModelGateway> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    let env_key = |name: &str| std::env::var(name).ok().filter(|k| !k.is_empty());
    let timeout = cfg.llm.request_timeout_secs;

    match provider.as_str() {
        "deepseek" => {
            let has_key = cfg.llm.api_key.is_some()
                || env_key("DEEPSEEK_API_KEY").is_some()
                || env_key("OPENAI_API_KEY").is_some();
            if !has_key {
                tracing::warn!("provider deepseek but no API key set, using Mock gateway");
                return Arc::new(MockGateway::new());
            }
            let gateway = create_deepseek_gateway(
                cfg.llm.model.as_deref(),
                cfg.llm.api_key.as_deref(),
                timeout,
            );
            tracing::info!("Using DeepSeek gateway ({})", gateway.model());
            Arc::new(gateway)
        }
        "openai" => {
            let key = cfg.llm.api_key.clone().or_else(|| env_key("OPENAI_API_KEY"));
            let Some(key) = key else {
                tracing::warn!("No API key set, using Mock gateway");
                return Arc::new(MockGateway::new());
            };
            let model = cfg.llm.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI-compatible gateway ({})", model);
            Arc::new(OpenAiGateway::new(
                cfg.llm.base_url.as_deref(),
                model,
                Some(key.as_str()),
                timeout,
            ))
        }
        "mock" => Arc::new(MockGateway::new()),
        other => {
            tracing::warn!(provider = %other, "unknown provider, using Mock gateway");
            Arc::new(MockGateway::new())
        }
    }
}

/// 助手构建器：可替换网关与主机原语（测试注入桩实现）
pub struct AssistantBuilder {
    config: AppConfig,
    gateway: Option<Arc<dyn ModelGateway>>,
    launcher: Arc<dyn AppLauncher>,
    probe: Arc<dyn SystemProbe>,
}

impl AssistantBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            gateway: None,
            launcher: Arc::new(SystemHost::new()),
            probe: Arc::new(SystemHost::new()),
        }
    }

    /// 使用指定网关，而不是按配置创建
    pub fn with_gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn AppLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// 构建固定工具目录（注册顺序即公布给模型的顺序）
    pub fn build_tool_registry(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(CurrentTimeTool);
        tools.register(WeatherTool::new(
            &self.config.tools.weather.base_url,
            self.config.tools.weather.timeout_secs,
        ));
        tools.register(OpenUrlTool);
        tools.register(OpenApplicationTool::new(Arc::clone(&self.launcher)));
        tools.register(SystemInfoTool::new(Arc::clone(&self.probe)));
        tools
    }

    pub fn build_executor(&self) -> ToolExecutor {
        ToolExecutor::new(self.build_tool_registry(), self.config.tools.tool_timeout_secs)
            .with_max_concurrent(self.config.tools.max_concurrent)
    }

    pub fn build(self) -> TurnOrchestrator {
        let gateway = self
            .gateway
            .clone()
            .unwrap_or_else(|| create_gateway_from_config(&self.config));
        let executor = Arc::new(self.build_executor());
        let limits = TurnLimits {
            max_rounds: self.config.orchestrator.max_rounds,
            turn_timeout: std::time::Duration::from_secs(self.config.orchestrator.turn_timeout_secs),
        };
        TurnOrchestrator::new(gateway, executor, self.config.app.resolve_system_prompt())
            .with_limits(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_fixed_catalog_in_order() {
        let registry = AssistantBuilder::new(AppConfig::default()).build_tool_registry();
        assert_eq!(
            registry.tool_names(),
            vec![
                "getCurrentTime",
                "getWeather",
                "openWebsite",
                "openApplication",
                "getSystemInfo"
            ]
        );
    }

    #[test]
    fn test_build_applies_config_limits() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.orchestrator.max_rounds = 3;
        cfg.orchestrator.turn_timeout_secs = 9;
        let orchestrator = AssistantBuilder::new(cfg).build();
        assert_eq!(orchestrator.limits().max_rounds, 3);
        assert_eq!(orchestrator.limits().turn_timeout.as_secs(), 9);
        assert_eq!(orchestrator.session_config().tools.len(), 5);
        assert!(orchestrator
            .session_config()
            .system_instruction
            .contains("Aide"));
    }
}
