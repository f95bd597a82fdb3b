//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AIDE__*` 覆盖（双下划线表示嵌套，如 `AIDE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub orchestrator: OrchestratorSection,
    pub web: WebSection,
}

/// [app] 段：应用名与系统提示词
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 内联系统提示词；设置了 system_prompt_path 且文件可读时以文件为准
    pub system_prompt: String,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Aide".to_string(),
            system_prompt: default_system_prompt(),
            system_prompt_path: None,
        }
    }
}

fn default_system_prompt() -> String {
    "You are Aide, a friendly desktop assistant. Answer concisely. \
     Use the available functions to tell the time, look up the weather, \
     open websites or applications, and report system information when the user asks."
        .to_string()
}

impl AppSection {
    /// 解析最终系统提示词：文件优先，读取失败回退到内联值
    pub fn resolve_system_prompt(&self) -> String {
        self.system_prompt_path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.system_prompt.clone())
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；未配置 API Key 时回退 mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 一般留空，用 OPENAI_API_KEY / DEEPSEEK_API_KEY 环境变量
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

/// [tools] 段：单次工具超时、单轮并发上限、天气服务
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 同一轮内并发执行的工具数上限
    pub max_concurrent: usize,
    pub weather: WeatherSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_concurrent: 4,
            weather: WeatherSection::default(),
        }
    }
}

/// [tools.weather] 段：wttr.in 兼容的 JSON 接口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: "https://wttr.in".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [orchestrator] 段：单轮对话的工具轮数上限与整体超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_rounds: usize,
    pub turn_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            turn_timeout_secs: 120,
        }
    }
}

/// [web] 段：监听端口、静态目录、上传大小
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// 从 config 目录加载配置，环境变量 AIDE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AIDE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AIDE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.max_rounds, 8);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.tools.weather.base_url, "https://wttr.in");
        assert!(cfg.app.system_prompt.contains("Aide"));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[orchestrator]\nmax_rounds = 3\n\n[llm]\nprovider = \"mock\"\n\n[tools.weather]\nbase_url = \"http://127.0.0.1:9\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.orchestrator.max_rounds, 3);
        // 未出现在文件里的键保持默认
        assert_eq!(cfg.orchestrator.turn_timeout_secs, 120);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.tools.weather.base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_system_prompt_file_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "You are a test assistant.").unwrap();
        let section = AppSection {
            system_prompt_path: Some(file.path().to_path_buf()),
            ..AppSection::default()
        };
        assert_eq!(section.resolve_system_prompt(), "You are a test assistant.");

        let missing = AppSection {
            system_prompt_path: Some(PathBuf::from("/nonexistent/prompt.md")),
            ..AppSection::default()
        };
        assert_eq!(missing.resolve_system_prompt(), default_system_prompt());
    }
}
