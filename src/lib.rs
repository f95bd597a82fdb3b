//! Aide - Rust 单用户对话助手后端
//!
//! 模块划分：
//! - **agent**: 无头助手运行时（编排器 + 会话表，供 CLI / HTTP 调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 单轮编排状态机、会话、错误、构建器、优雅关闭
//! - **host**: 主机原语（启动应用、读取主机指标）
//! - **llm**: 模型网关抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 脚本）
//! - **tools**: 工具注册表、执行器与五个内置工具
//! - **web**: HTTP 服务（feature `web`）

pub mod agent;
pub mod config;
pub mod core;
pub mod host;
pub mod llm;
pub mod observability;
pub mod tools;
#[cfg(feature = "web")]
pub mod web;

pub use agent::Assistant;
pub use self::core::{TurnOutcome, TurnSubmission};
