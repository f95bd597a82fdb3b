//! Aide 命令行入口
//!
//! 每行输入是一轮对话；`/reset` 丢弃会话，`/quit` 退出。客户端动作（OPEN_URL）打印到终端。

use std::path::PathBuf;
use std::sync::Arc;

use aide::core::{ShutdownManager, ShutdownReason};
use aide::tools::ClientAction;
use aide::{observability, Assistant, TurnSubmission};
use anyhow::Context;
use futures_util::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 可选：第一个参数为额外配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let assistant = Assistant::from_config(config_path).context("Failed to create assistant")?;

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Aide ready. Type a message, /reset to start over, /quit to exit.\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            tracing::info!("stdin closed");
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => {
                shutdown.shutdown(ShutdownReason::Command);
                break;
            }
            "/reset" => {
                assistant.reset(None).await;
                stdout.write_all(b"(session reset)\n").await?;
                continue;
            }
            _ => {}
        }

        // 进行中的一轮随关闭信号放弃，不等模型超时
        let Some(outcome) = assistant
            .submit_until_shutdown(None, TurnSubmission::text(input), &shutdown)
            .await
        else {
            break;
        };
        let mut out = String::new();
        match &outcome.reply {
            Some(reply) => out.push_str(reply),
            None => out.push_str("(no reply)"),
        }
        out.push('\n');
        if let Some(ClientAction::OpenUrl { url }) = &outcome.action {
            out.push_str(&format!("[OPEN_URL] {}\n", url));
        }
        stdout.write_all(out.as_bytes()).await?;
    }

    let reason = shutdown.wait_for_shutdown().now_or_never();
    tracing::info!(?reason, "Aide exiting");
    Ok(())
}
