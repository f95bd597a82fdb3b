//! 优雅关闭
//!
//! 统一监听 Ctrl+C / SIGTERM；Web 服务据此停止接收新连接并等待进行中的请求，CLI 据此退出读取循环。
//! 第一次触发的原因被保留，等待方醒来后拿到它用于退出日志。

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// CLI 中输入 /quit
    Command,
}

/// 关闭信号管理器
#[derive(Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭；重复触发时保留第一次的原因
    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(?reason, "initiating graceful shutdown");
        }
        self.token.cancel();
    }

    /// 等待关闭并返回触发原因
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        self.token.cancelled().await;
        self.reason.get().copied().unwrap_or(ShutdownReason::Terminate)
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                manager.shutdown(ShutdownReason::Interrupt);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    manager.shutdown(ShutdownReason::Terminate);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_waiters_receive_first_reason() {
        let manager = Arc::new(ShutdownManager::new());
        let waiter = {
            let m = Arc::clone(&manager);
            tokio::spawn(async move { m.wait_for_shutdown().await })
        };
        manager.shutdown(ShutdownReason::Command);
        manager.shutdown(ShutdownReason::Interrupt);

        assert_eq!(waiter.await.unwrap(), ShutdownReason::Command);
        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Command);
    }

    #[tokio::test]
    async fn test_wait_blocks_until_shutdown() {
        let manager = ShutdownManager::new();
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            manager.wait_for_shutdown(),
        )
        .await;
        assert!(pending.is_err());
    }
}
