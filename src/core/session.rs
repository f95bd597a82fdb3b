//! 会话状态：显式持有、注入编排器的对话句柄
//!
//! SessionSlot 保存至多一个网关会话，并用异步互斥锁把整轮对话串行化（建会话也在锁内，避免并发建出两份历史）。
//! SessionStore 按会话 key 管理多个 SessionSlot；不指定 key 的调用方共用 "default"。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::llm::ModelSession;

/// 未指定会话 key 时使用的默认会话
pub const DEFAULT_SESSION_KEY: &str = "default";

/// 锁内可见的会话句柄；None 表示尚未创建或已被丢弃
pub type SessionHandle = Option<Box<dyn ModelSession>>;

/// 单个对话的会话槽：惰性创建，失败时丢弃，显式 reset 时清空
#[derive(Default)]
pub struct SessionSlot {
    handle: Mutex<SessionHandle>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取整轮独占锁；持有期间其他轮次等待
    pub async fn lock(&self) -> MutexGuard<'_, SessionHandle> {
        self.handle.lock().await
    }

    /// 丢弃当前会话（等待进行中的轮次结束）；返回之前是否存在会话
    pub async fn reset(&self) -> bool {
        self.handle.lock().await.take().is_some()
    }

    /// 当前会话句柄 id
    pub async fn current_id(&self) -> Option<String> {
        self.handle.lock().await.as_ref().map(|s| s.id().to_string())
    }
}

/// 多会话表：key -> SessionSlot
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得（必要时创建）key 对应的会话槽；空 key 视为默认会话
    pub async fn slot(&self, key: Option<&str>) -> Arc<SessionSlot> {
        let key = normalize_key(key);
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// 重置 key 对应的会话；key 不存在时返回 false
    pub async fn reset(&self, key: Option<&str>) -> bool {
        let slot = self.slots.read().await.get(normalize_key(key)).cloned();
        match slot {
            Some(slot) => slot.reset().await,
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

fn normalize_key(key: Option<&str>) -> &str {
    match key.map(str::trim) {
        Some(k) if !k.is_empty() => k,
        _ => DEFAULT_SESSION_KEY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelGateway, ScriptedGateway, SessionConfig};

    #[tokio::test]
    async fn test_store_returns_same_slot_for_key() {
        let store = SessionStore::new();
        let a = store.slot(None).await;
        let b = store.slot(Some("  ")).await;
        let c = store.slot(Some(DEFAULT_SESSION_KEY)).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        let other = store.slot(Some("alice")).await;
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_reset_discards_session() {
        let gateway = ScriptedGateway::default();
        let store = SessionStore::new();
        let slot = store.slot(None).await;
        {
            let mut guard = slot.lock().await;
            *guard = Some(gateway.create_session(&SessionConfig::default()).await.unwrap());
        }
        assert!(slot.current_id().await.is_some());
        assert!(store.reset(None).await);
        assert!(slot.current_id().await.is_none());
        assert!(!store.reset(None).await);
        assert!(!store.reset(Some("missing")).await);
    }
}
