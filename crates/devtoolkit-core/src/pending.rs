//! Per-user pending actions: what the next plain-text message should fulfil.

use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Save { name: String },
    /// `language` is stored lowercased.
    Format { language: String },
    ExplainError,
}

/// At most one action per user. `take_pending` reads and removes in one step,
/// so a concurrent `set_pending` is observed entirely or not at all.
#[async_trait::async_trait]
pub trait PendingStore: Send + Sync {
    async fn set_pending(&self, user_id: i64, action: PendingAction);
    async fn take_pending(&self, user_id: i64) -> Option<PendingAction>;
}

#[derive(Default)]
pub struct InMemoryPendingStore {
    actions: Mutex<HashMap<i64, PendingAction>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn set_pending(&self, user_id: i64, action: PendingAction) {
        self.actions.lock().await.insert(user_id, action);
    }

    async fn take_pending(&self, user_id: i64) -> Option<PendingAction> {
        self.actions.lock().await.remove(&user_id)
    }
}
