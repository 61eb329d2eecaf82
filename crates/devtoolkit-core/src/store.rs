use anyhow::Result;
use devtoolkit_storage::{Snippet, Storage};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Snippet persistence as seen by the dispatcher.
#[async_trait::async_trait]
pub trait SnippetStore: Send + Sync {
    async fn save(&self, user_id: i64, name: &str, code: &str) -> Result<()>;
    async fn get(&self, user_id: i64, name: &str) -> Result<Option<Snippet>>;
    async fn list_names(&self, user_id: i64) -> Result<Vec<String>>;
    /// `false` when there was nothing to delete.
    async fn delete(&self, user_id: i64, name: &str) -> Result<bool>;
}

/// [`SnippetStore`] over the shared SQLite connection.
#[derive(Clone)]
pub struct SqliteSnippetStore {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteSnippetStore {
    pub fn new(storage: Arc<Mutex<Storage>>) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl SnippetStore for SqliteSnippetStore {
    async fn save(&self, user_id: i64, name: &str, code: &str) -> Result<()> {
        self.storage.lock().await.save_snippet(user_id, name, code)?;
        Ok(())
    }

    async fn get(&self, user_id: i64, name: &str) -> Result<Option<Snippet>> {
        self.storage.lock().await.get_snippet(user_id, name)
    }

    async fn list_names(&self, user_id: i64) -> Result<Vec<String>> {
        self.storage.lock().await.list_snippet_names(user_id)
    }

    async fn delete(&self, user_id: i64, name: &str) -> Result<bool> {
        self.storage.lock().await.delete_snippet(user_id, name)
    }
}
