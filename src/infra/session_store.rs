use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::app::ports::SessionStorePort;
use crate::error::Result;

/// Session store persisted as one JSON object of `key -> value` on disk
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: AsyncMutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: AsyncMutex::new(()),
        }
    }

    async fn read_all(&self) -> HashMap<String, String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Session file unreadable, starting empty: {}", e);
                return HashMap::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), "Session file corrupted, starting empty: {}", e);
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl SessionStorePort for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await;
        entries.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&entries)?).await?;
        debug!(key, path = %self.path.display(), "Persisted session entry");
        Ok(())
    }
}

/// In-memory store for development/testing
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
