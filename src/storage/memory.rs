use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::backend::ContainerBackend;
use crate::error::{DocumentError, Result};

/// Keeps container entries in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContainerBackend for MemoryBackend {
    async fn store(&self, name: &str, data: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(name.to_string(), data);
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DocumentError::Storage(format!("Entry not found: {}", name)))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.entries.write().await.remove(name);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
