use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::backend::ContainerBackend;
use crate::error::{DocumentError, Result};

/// A container backend that keeps every entry as a file under one directory
pub struct LocalDirectoryBackend {
    base_dir: PathBuf,
}

impl LocalDirectoryBackend {
    /// Open (creating if needed) the container directory
    pub async fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let path = PathBuf::from(base_dir.as_ref());
        fs::create_dir_all(&path).await.map_err(|e| {
            DocumentError::Storage(format!("Failed to create directory: {}", e))
        })?;
        Ok(Self { base_dir: path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(DocumentError::Storage(format!("Invalid entry name: {:?}", name)));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ContainerBackend for LocalDirectoryBackend {
    async fn store(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let path = self.entry_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DocumentError::Storage(format!("Failed to create directory: {}", e))
            })?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| DocumentError::Storage(format!("Failed to write {}: {}", name, e)))
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(name)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(DocumentError::Storage(format!("Entry not found: {}", name)));
        }
        fs::read(&path)
            .await
            .map_err(|e| DocumentError::Storage(format!("Failed to read {}: {}", name, e)))
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.entry_path(name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| DocumentError::Storage(format!("Failed to check {}: {}", name, e)))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await.map_err(|e| {
                DocumentError::Storage(format!("Failed to delete {}: {}", name, e))
            })?;
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![self.base_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut listing = fs::read_dir(&dir)
                .await
                .map_err(|e| DocumentError::Storage(format!("Failed to list directory: {}", e)))?;
            while let Some(entry) = listing
                .next_entry()
                .await
                .map_err(|e| DocumentError::Storage(format!("Failed to list directory: {}", e)))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.base_dir) {
                    let name = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
