use async_trait::async_trait;

use crate::error::Result;

/// Persists the named entries of one document container.
///
/// Entry names are relative, `/`-separated paths such as `header.json` or
/// `attachments/<file>`.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Store an entry, replacing any previous content
    async fn store(&self, name: &str, data: Vec<u8>) -> Result<()>;

    /// Load an entry; missing entries are an error
    async fn load(&self, name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Delete an entry if present
    async fn delete(&self, name: &str) -> Result<()>;

    /// Names of every stored entry, sorted
    async fn entries(&self) -> Result<Vec<String>>;
}
