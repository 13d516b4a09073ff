use async_trait::async_trait;

use crate::contracts::ContractDirectory;
use crate::error::Result;

/// Source of the plate to contract lookup table
#[async_trait]
pub trait ContractDirectoryPort: Send + Sync {
    /// One-shot fetch; no retry. Failures surface as `DirectoryFetch`.
    async fn fetch(&self) -> Result<ContractDirectory>;
}

/// Key-value store for serialized alert batches
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}
