// Blob storage with a remote primary and a local fallback
//
// - key: storage keys derived from job id, language and chunk index
// - object: StorageBackend over object_store (S3-compatible, local filesystem, memory)
// - facade: primary-then-secondary writes, recorded placement for reads
// - factory: builds the facade from configuration

pub mod facade;
pub mod factory;
pub mod key;
pub mod object;

use async_trait::async_trait;
use bytes::Bytes;

pub use facade::*;
pub use factory::*;
pub use key::*;
pub use object::*;

use crate::error::Result;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short label recorded on results, e.g. "remote" or "local"
    fn name(&self) -> &str;

    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<()>;

    async fn get(&self, key: &StorageKey) -> Result<Bytes>;

    async fn exists(&self, key: &StorageKey) -> Result<bool>;

    async fn delete(&self, key: &StorageKey) -> Result<()>;

    /// A URL another service can read the object from
    async fn url(&self, key: &StorageKey) -> Result<String>;
}
