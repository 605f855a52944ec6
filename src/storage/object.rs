use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{StorageBackend, StorageKey};
use crate::config::RemoteStorageConfig;
use crate::error::Result;

/// How a backend turns a key into a readable URL
enum UrlStyle {
    Presigned { signer: Arc<dyn Signer>, expiry: Duration },
    File { root: PathBuf },
    Opaque { scheme: String },
}

pub struct ObjectStoreBackend {
    name: String,
    inner: Arc<dyn ObjectStore>,
    urls: UrlStyle,
}

impl ObjectStoreBackend {
    /// S3-compatible bucket; URLs are presigned GETs
    pub fn s3(config: &RemoteStorageConfig, url_expiry: Duration) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.allow_http);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        let store = Arc::new(builder.build()?);

        Ok(Self {
            name: "remote".to_string(),
            inner: store.clone(),
            urls: UrlStyle::Presigned {
                signer: store,
                expiry: url_expiry,
            },
        })
    }

    /// Directory on the local filesystem; URLs are `file://`
    pub fn local(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        let root = base_path.canonicalize()?;
        let fs = LocalFileSystem::new_with_prefix(&root)?;
        Ok(Self {
            name: "local".to_string(),
            inner: Arc::new(fs),
            urls: UrlStyle::File { root },
        })
    }

    /// Process-local store, for tests and dry runs
    pub fn memory() -> Self {
        Self {
            name: "memory".to_string(),
            inner: Arc::new(InMemory::new()),
            urls: UrlStyle::Opaque {
                scheme: "memory".to_string(),
            },
        }
    }
}

fn store_path(key: &StorageKey) -> StorePath {
    StorePath::from(key.as_str())
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<()> {
        let size = data.len();
        self.inner.put(&store_path(key), PutPayload::from(data)).await?;
        debug!("{}: stored {} ({} bytes)", self.name, key, size);
        Ok(())
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes> {
        let result = self.inner.get(&store_path(key)).await?;
        Ok(result.bytes().await?)
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool> {
        match self.inner.head(&store_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        self.inner.delete(&store_path(key)).await?;
        Ok(())
    }

    async fn url(&self, key: &StorageKey) -> Result<String> {
        match &self.urls {
            UrlStyle::Presigned { signer, expiry } => {
                let url = signer.signed_url(http::Method::GET, &store_path(key), *expiry).await?;
                Ok(url.to_string())
            }
            UrlStyle::File { root } => Ok(format!("file://{}", root.join(key.as_str()).display())),
            UrlStyle::Opaque { scheme } => Ok(format!("{}://{}", scheme, key)),
        }
    }
}
