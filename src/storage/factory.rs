use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{ObjectStoreBackend, StorageBackend, StorageFacade};
use crate::config::StorageConfig;
use crate::error::Result;

pub struct StorageFactory;

impl StorageFactory {
    /// Local storage is always available as the secondary. A remote bucket
    /// that cannot even be configured is skipped with a warning.
    pub fn create(config: &StorageConfig) -> Result<Arc<StorageFacade>> {
        let local = ObjectStoreBackend::local(PathBuf::from(&config.local_path))?;

        let remote: Option<Arc<dyn StorageBackend>> = match &config.remote {
            Some(remote) => {
                match ObjectStoreBackend::s3(remote, Duration::from_secs(config.url_expiry_secs)) {
                    Ok(backend) => {
                        info!("Using bucket {} with local fallback {}", remote.bucket, config.local_path);
                        Some(Arc::new(backend))
                    }
                    Err(e) => {
                        warn!("Remote storage unavailable, using local storage only: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Arc::new(StorageFacade::new(remote, Arc::new(local))))
    }
}
