//! Storage with a transparent fallback.
//!
//! Writes go to the primary backend and, on any error, to the secondary under
//! the same key. The facade remembers which backend absorbed each key so later
//! reads, URLs and deletes go straight to it; unknown keys are looked up in
//! primary-then-secondary order. Only the most recent placements are kept, so
//! a long-lived facade forgets old keys and finds them by lookup order again.
//! There is no cross-backend transaction.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{StorageBackend, StorageKey};
use crate::error::{RedubError, Result};

/// Placements remembered by a default facade
const MAX_TRACKED_PLACEMENTS: usize = 10_000;

/// Where a payload ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: StorageKey,
    pub size: u64,
    pub backend: String,
}

/// Backend index per written key, oldest write evicted first
struct Placements {
    capacity: usize,
    next_seq: u64,
    entries: HashMap<StorageKey, (usize, u64)>,
    /// write order; entries whose sequence no longer matches are stale
    order: VecDeque<(StorageKey, u64)>,
}

impl Placements {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn is_current(&self, key: &StorageKey, seq: u64) -> bool {
        self.entries.get(key).is_some_and(|&(_, current)| current == seq)
    }

    fn get(&self, key: &StorageKey) -> Option<usize> {
        self.entries.get(key).map(|&(index, _)| index)
    }

    fn insert(&mut self, key: StorageKey, index: usize) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key.clone(), (index, seq));
        self.order.push_back((key, seq));

        while self.entries.len() > self.capacity {
            let Some((oldest, seq)) = self.order.pop_front() else { break };
            if self.is_current(&oldest, seq) {
                debug!("forgetting placement of {}", oldest);
                self.entries.remove(&oldest);
            }
        }
        if self.order.len() > 2 * self.capacity {
            let order = std::mem::take(&mut self.order);
            self.order = order.into_iter().filter(|(k, seq)| self.is_current(k, *seq)).collect();
        }
    }

    fn remove(&mut self, key: &StorageKey) -> Option<usize> {
        self.entries.remove(key).map(|(index, _)| index)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct StorageFacade {
    /// Primary first
    backends: Vec<Arc<dyn StorageBackend>>,
    placements: RwLock<Placements>,
}

impl StorageFacade {
    pub fn new(primary: Option<Arc<dyn StorageBackend>>, secondary: Arc<dyn StorageBackend>) -> Self {
        let backends = primary.into_iter().chain(std::iter::once(secondary)).collect();
        Self {
            backends,
            placements: RwLock::new(Placements::new(MAX_TRACKED_PLACEMENTS)),
        }
    }

    /// Remember at most `capacity` placements
    pub fn with_placement_capacity(self, capacity: usize) -> Self {
        Self {
            placements: RwLock::new(Placements::new(capacity)),
            ..self
        }
    }

    /// Number of keys whose backend is currently remembered
    pub async fn tracked_placements(&self) -> usize {
        self.placements.read().await.len()
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Backend that absorbed `key`, if this facade wrote it
    pub async fn placement(&self, key: &StorageKey) -> Option<String> {
        let placements = self.placements.read().await;
        placements.get(key).map(|i| self.backends[i].name().to_string())
    }

    /// Recorded backend first, then the rest in configured order
    async fn lookup_order(&self, key: &StorageKey) -> Vec<usize> {
        let recorded = self.placements.read().await.get(key);
        let mut order: Vec<usize> = recorded.into_iter().collect();
        order.extend((0..self.backends.len()).filter(|i| Some(*i) != recorded));
        order
    }

    pub async fn put_bytes(&self, key: &StorageKey, data: Bytes) -> Result<StoredObject> {
        let size = data.len() as u64;
        let mut last_error = None;

        for (index, backend) in self.backends.iter().enumerate() {
            match backend.put(key, data.clone()).await {
                Ok(()) => {
                    if index > 0 {
                        warn!("stored {} on fallback backend {}", key, backend.name());
                    }
                    self.placements.write().await.insert(key.clone(), index);
                    return Ok(StoredObject {
                        key: key.clone(),
                        size,
                        backend: backend.name().to_string(),
                    });
                }
                Err(e) => {
                    warn!("{} backend rejected {}: {}", backend.name(), key, e);
                    last_error = Some(e);
                }
            }
        }

        Err(RedubError::Storage(format!(
            "no backend accepted {}: {}",
            key,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub async fn put_file(&self, key: &StorageKey, path: &Path) -> Result<StoredObject> {
        let data = tokio::fs::read(path).await?;
        self.put_bytes(key, Bytes::from(data)).await
    }

    pub async fn get(&self, key: &StorageKey) -> Result<Bytes> {
        let mut last_error = None;
        for index in self.lookup_order(key).await {
            match self.backends[index].get(key).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    debug!("{} backend could not read {}: {}", self.backends[index].name(), key, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RedubError::Storage(format!("{} not found", key))))
    }

    pub async fn get_to_file(&self, key: &StorageKey, path: &Path) -> Result<u64> {
        let data = self.get(key).await?;
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    /// True if any backend holds the key; errors only when every backend failed
    pub async fn exists(&self, key: &StorageKey) -> Result<bool> {
        let mut answered = false;
        let mut last_error = None;
        for index in self.lookup_order(key).await {
            match self.backends[index].exists(key).await {
                Ok(true) => return Ok(true),
                Ok(false) => answered = true,
                Err(e) => last_error = Some(e),
            }
        }
        match (answered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(false),
        }
    }

    pub async fn url(&self, key: &StorageKey) -> Result<String> {
        let mut last_error = None;
        for index in self.lookup_order(key).await {
            let backend = &self.backends[index];
            match backend.exists(key).await {
                Ok(true) => return backend.url(key).await,
                Ok(false) => {}
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| RedubError::Storage(format!("{} not found", key))))
    }

    pub async fn delete(&self, key: &StorageKey) -> Result<()> {
        let recorded = self.placements.write().await.remove(key);
        if let Some(index) = recorded {
            return self.backends[index].delete(key).await;
        }

        let mut deleted = false;
        let mut last_error = None;
        for backend in &self.backends {
            match backend.delete(key).await {
                Ok(()) => deleted = true,
                Err(e) => last_error = Some(e),
            }
        }
        match (deleted, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStoreBackend;
    use async_trait::async_trait;

    /// Primary that is down for every operation
    struct Unreachable;

    #[async_trait]
    impl StorageBackend for Unreachable {
        fn name(&self) -> &str {
            "remote"
        }
        async fn put(&self, _: &StorageKey, _: Bytes) -> Result<()> {
            Err(RedubError::Storage("connection refused".into()))
        }
        async fn get(&self, _: &StorageKey) -> Result<Bytes> {
            Err(RedubError::Storage("connection refused".into()))
        }
        async fn exists(&self, _: &StorageKey) -> Result<bool> {
            Err(RedubError::Storage("connection refused".into()))
        }
        async fn delete(&self, _: &StorageKey) -> Result<()> {
            Err(RedubError::Storage("connection refused".into()))
        }
        async fn url(&self, _: &StorageKey) -> Result<String> {
            Err(RedubError::Storage("connection refused".into()))
        }
    }

    fn degraded_facade() -> StorageFacade {
        StorageFacade::new(Some(Arc::new(Unreachable)), Arc::new(ObjectStoreBackend::memory()))
    }

    #[tokio::test]
    async fn writes_fall_back_when_primary_is_down() {
        let facade = degraded_facade();
        let key = StorageKey::from_raw("jobs/1/output/a_ja.mp4");

        let stored = facade.put_bytes(&key, Bytes::from_static(b"payload")).await.unwrap();
        assert_eq!(stored.backend, "memory");
        assert_eq!(stored.size, 7);
        assert_eq!(facade.placement(&key).await.as_deref(), Some("memory"));

        assert!(facade.exists(&key).await.unwrap());
        assert_eq!(facade.get(&key).await.unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(facade.url(&key).await.unwrap(), "memory://jobs/1/output/a_ja.mp4");
    }

    #[tokio::test]
    async fn unknown_keys_are_searched_in_order() {
        let secondary = Arc::new(ObjectStoreBackend::memory());
        let key = StorageKey::from_raw("written/elsewhere");
        secondary.put(&key, Bytes::from_static(b"x")).await.unwrap();

        let facade = StorageFacade::new(Some(Arc::new(Unreachable)), secondary);
        assert!(facade.placement(&key).await.is_none());
        assert!(facade.exists(&key).await.unwrap());
        assert_eq!(facade.get(&key).await.unwrap(), Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn primary_wins_when_healthy() {
        let facade = StorageFacade::new(
            Some(Arc::new(ObjectStoreBackend::memory())),
            Arc::new(Unreachable),
        );
        let key = StorageKey::from_raw("k");
        let stored = facade.put_bytes(&key, Bytes::from_static(b"y")).await.unwrap();
        assert_eq!(stored.backend, "memory");
    }

    #[tokio::test]
    async fn every_backend_failing_is_a_storage_error() {
        let facade = StorageFacade::new(Some(Arc::new(Unreachable)), Arc::new(Unreachable));
        let key = StorageKey::from_raw("k");
        let err = facade.put_bytes(&key, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, RedubError::Storage(_)));
        assert!(facade.exists(&key).await.is_err());
    }

    #[tokio::test]
    async fn delete_forgets_the_placement() {
        let facade = degraded_facade();
        let key = StorageKey::from_raw("tmp/chunk");
        facade.put_bytes(&key, Bytes::from_static(b"z")).await.unwrap();
        facade.delete(&key).await.unwrap();
        assert!(facade.placement(&key).await.is_none());
        assert!(!facade.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn oldest_placements_are_forgotten_but_still_readable() {
        let facade = degraded_facade().with_placement_capacity(2);
        let keys: Vec<StorageKey> = ["jobs/1/a", "jobs/1/b", "jobs/1/c"]
            .iter()
            .map(|k| StorageKey::from_raw(*k))
            .collect();
        for key in &keys {
            facade.put_bytes(key, Bytes::from_static(b"v")).await.unwrap();
        }

        assert_eq!(facade.tracked_placements().await, 2);
        assert!(facade.placement(&keys[0]).await.is_none());
        assert_eq!(facade.placement(&keys[2]).await.as_deref(), Some("memory"));
        assert_eq!(facade.get(&keys[0]).await.unwrap(), Bytes::from_static(b"v"));
    }

    #[test]
    fn churned_keys_do_not_grow_the_record() {
        let mut placements = Placements::new(4);
        for i in 0..100 {
            let key = StorageKey::from_raw(format!("jobs/1/chunks/ja/{:03}.wav", i));
            placements.insert(key.clone(), 1);
            assert_eq!(placements.remove(&key), Some(1));
        }
        let kept = StorageKey::from_raw("jobs/1/output/talk_ja.mp4");
        placements.insert(kept.clone(), 0);
        // rewriting a key refreshes it instead of queueing a second eviction
        placements.insert(kept.clone(), 1);

        assert_eq!(placements.len(), 1);
        assert_eq!(placements.get(&kept), Some(1));
        assert!(placements.order.len() <= 8);
    }

    #[tokio::test]
    async fn single_backend_facade_works_locally() {
        let dir = assert_fs::TempDir::new().unwrap();
        let local = ObjectStoreBackend::local(dir.path().to_path_buf()).unwrap();
        let facade = StorageFacade::new(None, Arc::new(local));
        assert_eq!(facade.backend_names(), vec!["local"]);

        let source = dir.path().join("input.bin");
        std::fs::write(&source, b"abc").unwrap();
        let key = StorageKey::from_raw("jobs/2/source/input.bin");
        let stored = facade.put_file(&key, &source).await.unwrap();
        assert_eq!(stored.backend, "local");
        assert!(facade.url(&key).await.unwrap().starts_with("file://"));
    }
}
