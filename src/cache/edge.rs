use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use crate::cache::entry::CacheEntry;
use crate::cache::tier::{CacheTier, TierCounters, TierLevel};
use crate::core::config::TierConfig;
use crate::core::error::{Error, ErrorKind, Result};

/// Key/value backend of the edge tier, typically a CDN or network cache.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn store(&self, key: &str, payload: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn keys(&self) -> Result<Vec<String>>;

    async fn purge(&self) -> Result<()>;
}

/// In-process stand-in used when no network edge is configured.
#[derive(Debug, Default)]
pub struct InMemoryEdgeStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EdgeStore for InMemoryEdgeStore {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn store(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.objects.write().insert(key.to_string(), payload);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.objects.write().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.objects.read().keys().cloned().collect())
    }

    async fn purge(&self) -> Result<()> {
        self.objects.write().clear();
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    bytes: usize,
}

/// Slowest tier. Entries travel as JSON through an [`EdgeStore`].
///
/// The tier keeps its own index of what it has written so it can hold the
/// store to `max_entries` and `max_bytes`. Keys written to the store by
/// anyone else are not counted.
pub struct EdgeTier {
    store: Arc<dyn EdgeStore>,
    config: TierConfig,
    index: Mutex<HashMap<String, EdgeRecord>>,
    counters: TierCounters,
}

impl EdgeTier {
    pub fn new(store: Arc<dyn EdgeStore>, config: TierConfig) -> Self {
        EdgeTier {
            store,
            config,
            index: Mutex::new(HashMap::new()),
            counters: TierCounters::default(),
        }
    }

    pub fn in_memory(config: TierConfig) -> Self {
        Self::new(Arc::new(InMemoryEdgeStore::new()), config)
    }

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes currently held in the store by this tier.
    pub fn bytes(&self) -> usize {
        self.index.lock().values().map(|r| r.bytes).sum()
    }

    /// Keys to drop so the tier fits its budgets. Expired entries go first,
    /// then the oldest.
    fn over_budget(&self, index: &HashMap<String, EdgeRecord>, now: DateTime<Utc>) -> Vec<String> {
        let mut records: Vec<(&String, &EdgeRecord)> = index.iter().collect();
        records.sort_by(|a, b| {
            let a_live = a.1.expires_at > now;
            let b_live = b.1.expires_at > now;
            a_live.cmp(&b_live)
                .then_with(|| a.1.stored_at.cmp(&b.1.stored_at))
                .then_with(|| a.0.cmp(b.0))
        });

        let mut count = records.len();
        let mut bytes: usize = records.iter().map(|(_, r)| r.bytes).sum();
        let mut victims = Vec::new();
        for (key, record) in records {
            let live = record.expires_at > now;
            if live && count <= self.config.max_entries && bytes <= self.config.max_bytes {
                break;
            }
            victims.push(key.clone());
            count -= 1;
            bytes = bytes.saturating_sub(record.bytes);
        }
        victims
    }

    async fn delete_keys(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(key = %key, error = %e, "Failed to delete edge entry");
            }
        }
    }
}

#[async_trait]
impl CacheTier for EdgeTier {
    fn name(&self) -> &str {
        "edge"
    }

    fn level(&self) -> TierLevel {
        TierLevel::Edge
    }

    fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(payload) = self.store.fetch(key).await? else {
            self.index.lock().remove(key);
            self.counters.miss();
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_slice(&payload)?;
        if entry.key != key || entry.is_expired(Utc::now()) {
            self.index.lock().remove(key);
            self.store.delete(key).await?;
            self.counters.miss();
            return Ok(None);
        }

        self.counters.hit();
        Ok(Some(entry))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let now = Utc::now();
        let entry = entry.capped(self.ttl(), now);
        let payload = serde_json::to_vec(&entry)?;
        if payload.len() > self.config.max_bytes {
            return Err(Error::new(
                ErrorKind::Cache,
                format!("{} is {} bytes, over the edge limit of {}", entry.key, payload.len(), self.config.max_bytes),
            ));
        }

        let bytes = payload.len();
        self.store.store(&entry.key, payload).await?;

        let victims = {
            let mut index = self.index.lock();
            index.insert(entry.key.clone(), EdgeRecord {
                stored_at: now,
                expires_at: entry.expires_at,
                bytes,
            });
            let victims = self.over_budget(&index, now);
            for victim in &victims {
                index.remove(victim);
            }
            victims
        };

        if !victims.is_empty() {
            debug!(evicted = victims.len(), "Edge tier over budget");
            self.counters.evicted(victims.len());
            self.delete_keys(&victims).await;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.index.lock().remove(key);
        self.store.delete(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys().await? {
            if key.starts_with(prefix) {
                self.index.lock().remove(&key);
                if self.store.delete(&key).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.index.lock().clear();
        self.store.purge().await
    }

    fn counters(&self) -> &TierCounters {
        &self.counters
    }

    fn entry_count(&self) -> Option<usize> {
        Some(self.len())
    }
}
