use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;
use crate::cache::entry::CacheEntry;
use crate::cache::tier::{CacheTier, TierCounters, TierLevel};
use crate::core::config::TierConfig;
use crate::core::error::{Error, ErrorKind, Result};

struct MemoryState {
    entries: LruCache<String, CacheEntry>,
    bytes: usize,
}

impl MemoryState {
    fn pop_lru(&mut self) -> Option<CacheEntry> {
        let (_, entry) = self.entries.pop_lru()?;
        self.bytes = self.bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.bytes = self.bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

/// In-process tier: strict LRU bounded by entry count and estimated bytes.
pub struct MemoryTier {
    config: TierConfig,
    state: Mutex<MemoryState>,
    counters: TierCounters,
}

impl MemoryTier {
    pub fn new(config: TierConfig) -> Self {
        MemoryTier {
            config,
            state: Mutex::new(MemoryState {
                entries: LruCache::unbounded(),
                bytes: 0,
            }),
            counters: TierCounters::default(),
        }
    }

    pub fn bytes(&self) -> usize {
        self.state.lock().bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_over_budget(&self, state: &mut MemoryState) -> usize {
        let mut evicted = 0;
        while state.entries.len() > self.config.max_entries || state.bytes > self.config.max_bytes {
            if state.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        "memory"
    }

    fn level(&self) -> TierLevel {
        TierLevel::Memory
    }

    fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            None => {
                self.counters.miss();
                return Ok(None);
            }
            Some(entry) => entry.is_expired(Utc::now()),
        };

        if expired {
            state.remove(key);
            self.counters.miss();
            return Ok(None);
        }

        self.counters.hit();
        Ok(state.entries.peek(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        if entry.size_bytes > self.config.max_bytes {
            return Err(Error::new(
                ErrorKind::Cache,
                format!("entry {} ({} bytes) exceeds the memory budget", entry.key, entry.size_bytes),
            ));
        }

        let entry = entry.capped(self.ttl(), Utc::now());
        let mut state = self.state.lock();
        state.remove(&entry.key);
        state.bytes += entry.size_bytes;
        state.entries.put(entry.key.clone(), entry);

        let evicted = self.evict_over_budget(&mut state);
        if evicted > 0 {
            self.counters.evicted(evicted);
            debug!(evicted, bytes = state.bytes, "Memory tier evicted entries");
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock().remove(key).is_some())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let mut state = self.state.lock();
        let keys: Vec<String> = state.entries.iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            state.remove(key);
        }
        Ok(keys.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.bytes = 0;
        Ok(())
    }

    async fn shrink(&self, fraction: f64) -> Result<usize> {
        let mut state = self.state.lock();
        let target = (state.entries.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize;
        let mut evicted = 0;
        while evicted < target && state.pop_lru().is_some() {
            evicted += 1;
        }
        self.counters.evicted(evicted);
        Ok(evicted)
    }

    fn counters(&self) -> &TierCounters {
        &self.counters
    }

    fn entry_count(&self) -> Option<usize> {
        Some(self.len())
    }
}
