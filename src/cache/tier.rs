use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use crate::cache::entry::CacheEntry;
use crate::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    Memory,
    Persistent,
    Edge,
}

/// One level of the cache hierarchy.
///
/// Tiers own their own locking; the manager only sequences calls. Expired
/// entries read as misses.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &str;

    fn level(&self) -> TierLevel;

    /// Upper bound on the lifetime of anything stored here.
    fn ttl(&self) -> Duration;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    async fn set(&self, entry: CacheEntry) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`, returning how many went.
    async fn remove_prefix(&self, prefix: &str) -> Result<usize>;

    async fn clear(&self) -> Result<()>;

    /// Evict roughly `fraction` of the entries, least recently used first.
    /// Tiers without a notion of pressure do nothing.
    async fn shrink(&self, _fraction: f64) -> Result<usize> {
        Ok(0)
    }

    fn counters(&self) -> &TierCounters;

    /// Entry count when the tier can report it cheaply.
    fn entry_count(&self) -> Option<usize>;

    fn stats(&self) -> TierStats {
        let counters = self.counters();
        TierStats {
            name: self.name().to_string(),
            level: self.level(),
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            promotions: counters.promotions.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            entries: self.entry_count(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TierCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub promotions: AtomicU64,
    pub evictions: AtomicU64,
}

impl TierCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn promoted(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStats {
    pub name: String,
    pub level: TierLevel,
    pub hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub evictions: u64,
    pub entries: Option<usize>,
}

impl TierStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
