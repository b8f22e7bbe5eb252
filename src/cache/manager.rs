use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use crate::cache::edge::EdgeTier;
use crate::cache::entry::CacheEntry;
use crate::cache::memory::MemoryTier;
use crate::cache::persistent::PersistentTier;
use crate::cache::tier::{CacheTier, TierLevel, TierStats};
use crate::core::config::CacheConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::size::{SizeEstimator, StructuralSizeEstimator};

/// Fraction of the memory tier dropped under memory pressure.
const PRESSURE_EVICTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationRule {
    /// The index changed; nothing cached is trustworthy.
    ContentUpdate,
    MemoryPressure,
    /// Drop preference-scoped keys, for one user or for everyone.
    UserPreferenceChange { user_id: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

/// Multi-tier cache, fastest tier first.
///
/// Reads fall through the tiers and promote hits upward. Writes go to every
/// tier at once and succeed if any tier accepts them. No tier failure ever
/// reaches the caller as a search failure.
pub struct CacheManager {
    tiers: Vec<Arc<dyn CacheTier>>,
    estimator: Arc<dyn SizeEstimator>,
    preference_prefix: String,
    lookups: AtomicU64,
    hits: AtomicU64,
}

impl CacheManager {
    pub fn with_tiers(
        tiers: Vec<Arc<dyn CacheTier>>,
        estimator: Arc<dyn SizeEstimator>,
        preference_prefix: impl Into<String>,
    ) -> Self {
        CacheManager {
            tiers,
            estimator,
            preference_prefix: preference_prefix.into(),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Build every enabled tier. The persistent tier opens its directory,
    /// which is the only step that can fail.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
        if config.memory.enabled {
            tiers.push(Arc::new(MemoryTier::new(config.memory.clone())));
        }
        if config.persistent.enabled {
            let tier = PersistentTier::open(&config.persistent_path, config.persistent.clone(), config.compression).await?;
            tiers.push(Arc::new(tier));
        }
        if config.edge.enabled {
            tiers.push(Arc::new(EdgeTier::in_memory(config.edge.clone())));
        }

        info!(tiers = tiers.len(), "Cache manager opened");
        Ok(Self::with_tiers(
            tiers,
            Arc::new(StructuralSizeEstimator::default()),
            config.user_preference_prefix.clone(),
        ))
    }

    /// Memory and edge tiers only; nothing touches the filesystem.
    pub fn in_process(config: &CacheConfig) -> Self {
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
        if config.memory.enabled {
            tiers.push(Arc::new(MemoryTier::new(config.memory.clone())));
        }
        if config.edge.enabled {
            tiers.push(Arc::new(EdgeTier::in_memory(config.edge.clone())));
        }
        Self::with_tiers(
            tiers,
            Arc::new(StructuralSizeEstimator::default()),
            config.user_preference_prefix.clone(),
        )
    }

    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    pub fn preference_key(&self, user_id: &str, key: &str) -> String {
        format!("{}{}:{}", self.preference_prefix, user_id, key)
    }

    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.lookup(key).await?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry)
    }

    /// Typed read. A value that no longer decodes as `T` reads as a miss
    /// and is not counted as a hit.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.lookup(key).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Cached value has an unexpected shape");
                None
            }
        }
    }

    /// Fall through the tiers, promoting the first hit. Counts the lookup
    /// but leaves hit accounting to the caller.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        for (level, tier) in self.tiers.iter().enumerate() {
            let entry = match tier.get(key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(tier = tier.name(), key, error = %e, "Cache tier read failed");
                    continue;
                }
            };

            self.promote(&entry, &self.tiers[..level]).await;
            return Some(entry);
        }
        None
    }

    /// Cache `value` under `key` in every tier. Returns how many tiers took
    /// it; errors only when all of them refused.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<usize> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::new(key, value, ttl, self.estimator.as_ref());
        self.set_entry(entry).await
    }

    pub async fn set_entry(&self, entry: CacheEntry) -> Result<usize> {
        if self.tiers.is_empty() {
            return Ok(0);
        }

        let mut writes = JoinSet::new();
        for tier in &self.tiers {
            let tier = Arc::clone(tier);
            let entry = entry.clone();
            writes.spawn(async move {
                let result = tier.set(entry).await;
                (tier.name().to_string(), result)
            });
        }

        let mut written = 0;
        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((_, Ok(()))) => written += 1,
                Ok((tier, Err(e))) => warn!(tier = %tier, key = %entry.key, error = %e, "Cache tier write failed"),
                Err(e) => warn!(key = %entry.key, error = %e, "Cache tier write task failed"),
            }
        }

        if written == 0 {
            return Err(Error::new(ErrorKind::Cache, format!("no cache tier accepted {}", entry.key)));
        }
        Ok(written)
    }

    /// Apply an invalidation rule across the tiers, returning the number of
    /// entries removed where tiers can count them.
    pub async fn invalidate(&self, rule: InvalidationRule) -> Result<usize> {
        let mut removed = 0;
        match &rule {
            InvalidationRule::ContentUpdate => {
                for tier in &self.tiers {
                    removed += tier.entry_count().unwrap_or(0);
                    if let Err(e) = tier.clear().await {
                        warn!(tier = tier.name(), error = %e, "Cache tier clear failed");
                    }
                }
            }
            InvalidationRule::MemoryPressure => {
                for tier in self.tiers.iter().filter(|t| t.level() == TierLevel::Memory) {
                    removed += tier.shrink(PRESSURE_EVICTION).await?;
                }
            }
            InvalidationRule::UserPreferenceChange { user_id } => {
                let prefix = match user_id {
                    Some(user) => format!("{}{}:", self.preference_prefix, user),
                    None => self.preference_prefix.clone(),
                };
                for tier in &self.tiers {
                    match tier.remove_prefix(&prefix).await {
                        Ok(count) => removed += count,
                        Err(e) => warn!(tier = tier.name(), error = %e, "Cache tier prefix removal failed"),
                    }
                }
            }
        }

        info!(rule = ?rule, removed, "Cache invalidated");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            tiers: self.tiers.iter().map(|tier| tier.stats()).collect(),
        }
    }

    async fn promote(&self, entry: &CacheEntry, faster: &[Arc<dyn CacheTier>]) {
        for tier in faster {
            match tier.set(entry.clone()).await {
                Ok(()) => {
                    tier.counters().promoted();
                    debug!(tier = tier.name(), key = %entry.key, "Promoted cache entry");
                }
                Err(e) => warn!(tier = tier.name(), key = %entry.key, error = %e, "Cache promotion failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tier::TierCounters;
    use crate::core::config::{CompressionType, TierConfig};
    use serde_json::json;
    use tempfile::TempDir;

    /// A tier whose every operation fails.
    struct BrokenTier {
        counters: TierCounters,
    }

    #[async_trait::async_trait]
    impl CacheTier for BrokenTier {
        fn name(&self) -> &str {
            "broken"
        }

        fn level(&self) -> TierLevel {
            TierLevel::Edge
        }

        fn ttl(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(Error::new(ErrorKind::Cache, "unreachable edge"))
        }

        async fn set(&self, _entry: CacheEntry) -> Result<()> {
            Err(Error::new(ErrorKind::Cache, "unreachable edge"))
        }

        async fn remove(&self, _key: &str) -> Result<bool> {
            Err(Error::new(ErrorKind::Cache, "unreachable edge"))
        }

        async fn remove_prefix(&self, _prefix: &str) -> Result<usize> {
            Err(Error::new(ErrorKind::Cache, "unreachable edge"))
        }

        async fn clear(&self) -> Result<()> {
            Err(Error::new(ErrorKind::Cache, "unreachable edge"))
        }

        fn counters(&self) -> &TierCounters {
            &self.counters
        }

        fn entry_count(&self) -> Option<usize> {
            None
        }
    }

    fn memory(max_entries: usize) -> Arc<MemoryTier> {
        Arc::new(MemoryTier::new(TierConfig {
            enabled: true,
            ttl_secs: 300,
            max_entries,
            max_bytes: 1024 * 1024,
        }))
    }

    fn manager(tiers: Vec<Arc<dyn CacheTier>>) -> CacheManager {
        CacheManager::with_tiers(tiers, Arc::new(StructuralSizeEstimator::default()), "pref:")
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = CacheManager::in_process(&CacheConfig::default());
        assert_eq!(cache.set("search:love", &vec!["a", "b"], Duration::from_secs(60)).await.unwrap(), 2);

        let hit: Vec<String> = cache.get("search:love").await.unwrap();
        assert_eq!(hit, vec!["a", "b"]);
        assert!(cache.get::<Vec<String>>("search:hope").await.is_none());
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_promotion_after_memory_eviction() {
        let dir = TempDir::new().unwrap();
        let memory = memory(1);
        let persistent = Arc::new(
            PersistentTier::open(dir.path(), TierConfig::default(), CompressionType::Lz4).await.unwrap(),
        );
        let cache = manager(vec![memory.clone(), persistent.clone()]);

        cache.set("first", &json!(1), Duration::from_secs(60)).await.unwrap();
        cache.set("second", &json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(memory.len(), 1);

        let value: serde_json::Value = cache.get("first").await.unwrap();
        assert_eq!(value, json!(1));
        assert!(memory.get("first").await.unwrap().is_some());
        assert_eq!(memory.stats().promotions, 1);
        assert_eq!(persistent.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failing_tier_is_tolerated() {
        let broken: Arc<dyn CacheTier> = Arc::new(BrokenTier { counters: TierCounters::default() });
        let cache = manager(vec![memory(10), broken.clone()]);

        assert_eq!(cache.set("k", &json!("v"), Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(cache.get::<String>("k").await.unwrap(), "v");

        let only_broken = manager(vec![broken]);
        let err = only_broken.set("k", &json!("v"), Duration::from_secs(60)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);
        assert!(only_broken.get::<String>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidation_rules() {
        let memory = memory(100);
        let cache = manager(vec![memory.clone()]);
        for key in ["search:a", "search:b", "search:c", "search:d"] {
            cache.set(key, &json!(key), Duration::from_secs(60)).await.unwrap();
        }
        let user_key = cache.preference_key("u1", "layout");
        cache.set(&user_key, &json!("compact"), Duration::from_secs(60)).await.unwrap();
        cache.set("pref:u2:layout", &json!("wide"), Duration::from_secs(60)).await.unwrap();

        let rule = InvalidationRule::UserPreferenceChange { user_id: Some("u1".to_string()) };
        assert_eq!(cache.invalidate(rule).await.unwrap(), 1);
        assert!(cache.get::<String>("pref:u2:layout").await.is_some());

        let rule = InvalidationRule::UserPreferenceChange { user_id: None };
        assert_eq!(cache.invalidate(rule).await.unwrap(), 1);

        assert_eq!(cache.invalidate(InvalidationRule::MemoryPressure).await.unwrap(), 2);
        assert_eq!(memory.len(), 2);

        cache.invalidate(InvalidationRule::ContentUpdate).await.unwrap();
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_value_is_not_a_hit() {
        let cache = manager(vec![memory(10)]);
        cache.set("search:psalms", &json!({"hits": "many"}), Duration::from_secs(60)).await.unwrap();

        assert!(cache.get::<Vec<u32>>("search:psalms").await.is_none());
        let stats = cache.stats();
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.hits, 0);

        assert!(cache.get::<serde_json::Value>("search:psalms").await.is_some());
        assert!(cache.get_entry("search:psalms").await.is_some());
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().lookups, 3);
    }

    #[tokio::test]
    async fn test_content_update_counts_edge_entries() {
        let edge: Arc<dyn CacheTier> = Arc::new(EdgeTier::in_memory(TierConfig::default()));
        let cache = manager(vec![memory(10), edge.clone()]);
        for key in ["search:a", "search:b", "search:c"] {
            cache.set(key, &json!(key), Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(edge.entry_count(), Some(3));

        assert_eq!(cache.invalidate(InvalidationRule::ContentUpdate).await.unwrap(), 6);
        assert_eq!(edge.entry_count(), Some(0));
    }
}
