use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use crate::cache::codec;
use crate::cache::entry::CacheEntry;
use crate::cache::tier::{CacheTier, TierCounters, TierLevel};
use crate::core::config::{CompressionType, TierConfig};
use crate::core::error::{Error, ErrorKind, Result};

const ENTRY_EXTENSION: &str = "entry";

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    bytes: usize,
}

/// Local on-disk tier. One compressed file per entry, named by the CRC32 of
/// its key; the key is stored inside and checked on read.
pub struct PersistentTier {
    dir: PathBuf,
    config: TierConfig,
    compression: CompressionType,
    index: Mutex<HashMap<u32, StoredRecord>>,
    counters: TierCounters,
}

impl PersistentTier {
    /// Open the cache directory, creating it if needed, and rebuild the
    /// in-memory index from the files already there. Unreadable or expired
    /// files are deleted.
    pub async fn open(dir: impl AsRef<Path>, config: TierConfig, compression: CompressionType) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let now = Utc::now();
        let mut index = HashMap::new();
        let mut discarded = 0;
        let mut files = tokio::fs::read_dir(&dir).await?;
        while let Some(file) = files.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            match read_entry(&path, config.max_bytes).await {
                Ok(entry) if !entry.is_expired(now) => {
                    let bytes = file.metadata().await.map(|m| m.len() as usize).unwrap_or(0);
                    index.insert(slot(&entry.key), StoredRecord {
                        key: entry.key,
                        created_at: entry.created_at,
                        expires_at: entry.expires_at,
                        bytes,
                    });
                }
                _ => {
                    discarded += 1;
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }

        debug!(dir = %dir.display(), entries = index.len(), discarded, "Persistent cache opened");
        Ok(PersistentTier {
            dir,
            config,
            compression,
            index: Mutex::new(index),
            counters: TierCounters::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.index.lock().values().map(|r| r.bytes).sum()
    }

    fn path_for(&self, slot: u32) -> PathBuf {
        self.dir.join(format!("{:08x}.{}", slot, ENTRY_EXTENSION))
    }

    /// Slots to drop so the tier fits its budgets, oldest entries first.
    fn over_budget(&self, index: &HashMap<u32, StoredRecord>) -> Vec<u32> {
        let mut records: Vec<(&u32, &StoredRecord)> = index.iter().collect();
        records.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(b.0)));

        let mut count = records.len();
        let mut bytes: usize = records.iter().map(|(_, r)| r.bytes).sum();
        let mut victims = Vec::new();
        for (slot, record) in records {
            if count <= self.config.max_entries && bytes <= self.config.max_bytes {
                break;
            }
            victims.push(*slot);
            count -= 1;
            bytes = bytes.saturating_sub(record.bytes);
        }
        victims
    }

    async fn delete_slots(&self, slots: &[u32]) {
        for slot in slots {
            if let Err(e) = tokio::fs::remove_file(self.path_for(*slot)).await {
                warn!(slot, error = %e, "Failed to delete cache file");
            }
        }
    }
}

#[async_trait]
impl CacheTier for PersistentTier {
    fn name(&self) -> &str {
        "persistent"
    }

    fn level(&self) -> TierLevel {
        TierLevel::Persistent
    }

    fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let slot = slot(key);
        let record = self.index.lock().get(&slot).cloned();
        match record {
            Some(record) if record.key == key => {
                if is_past(record.expires_at) {
                    self.remove(key).await?;
                    self.counters.miss();
                    return Ok(None);
                }
            }
            _ => {
                self.counters.miss();
                return Ok(None);
            }
        }

        let entry = read_entry(&self.path_for(slot), self.config.max_bytes).await?;
        if entry.key != key || entry.is_expired(Utc::now()) {
            self.counters.miss();
            return Ok(None);
        }

        self.counters.hit();
        Ok(Some(entry))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let entry = entry.capped(self.ttl(), Utc::now());
        let payload = serde_json::to_vec(&entry)?;
        if payload.len() > self.config.max_bytes {
            return Err(Error::new(
                ErrorKind::Cache,
                format!("{} is {} bytes, over the persistent limit of {}", entry.key, payload.len(), self.config.max_bytes),
            ));
        }
        let framed = codec::encode(&payload, self.compression)?;

        let slot = slot(&entry.key);
        tokio::fs::write(self.path_for(slot), &framed).await?;

        let victims = {
            let mut index = self.index.lock();
            index.insert(slot, StoredRecord {
                key: entry.key.clone(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
                bytes: framed.len(),
            });
            let victims = self.over_budget(&index);
            for victim in &victims {
                index.remove(victim);
            }
            victims
        };

        if !victims.is_empty() {
            self.counters.evicted(victims.len());
            self.delete_slots(&victims).await;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let slot = slot(key);
        let removed = {
            let mut index = self.index.lock();
            let owned = index.get(&slot).is_some_and(|record| record.key == key);
            if owned {
                index.remove(&slot);
            }
            owned
        };
        if removed {
            self.delete_slots(&[slot]).await;
        }
        Ok(removed)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let slots: Vec<u32> = {
            let mut index = self.index.lock();
            let slots: Vec<u32> = index.iter()
                .filter(|(_, record)| record.key.starts_with(prefix))
                .map(|(slot, _)| *slot)
                .collect();
            for slot in &slots {
                index.remove(slot);
            }
            slots
        };
        self.delete_slots(&slots).await;
        Ok(slots.len())
    }

    async fn clear(&self) -> Result<()> {
        let slots: Vec<u32> = self.index.lock().drain().map(|(slot, _)| slot).collect();
        self.delete_slots(&slots).await;
        Ok(())
    }

    fn counters(&self) -> &TierCounters {
        &self.counters
    }

    fn entry_count(&self) -> Option<usize> {
        Some(self.len())
    }
}

fn slot(key: &str) -> u32 {
    crc32fast::hash(key.as_bytes())
}

fn is_past(at: DateTime<Utc>) -> bool {
    Utc::now() >= at
}

async fn read_entry(path: &Path, limit: usize) -> Result<CacheEntry> {
    let framed = tokio::fs::read(path).await?;
    let payload = codec::decode(&framed, limit)?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::size::JsonSizeEstimator;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(max_entries: usize) -> TierConfig {
        TierConfig {
            enabled: true,
            ttl_secs: 3600,
            max_entries,
            max_bytes: 1024 * 1024,
        }
    }

    fn entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, json!({"results": [key]}), Duration::from_secs(600), &JsonSizeEstimator)
    }

    #[tokio::test]
    async fn test_set_get_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let tier = PersistentTier::open(dir.path(), config(10), CompressionType::Lz4).await.unwrap();
            tier.set(entry("search:faith")).await.unwrap();
            assert_eq!(tier.get("search:faith").await.unwrap().unwrap().value, json!({"results": ["search:faith"]}));
        }

        let reopened = PersistentTier::open(dir.path(), config(10), CompressionType::Zstd).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("search:faith").await.unwrap().is_some());
        assert!(reopened.get("search:hope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oldest_evicted_first() {
        let dir = TempDir::new().unwrap();
        let tier = PersistentTier::open(dir.path(), config(2), CompressionType::None).await.unwrap();
        for key in ["a", "b", "c"] {
            tier.set(entry(key)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(tier.len(), 2);
        assert!(tier.get("a").await.unwrap().is_none());
        assert!(tier.get("c").await.unwrap().is_some());
        assert_eq!(tier.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_corrupt_files_discarded_on_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("deadbeef.entry"), b"garbage").unwrap();
        let tier = PersistentTier::open(dir.path(), config(10), CompressionType::Lz4).await.unwrap();
        assert!(tier.is_empty());
        assert!(!dir.path().join("deadbeef.entry").exists());
    }

    #[tokio::test]
    async fn test_remove_prefix_and_clear() {
        let dir = TempDir::new().unwrap();
        let tier = PersistentTier::open(dir.path(), config(10), CompressionType::Lz4).await.unwrap();
        for key in ["pref:u1", "search:a", "search:b"] {
            tier.set(entry(key)).await.unwrap();
        }

        assert_eq!(tier.remove_prefix("pref:").await.unwrap(), 1);
        assert!(tier.remove("search:a").await.unwrap());
        assert!(!tier.remove("search:a").await.unwrap());
        tier.clear().await.unwrap();
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_forged_frame_fails_without_allocating() {
        let dir = TempDir::new().unwrap();
        let tier = PersistentTier::open(dir.path(), config(10), CompressionType::Lz4).await.unwrap();
        tier.set(entry("search:forged")).await.unwrap();

        // Header claims 4 GiB behind a two byte lz4 body
        let mut forged = vec![1];
        forged.extend_from_slice(&u32::MAX.to_le_bytes());
        forged.extend_from_slice(&[0x10, b'a']);
        std::fs::write(tier.path_for(slot("search:forged")), &forged).unwrap();

        let err = tier.get("search:forged").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);

        let reopened = PersistentTier::open(dir.path(), config(10), CompressionType::Lz4).await.unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn test_entry_over_byte_limit_rejected() {
        let dir = TempDir::new().unwrap();
        let small = TierConfig { max_bytes: 64, ..config(10) };
        let tier = PersistentTier::open(dir.path(), small, CompressionType::Zstd).await.unwrap();
        let big = CacheEntry::new("search:big", json!("x".repeat(500)), Duration::from_secs(60), &JsonSizeEstimator);

        assert!(tier.set(big).await.is_err());
        assert!(tier.is_empty());
    }
}
