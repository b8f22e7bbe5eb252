//! The tiered result cache against a real directory.

use std::time::Duration;
use scripture_search::cache::{CacheManager, InvalidationRule, TierLevel};
use scripture_search::core::config::{CacheConfig, CompressionType};

fn config(dir: &std::path::Path, compression: CompressionType) -> CacheConfig {
    CacheConfig {
        persistent_path: dir.to_path_buf(),
        compression,
        ..CacheConfig::default()
    }
}

#[tokio::test]
async fn test_persistent_entries_survive_restart_and_promote() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), CompressionType::Zstd);

    let first = CacheManager::open(&config).await.unwrap();
    let written = first.set("search:psalm 23", &vec!["chapter-psalms-23"], Duration::from_secs(600)).await.unwrap();
    assert_eq!(written, 3);
    drop(first);

    // Fresh memory and edge tiers; only the persistent tier remembers
    let second = CacheManager::open(&config).await.unwrap();
    let value: Vec<String> = second.get("search:psalm 23").await.unwrap();
    assert_eq!(value, vec!["chapter-psalms-23"]);

    let stats = second.stats();
    let memory = stats.tiers.iter().find(|t| t.level == TierLevel::Memory).unwrap();
    let persistent = stats.tiers.iter().find(|t| t.level == TierLevel::Persistent).unwrap();
    assert_eq!(memory.promotions, 1);
    assert_eq!(persistent.hits, 1);

    // Served from memory now
    let again: Vec<String> = second.get("search:psalm 23").await.unwrap();
    assert_eq!(again, value);
    let stats = second.stats();
    let memory = stats.tiers.iter().find(|t| t.level == TierLevel::Memory).unwrap();
    assert_eq!(memory.hits, 1);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_user_preferences_invalidate_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::open(&config(dir.path(), CompressionType::Lz4)).await.unwrap();

    let ruth = cache.preference_key("ruth", "translation");
    let boaz = cache.preference_key("boaz", "translation");
    cache.set(&ruth, &"kjv", Duration::from_secs(60)).await.unwrap();
    cache.set(&boaz, &"esv", Duration::from_secs(60)).await.unwrap();
    cache.set("search:ruth", &1u32, Duration::from_secs(60)).await.unwrap();

    let removed = cache.invalidate(InvalidationRule::UserPreferenceChange {
        user_id: Some("ruth".into()),
    }).await.unwrap();
    assert_eq!(removed, 3);

    assert!(cache.get::<String>(&ruth).await.is_none());
    assert_eq!(cache.get::<String>(&boaz).await.as_deref(), Some("esv"));
    assert_eq!(cache.get::<u32>("search:ruth").await, Some(1));

    cache.invalidate(InvalidationRule::UserPreferenceChange { user_id: None }).await.unwrap();
    assert!(cache.get::<String>(&boaz).await.is_none());
    assert_eq!(cache.get::<u32>("search:ruth").await, Some(1));
}

#[tokio::test]
async fn test_memory_pressure_only_touches_memory() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::open(&config(dir.path(), CompressionType::None)).await.unwrap();
    for i in 0..10 {
        cache.set(&format!("search:q{}", i), &i, Duration::from_secs(60)).await.unwrap();
    }

    let removed = cache.invalidate(InvalidationRule::MemoryPressure).await.unwrap();
    assert_eq!(removed, 5);

    // Everything is still reachable through the slower tiers
    for i in 0..10 {
        assert_eq!(cache.get::<i32>(&format!("search:q{}", i)).await, Some(i));
    }
}

#[tokio::test]
async fn test_expired_entries_read_as_misses() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::open(&config(dir.path(), CompressionType::Lz4)).await.unwrap();
    cache.set("search:fleeting", &"vapor", Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(cache.get::<String>("search:fleeting").await.is_none());
}

#[tokio::test]
async fn test_promoted_entry_outlives_short_memory_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), CompressionType::Lz4);
    config.memory.ttl_secs = 1;
    let cache = CacheManager::open(&config).await.unwrap();
    cache.set("search:manna", &"bread from heaven", Duration::from_secs(600)).await.unwrap();

    // The memory copy lapses; the persistent copy is still good
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(cache.get::<String>("search:manna").await.as_deref(), Some("bread from heaven"));

    // Promoted copy gets a fresh memory TTL rather than an already-past one
    assert_eq!(cache.get::<String>("search:manna").await.as_deref(), Some("bread from heaven"));
    let stats = cache.stats();
    let memory = stats.tiers.iter().find(|t| t.level == TierLevel::Memory).unwrap();
    let persistent = stats.tiers.iter().find(|t| t.level == TierLevel::Persistent).unwrap();
    assert_eq!(memory.promotions, 1);
    assert_eq!(memory.hits, 1);
    assert_eq!(persistent.hits, 1);
}

#[tokio::test]
async fn test_edge_tier_respects_its_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), CompressionType::None);
    config.edge.max_entries = 2;
    let cache = CacheManager::open(&config).await.unwrap();
    for i in 0..50 {
        cache.set(&format!("search:q{}", i), &i, Duration::from_secs(60)).await.unwrap();
    }

    let stats = cache.stats();
    let edge = stats.tiers.iter().find(|t| t.level == TierLevel::Edge).unwrap();
    assert_eq!(edge.entries, Some(2));
    assert_eq!(edge.evictions, 48);
}
