use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

/// Top-level configuration for building and serving the search index.
///
/// Every section falls back to its defaults, so a TOML file only needs the
/// keys it wants to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub index: IndexConfig,
    pub scoring: ScoringConfig,
    pub shards: ShardConfig,
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub execution: ExecutionConfig,
}

impl SearchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    ContentType,
    Alphabetical,
    Size,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub strategy: PartitionStrategy,
    pub target_shard_count: usize,
    pub min_shard_bytes: usize,
    pub max_shard_bytes: usize,
    pub build_workers: usize,
    pub analyzer: String,
    pub autocomplete_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            strategy: PartitionStrategy::Hybrid,
            target_shard_count: 12,
            min_shard_bytes: 1024 * 1024,       // 1MB
            max_shard_bytes: 10 * 1024 * 1024,  // 10MB
            build_workers: num_cpus::get(),
            analyzer: "standard".to_string(),
            autocomplete_limit: 5000,
        }
    }
}

/// Per-field relevance weights, echoed into the published config artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f32,
    pub heading: f32,
    pub verse: f32,
    pub summary: f32,
    pub name: f32,
    pub description: f32,
    pub tag: f32,
    pub reference: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        FieldWeights {
            title: 10.0,
            heading: 8.0,
            verse: 5.0,
            summary: 4.0,
            name: 7.0,
            description: 3.0,
            tag: 6.0,
            reference: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMultipliers {
    pub book: f32,
    pub chapter: f32,
    pub entity: f32,
    pub category: f32,
}

impl Default for TypeMultipliers {
    fn default() -> Self {
        TypeMultipliers {
            book: 1.2,
            chapter: 1.0,
            entity: 1.1,
            category: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    TfIdf,
    Bm25,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub scorer: ScorerKind,
    pub field_weights: FieldWeights,
    pub type_multipliers: TypeMultipliers,
    pub phrase_weight: f32,
    pub phrase_bonus: f32,
    pub multi_term_bonus: f32,
    pub idf_floor: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            scorer: ScorerKind::TfIdf,
            field_weights: FieldWeights::default(),
            type_multipliers: TypeMultipliers::default(),
            phrase_weight: 2.0,
            phrase_bonus: 1.5,
            multi_term_bonus: 0.1,
            idf_floor: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    RoundRobin,
    LeastLoaded,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub strategy: LoadBalanceStrategy,
    pub max_healthy_bytes: usize,
    pub stale_after_secs: u64,
    pub unhealthy_below: u8,
    pub degraded_below: u8,
    pub health_interval_secs: u64,
    pub use_bloom_filter: bool,
}

impl Default for ShardConfig {
    fn default() -> Self {
        ShardConfig {
            strategy: LoadBalanceStrategy::LeastLoaded,
            max_healthy_bytes: 50 * 1024 * 1024, // 50MB
            stale_after_secs: 24 * 60 * 60,
            unhealthy_below: 50,
            degraded_below: 80,
            health_interval_secs: 60,
            use_bloom_filter: true,
        }
    }
}

impl ShardConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Multiplicative boost factors applied by the query processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostFactors {
    pub popular_query: f32,
    pub exact_match: f32,
    pub phrase_match: f32,
    pub contextual_match: f32,
    pub reference: f32,
    pub fallback: f32,
}

impl Default for BoostFactors {
    fn default() -> Self {
        BoostFactors {
            popular_query: 1.3,
            exact_match: 1.2,
            phrase_match: 1.4,
            contextual_match: 1.2,
            reference: 1.5,
            fallback: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_query_length: usize,
    pub cache_capacity: usize,
    pub boosts: BoostFactors,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            max_query_length: 512,
            cache_capacity: 1000,
            boosts: BoostFactors::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    None,
    Lz4,
    Zstd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl TierConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        TierConfig {
            enabled: true,
            ttl_secs: 300,
            max_entries: 1000,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory: TierConfig,
    pub persistent: TierConfig,
    pub edge: TierConfig,
    pub persistent_path: PathBuf,
    pub compression: CompressionType,
    pub user_preference_prefix: String,
    pub popular_ttl_secs: u64,
    pub simple_ttl_secs: u64,
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            memory: TierConfig::default(),
            persistent: TierConfig {
                enabled: true,
                ttl_secs: 60 * 60,
                max_entries: 10_000,
                max_bytes: 100 * 1024 * 1024,
            },
            edge: TierConfig {
                enabled: true,
                ttl_secs: 24 * 60 * 60,
                max_entries: 100_000,
                max_bytes: 500 * 1024 * 1024,
            },
            persistent_path: PathBuf::from("./data/cache"),
            compression: CompressionType::Lz4,
            user_preference_prefix: "pref:".to_string(),
            popular_ttl_secs: 60 * 60,
            simple_ttl_secs: 30 * 60,
            default_ttl_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_concurrent_queries: usize,
    pub shard_timeout_ms: u64,
    pub default_max_results: usize,
    pub snippet_length: usize,
}

impl ExecutionConfig {
    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_concurrent_queries: 10,
            shard_timeout_ms: 300,
            default_max_results: 50,
            snippet_length: 200,
        }
    }
}
