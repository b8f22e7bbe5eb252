pub mod core;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod build;
pub mod shard;
pub mod query;
pub mod search;
pub mod cache;

pub use crate::build::{ContentSources, IndexBuilder};
pub use crate::core::config::SearchConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::query::SearchOptions;
pub use crate::search::{SearchClient, SearchHit, SearchResponse};

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                         SCRIPTURE-SEARCH STRUCT ARCHITECTURE                                │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── BUILD LAYER (offline) ──────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                              struct IndexBuilder                                    │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: SearchConfig              // Partitioning, scoring, analyzer name    │ │    │
│  │  │ analyzer: Arc<Analyzer>           // Same pipeline the query path uses       │ │    │
│  │  │ estimator: Arc<dyn SizeEstimator> // Pluggable size proxy                    │ │    │
│  │  │ extractor: DocumentExtractor      // Books, chapters, entities, categories   │ │    │
│  │  │ progress: Arc<AtomicUsize>        // Shards indexed so far                   │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ContentSources ──► ShardPlanner ──► ShardPlan ──► rayon pool ──► Vec<ShardIndex>           │
│                     • content_type     • shards       (one task      + Manifest              │
│                     • alphabetical     • assignments   per shard)    + AuxiliaryData         │
│                     • size / hybrid                                  + ConfigEcho            │
│                                                                                              │
│  Artifacts on disk: manifest.json (written last), shards/<id>.json, auxiliary.json,         │
│                     config.json                                                              │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── INDEXING LAYER ──────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct ShardIndex                                     │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ documents: BTreeMap<DocId, DocumentSummary>  // Title, body, metadata, boost │ │    │
│  │  │ terms: BTreeMap<String, TermEntry>           // Term → postings + df         │ │    │
│  │  │ metadata: ShardMetadata                      // Counts, types, size          │ │    │
│  │  │ bloom: BloomFilter                           // Shard skipping               │ │    │
│  │  │ prefix: PrefixTree                           // fst-backed autocomplete      │ │    │
│  │  │ vectors: DocumentVectors                     // TF-IDF similarity            │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌───────────────────────┐  ┌────────────────────────────────┐       │
│  │ struct TermEntry │  │ struct TermPosting    │  │ struct Analyzer                │       │
│  │ • term           │  │ • document_id: DocId  │  │ • tokenizer: Reference/Unicode │       │
│  │ • document_freq  │  │ • term_frequency: u32 │  │ • filters: length, stop words, │       │
│  │ • postings       │  │ • positions: Vec<u32> │  │   suffix or snowball stemming  │       │
│  └──────────────────┘  └───────────────────────┘  └────────────────────────────────┘       │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────────── SEARCH LAYER ───────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                              struct SearchClient                                    │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ processor: QueryProcessor         // Normalize, expand, classify, boost      │ │    │
│  │  │ shards: Arc<ShardManager>         // Health, selection, load balancing       │ │    │
│  │  │ executor: Arc<dyn ShardExecutor>  // Per-shard scoring + snippets            │ │    │
│  │  │ cache: CacheManager               // Memory → persistent → edge              │ │    │
│  │  │ permits: Semaphore                // Concurrent search ceiling               │ │    │
│  │  │ metrics: QueryMetrics             // Counters for stats()                    │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  search(query, options)                                                                      │
│    │                                                                                         │
│    ├─► QueryProcessor::process_query ──► ProcessedQuery (never fails, may be fallback)       │
│    ├─► CacheManager::get ──────────────► hit: return with from_cache = true                 │
│    ├─► ShardManager::select_optimal_shards (health, content types, bloom, balancer)         │
│    ├─► spawn_blocking per shard + soft timeout ──► Vec<SearchHit> or logged failure         │
│    ├─► merge_results (dedupe, score desc, id asc, truncate)                                 │
│    └─► CacheManager::set (TTL by popular / simple / other)                                  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────────── CACHE LAYER ───────────────────────────────────────┐
│                                                                                              │
│  ┌──────────────────────┐  ┌────────────────────────┐  ┌──────────────────────────┐        │
│  │ struct MemoryTier    │  │ struct PersistentTier  │  │ struct EdgeTier          │        │
│  │ • LruCache (strict)  │  │ • file per entry       │  │ • Arc<dyn EdgeStore>     │        │
│  │ • entry + byte budget│  │ • crc32 file names     │  │ • JSON payloads          │        │
│  │ • TTL 5 min          │  │ • lz4 / zstd frames    │  │ • TTL 24 h               │        │
│  └──────────────────────┘  │ • TTL 1 h              │  └──────────────────────────┘        │
│                            └────────────────────────┘                                       │
│  get: fastest tier first, promote hits upward     set: JoinSet write to every tier          │
│  invalidate: ContentUpdate | MemoryPressure | UserPreferenceChange                          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
