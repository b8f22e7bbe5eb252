use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use crate::analysis::{Analyzer, AnalyzerRegistry};
use crate::build::{AuxiliaryData, BuildOutput, IndexArtifacts};
use crate::cache::{CacheManager, CacheStats, InvalidationRule};
use crate::core::config::SearchConfig;
use crate::core::error::Result;
use crate::core::stats::{QueryMetrics, QueryMetricsSnapshot};
use crate::core::types::{DocId, ShardId};
use crate::index::ShardIndex;
use crate::query::cache::QueryCacheStats;
use crate::query::types::{ProcessedQuery, QueryComplexity, SearchOptions};
use crate::query::QueryProcessor;
use crate::search::executor::{ScoringExecutor, ShardExecutor};
use crate::search::results::{merge_results, SearchHit, SearchResponse};
use crate::shard::{ShardHealth, ShardManager};

/// Autocomplete suggestion with its popularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub frequency: u64,
}

#[derive(Debug, Clone)]
pub struct ClientStats {
    pub queries: QueryMetricsSnapshot,
    pub query_cache: QueryCacheStats,
    pub cache: CacheStats,
    pub shards: Vec<(ShardId, ShardHealth)>,
}

/// Entry point for searching a built index.
///
/// Owns the query processor, shard manager, shard executor and cache; every
/// dependency is passed in, nothing is global. Cheap to share behind an `Arc`.
pub struct SearchClient {
    config: SearchConfig,
    analyzer: Arc<Analyzer>,
    processor: QueryProcessor,
    shards: Arc<ShardManager>,
    executor: Arc<dyn ShardExecutor>,
    cache: CacheManager,
    auxiliary: AuxiliaryData,
    permits: Semaphore,
    metrics: QueryMetrics,
}

impl SearchClient {
    pub fn new(config: SearchConfig, shards: Vec<ShardIndex>, auxiliary: AuxiliaryData, cache: CacheManager) -> Result<Self> {
        let analyzer = AnalyzerRegistry::new().resolve(&config.index.analyzer)?;
        let processor = QueryProcessor::new(config.query.clone(), &auxiliary, analyzer.clone())?;
        let executor = Arc::new(ScoringExecutor::new(
            config.scoring.clone(),
            config.execution.snippet_length,
            analyzer.clone(),
        ));

        let manager = ShardManager::new(config.shards.clone());
        for shard in shards {
            manager.register_index(Arc::new(shard))?;
        }

        info!(
            shards = manager.len(),
            analyzer = %analyzer.name,
            max_concurrent = config.execution.max_concurrent_queries,
            "Search client ready"
        );

        Ok(SearchClient {
            permits: Semaphore::new(config.execution.max_concurrent_queries.max(1)),
            config,
            analyzer,
            processor,
            shards: Arc::new(manager),
            executor,
            cache,
            auxiliary,
            metrics: QueryMetrics::default(),
        })
    }

    /// Search an in-process build with memory and edge caching only.
    pub fn from_build(config: SearchConfig, output: BuildOutput) -> Result<Self> {
        let cache = CacheManager::in_process(&config.cache);
        let artifacts = output.into_artifacts();
        Self::new(config, artifacts.shards, artifacts.auxiliary, cache)
    }

    /// Load published artifacts. The analyzer and scoring settings recorded
    /// at build time take precedence over `config`.
    pub async fn from_artifacts(dir: impl AsRef<Path>, mut config: SearchConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let artifacts = tokio::task::spawn_blocking(move || IndexArtifacts::load(dir)).await??;

        config.index.analyzer = artifacts.config.analyzer.clone();
        config.scoring = artifacts.config.scoring.clone();
        let cache = CacheManager::open(&config.cache).await?;

        info!(build_id = %artifacts.manifest.build_id, shards = artifacts.shards.len(), "Loaded index artifacts");
        Self::new(config, artifacts.shards, artifacts.auxiliary, cache)
    }

    /// Replace the per-shard search implementation.
    pub fn with_executor(mut self, executor: Arc<dyn ShardExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn shard_manager(&self) -> &Arc<ShardManager> {
        &self.shards
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn process_query(&self, query: &str, options: &SearchOptions) -> Arc<ProcessedQuery> {
        self.processor.process_query(query, options)
    }

    /// Run one search. Never returns `Err`: shard and cache failures degrade
    /// the response, and only an index with no reachable shard yields an
    /// error response.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> SearchResponse {
        let started = Instant::now();
        let Ok(_permit) = self.permits.acquire().await else {
            return SearchResponse::failed("search client is shutting down", 0);
        };

        let processed = self.processor.process_query(query, options);
        if processed.is_fallback {
            self.metrics.fallback_queries.fetch_add(1, Ordering::Relaxed);
        }

        let key = self.cache_key(&processed, options);
        if let Some(mut cached) = self.cache.get::<SearchResponse>(&key).await {
            cached.from_cache = true;
            cached.search_time_ms = elapsed_ms(started);
            self.metrics.record_query(cached.search_time_ms, true);
            debug!(query = %processed.normalized, "Search served from cache");
            return cached;
        }

        if self.shards.servable_count() == 0 {
            self.metrics.failed_queries.fetch_add(1, Ordering::Relaxed);
            warn!(query = %processed.normalized, "No shards available");
            return SearchResponse::failed("no shards available", elapsed_ms(started));
        }

        let targets = self.shards.select_optimal_shards(&processed, options);
        let attempted = targets.len();
        let (shard_results, mut covered) = self.fan_out(targets, &processed).await;

        if attempted > 0 && covered.is_empty() {
            self.metrics.failed_queries.fetch_add(1, Ordering::Relaxed);
            warn!(query = %processed.normalized, attempted, "Every target shard failed");
            return SearchResponse::failed("no shards reachable", elapsed_ms(started));
        }

        covered.sort();
        let (results, total_results) = merge_results(shard_results, options.max_results);
        let response = SearchResponse {
            results,
            total_results,
            search_time_ms: elapsed_ms(started),
            shards_covered: covered,
            from_cache: false,
            error: None,
        };

        // Partial coverage is served but never cached
        if response.shards_covered.len() < attempted {
            debug!(
                query = %processed.normalized,
                covered = response.shards_covered.len(),
                attempted,
                "Partial response not cached"
            );
        } else if let Err(e) = self.cache.set(&key, &response, self.result_ttl(&processed)).await {
            warn!(error = %e, "Could not cache search response");
        }

        self.metrics.record_query(response.search_time_ms, false);
        debug!(
            query = %processed.normalized,
            results = response.results.len(),
            total = response.total_results,
            shards = response.shards_covered.len(),
            elapsed_ms = response.search_time_ms,
            "Search finished"
        );
        response
    }

    /// Search every target shard on the blocking pool. Failed, panicked or
    /// late shards are logged and left out.
    async fn fan_out(&self, targets: Vec<ShardId>, query: &Arc<ProcessedQuery>) -> (Vec<Vec<SearchHit>>, Vec<ShardId>) {
        let timeout = self.config.execution.shard_timeout();
        let mut tasks = JoinSet::new();

        for id in targets {
            let Some(shard) = self.shards.get_shard(&id) else {
                continue;
            };
            let executor = Arc::clone(&self.executor);
            let query = Arc::clone(query);
            tasks.spawn(async move {
                let work = tokio::task::spawn_blocking(move || executor.execute(&shard, &query));
                (id, tokio::time::timeout(timeout, work).await)
            });
        }

        let mut shard_results = Vec::new();
        let mut covered = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    self.metrics.shard_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Shard task failed");
                    continue;
                }
            };

            match outcome {
                Ok(Ok(Ok(hits))) => {
                    covered.push(id);
                    shard_results.push(hits);
                    continue;
                }
                Ok(Ok(Err(e))) => warn!(shard = %id, error = %e, "Shard search failed"),
                Ok(Err(e)) => warn!(shard = %id, error = %e, "Shard search panicked"),
                Err(_) => warn!(shard = %id, timeout_ms = timeout.as_millis() as u64, "Shard search timed out"),
            }
            self.metrics.shard_failures.fetch_add(1, Ordering::Relaxed);
        }

        (shard_results, covered)
    }

    /// Composite key: normalized query, effective filters and options.
    fn cache_key(&self, query: &ProcessedQuery, options: &SearchOptions) -> String {
        let strategy = options.strategy
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "default".to_string());
        format!(
            "search:{}|{}|{}|{}",
            query.normalized,
            query.filters.cache_key(),
            options.max_results,
            strategy
        )
    }

    /// Popular queries live longest, simple ones a medium time, the rest shortest.
    pub fn result_ttl(&self, query: &ProcessedQuery) -> Duration {
        let cache = &self.config.cache;
        let secs = if query.is_popular() {
            cache.popular_ttl_secs
        } else if query.complexity == QueryComplexity::Simple {
            cache.simple_ttl_secs
        } else {
            cache.default_ttl_secs
        };
        Duration::from_secs(secs)
    }

    /// Completions for a partially typed query: title phrases first, then
    /// indexed terms from the shards' prefix trees.
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self.auxiliary.suggest(prefix, limit)
            .into_iter()
            .map(|entry| Suggestion {
                text: entry.text.clone(),
                frequency: entry.frequency as u64,
            })
            .collect();
        if suggestions.len() >= limit {
            return suggestions;
        }

        let Some(term_prefix) = self.analyzer.extract_terms(prefix).into_iter().next() else {
            return suggestions;
        };
        let mut terms: BTreeMap<String, u64> = BTreeMap::new();
        for id in self.shards.shard_ids() {
            let Some(shard) = self.shards.get_shard(&id) else {
                continue;
            };
            match shard.autocomplete(&term_prefix, limit) {
                Ok(found) => {
                    for (term, frequency) in found {
                        *terms.entry(term).or_insert(0) += frequency;
                    }
                }
                Err(e) => warn!(shard = %id, error = %e, "Prefix lookup failed"),
            }
        }

        let mut ranked: Vec<(String, u64)> = terms.into_iter()
            .filter(|(term, _)| suggestions.iter().all(|s| &s.text != term))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        suggestions.extend(
            ranked.into_iter()
                .take(limit - suggestions.len())
                .map(|(text, frequency)| Suggestion { text, frequency }),
        );
        suggestions
    }

    /// Documents most similar to `id` within its shard, best first.
    pub fn similar(&self, id: &DocId, k: usize) -> Vec<(DocId, f32)> {
        for shard_id in self.shards.shard_ids() {
            if let Some(shard) = self.shards.get_shard(&shard_id) {
                if shard.document(id).is_some() {
                    return shard.similar_documents(id, k);
                }
            }
        }
        vec![]
    }

    pub async fn invalidate_cache(&self, rule: InvalidationRule) -> Result<usize> {
        self.cache.invalidate(rule).await
    }

    /// Periodic shard health checks on the current runtime.
    pub fn spawn_health_monitor(&self) -> JoinHandle<()> {
        self.shards.spawn_health_monitor()
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            queries: self.metrics.snapshot(),
            query_cache: self.processor.cache_stats(),
            cache: self.cache.stats(),
            shards: self.shards.monitor_shard_health(),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BookSource, ContentSources, EntitySource, IndexBuilder};
    use crate::core::error::{Error, ErrorKind};

    fn sources() -> ContentSources {
        let mut genesis = BookSource {
            name: "Genesis".into(),
            slug: "genesis".into(),
            testament: Some("old".into()),
            ..Default::default()
        };
        genesis.chapter_summaries.insert("1".into(), "In the beginning God created the heavens and the earth.".into());
        genesis.chapter_summaries.insert("2".into(), "God rested on the seventh day and formed man.".into());

        let mut john = BookSource {
            name: "John".into(),
            slug: "john".into(),
            testament: Some("new".into()),
            ..Default::default()
        };
        john.chapter_summaries.insert("3".into(), "For God so loved the world. Nicodemus visits Jesus at night.".into());

        ContentSources {
            books: vec![genesis, john],
            entities: vec![EntitySource {
                id: "moses".into(),
                name: "Moses".into(),
                description: "Prophet who led Israel out of Egypt.".into(),
                ..Default::default()
            }],
            categories: vec![],
        }
    }

    fn config() -> SearchConfig {
        let mut config = SearchConfig::default();
        config.index.target_shard_count = 3;
        config.index.build_workers = 2;
        config
    }

    fn client() -> SearchClient {
        let output = IndexBuilder::new(config()).unwrap().build_index(&sources()).unwrap();
        SearchClient::from_build(config(), output).unwrap()
    }

    struct FailingExecutor;

    impl ShardExecutor for FailingExecutor {
        fn execute(&self, shard: &ShardIndex, _query: &ProcessedQuery) -> Result<Vec<SearchHit>> {
            Err(Error::new(ErrorKind::ShardUnavailable, format!("{} offline", shard.id)))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_search_finds_chapter_with_snippet() {
        let client = client();
        let response = client.search("beginning", &SearchOptions::default()).await;
        assert!(response.error.is_none());
        let hit = &response.results[0];
        assert_eq!(hit.document_id, DocId::from("chapter-genesis-1"));
        assert!(hit.score > 0.0);
        assert!(hit.snippet.contains("beginning"));
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn test_second_search_served_from_cache() {
        let client = client();
        let first = client.search("moses", &SearchOptions::default()).await;
        let second = client.search("moses", &SearchOptions::default()).await;
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.results, second.results);
        assert_eq!(client.stats().queries.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_all_shards_failing_is_error_response() {
        let client = client().with_executor(Arc::new(FailingExecutor));
        let response = client.search("god", &SearchOptions::default()).await;
        assert!(response.is_error());
        assert!(response.results.is_empty());
        assert!(client.stats().queries.shard_failures > 0);
    }

    #[tokio::test]
    async fn test_no_shards_is_error_response() {
        let client = SearchClient::new(
            config(),
            vec![],
            AuxiliaryData::default(),
            CacheManager::in_process(&SearchConfig::default().cache),
        ).unwrap();
        let response = client.search("love", &SearchOptions::default()).await;
        assert_eq!(response.error.as_deref(), Some("no shards available"));
    }

    #[tokio::test]
    async fn test_max_results_truncates() {
        let client = client();
        let response = client.search("god", &SearchOptions::default().with_max_results(1)).await;
        assert_eq!(response.results.len(), 1);
        assert!(response.total_results >= 3);
    }

    #[test]
    fn test_result_ttl_by_query_kind() {
        let client = client();
        let popular = client.process_query("love", &SearchOptions::default());
        assert_eq!(client.result_ttl(&popular), Duration::from_secs(3600));

        let simple = client.process_query("nicodemus", &SearchOptions::default());
        assert_eq!(client.result_ttl(&simple), Duration::from_secs(1800));

        let reference = client.process_query("john 3:16 for god so loved the world", &SearchOptions::default());
        assert_eq!(client.result_ttl(&reference), Duration::from_secs(900));
    }

    #[test]
    fn test_autocomplete_and_similar() {
        let client = client();
        let suggestions = client.autocomplete("gen", 5);
        assert!(suggestions.iter().any(|s| s.text.starts_with("genesis")));

        let similar = client.similar(&DocId::from("chapter-genesis-1"), 3);
        assert!(similar.iter().all(|(id, _)| id != &DocId::from("chapter-genesis-1")));
        assert!(client.similar(&DocId::from("missing"), 3).is_empty());
    }
}
