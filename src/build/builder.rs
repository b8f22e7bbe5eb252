use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;
use crate::analysis::{Analyzer, AnalyzerRegistry};
use crate::build::artifact::{BuildOutput, BuildStatistics, ConfigEcho, Manifest, ManifestEntry};
use crate::build::auxiliary::AuxiliaryData;
use crate::build::extract::DocumentExtractor;
use crate::build::partition::{PlannedShard, ShardPlan, ShardPlanner};
use crate::build::sources::ContentSources;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};
use crate::core::size::{SizeEstimator, StructuralSizeEstimator};
use crate::core::types::{Document, ShardId};
use crate::index::ShardIndex;

/// Turns content sources into sharded indexes plus auxiliary data.
///
/// Shards are indexed in parallel on a dedicated rayon pool. The output is a
/// pure function of the input bundle and configuration, apart from build ids
/// and timestamps.
pub struct IndexBuilder {
    config: SearchConfig,
    analyzer: Arc<Analyzer>,
    estimator: Arc<dyn SizeEstimator>,
    extractor: DocumentExtractor,
    progress: Arc<AtomicUsize>,
}

impl IndexBuilder {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let analyzer = AnalyzerRegistry::new().resolve(&config.index.analyzer)?;
        Ok(IndexBuilder {
            config,
            analyzer,
            estimator: Arc::new(StructuralSizeEstimator::default()),
            extractor: DocumentExtractor,
            progress: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn SizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Shards indexed so far in the running build
    pub fn get_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn build_index(&self, sources: &ContentSources) -> Result<BuildOutput> {
        let started = Instant::now();
        self.progress.store(0, Ordering::Relaxed);

        sources.validate()?;

        // Partition planning
        let planner = ShardPlanner::new(self.config.index.clone(), self.estimator.clone());
        let groups = planner.analyze(sources);
        let plan = planner.plan(&groups)?;

        // Document extraction and routing
        let mut routed: BTreeMap<ShardId, Vec<Document>> = plan.shards.iter()
            .map(|shard| (shard.id.clone(), Vec::new()))
            .collect();
        let mut all_documents = Vec::new();
        for extracted in self.extractor.extract(sources) {
            let shard_id = plan.shard_for(&extracted.group).ok_or_else(|| {
                Error::build(format!("no shard planned for group {}", extracted.group))
            })?;
            all_documents.push(extracted.document.clone());
            routed.entry(shard_id.clone()).or_default().push(extracted.document);
        }

        info!(
            documents = all_documents.len(),
            shards = plan.shards.len(),
            strategy = ?plan.strategy,
            "Index build started"
        );

        let shards = self.index_shards(&plan, routed)?;
        let auxiliary = AuxiliaryData::generate(&all_documents, self.config.index.autocomplete_limit);

        let manifest = self.manifest(&plan, &shards);
        let statistics = self.statistics(&plan, &shards, &all_documents, started);

        info!(
            documents = statistics.total_documents,
            terms = statistics.total_terms,
            shards = statistics.shard_count,
            duration_ms = statistics.build_duration_ms,
            "Index build finished"
        );

        Ok(BuildOutput {
            shards,
            manifest,
            auxiliary,
            config: ConfigEcho {
                scoring: self.config.scoring.clone(),
                strategy: self.config.index.strategy,
                target_shard_count: self.config.index.target_shard_count,
                analyzer: self.analyzer.name.clone(),
            },
            statistics,
        })
    }

    fn index_shards(&self, plan: &ShardPlan, mut routed: BTreeMap<ShardId, Vec<Document>>) -> Result<Vec<ShardIndex>> {
        let work: Vec<(&PlannedShard, Vec<Document>)> = plan.shards.iter()
            .map(|planned| (planned, routed.remove(&planned.id).unwrap_or_default()))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.index.build_workers.max(1))
            .build()
            .map_err(|e| Error::build(format!("cannot start indexing pool: {}", e)))?;

        let total = work.len();
        let results: Vec<Result<ShardIndex>> = pool.install(|| {
            work.into_par_iter()
                .map(|(planned, documents)| {
                    let shard = self.index_shard(planned, &documents);
                    let done = self.progress.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(shard = %planned.id, done, total, "Shard indexed");
                    shard
                })
                .collect()
        });

        // Collecting in plan order keeps the output independent of scheduling
        results.into_iter().collect()
    }

    fn index_shard(&self, planned: &PlannedShard, documents: &[Document]) -> Result<ShardIndex> {
        let mut shard = ShardIndex::new(planned.id.clone());
        for doc in documents {
            shard.add_document(doc, &self.analyzer)
                .map_err(|e| Error::build(format!("indexing {}: {}", doc.id, e)))?;
        }
        shard.finalize(self.estimator.as_ref())?;
        Ok(shard)
    }

    fn manifest(&self, plan: &ShardPlan, shards: &[ShardIndex]) -> Manifest {
        Manifest {
            build_id: Uuid::new_v4(),
            created_at: Utc::now(),
            strategy: plan.strategy,
            target_shard_bytes: plan.target_shard_bytes,
            total_documents: shards.iter().map(|s| s.document_count()).sum(),
            shards: shards.iter()
                .zip(&plan.shards)
                .map(|(shard, planned)| ManifestEntry {
                    id: shard.id.clone(),
                    location: Manifest::shard_path(&shard.id),
                    estimated_bytes: shard.metadata.estimated_bytes,
                    document_count: shard.document_count(),
                    content_types: shard.metadata.content_types.clone(),
                    groups: planned.groups.clone(),
                })
                .collect(),
        }
    }

    fn statistics(&self, plan: &ShardPlan, shards: &[ShardIndex], documents: &[Document], started: Instant) -> BuildStatistics {
        let mut documents_by_type = BTreeMap::new();
        for doc in documents {
            *documents_by_type.entry(doc.doc_type).or_insert(0) += 1;
        }

        let total_bytes: usize = shards.iter().map(|s| s.metadata.estimated_bytes).sum();
        BuildStatistics {
            documents_by_type,
            total_documents: documents.len(),
            total_terms: shards.iter().map(|s| s.metadata.term_count).sum(),
            shard_count: shards.len(),
            mean_shard_bytes: if shards.is_empty() { 0 } else { total_bytes / shards.len() },
            build_duration_ms: started.elapsed().as_millis() as u64,
            strategy: Some(plan.strategy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::DocumentType;

    fn builder() -> IndexBuilder {
        let mut config = SearchConfig::default();
        config.index.build_workers = 2;
        IndexBuilder::new(config).unwrap()
    }

    #[test]
    fn test_genesis_scenario_builds_one_chapter() {
        let sources = ContentSources::from_json(
            r#"{"books":[{"name":"Genesis","slug":"genesis","chapterSummaries":{"1":"In the beginning God created..."}}]}"#,
        ).unwrap();
        let output = builder().build_index(&sources).unwrap();

        assert_eq!(output.statistics.documents_by_type.get(&DocumentType::Chapter), Some(&1));
        let chapter_ids: Vec<String> = output.shards.iter()
            .flat_map(|s| s.documents.values())
            .filter(|d| d.doc_type == DocumentType::Chapter)
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(chapter_ids, vec!["chapter-genesis-1"]);
        assert_eq!(output.manifest.total_documents, 2);
    }

    #[test]
    fn test_empty_bundle_builds_nothing() {
        let output = builder().build_index(&ContentSources::default()).unwrap();
        assert!(output.shards.is_empty());
        assert_eq!(output.statistics.total_documents, 0);
    }

    #[test]
    fn test_invalid_sources_abort() {
        let sources = ContentSources::from_json(r#"{"books":[{"name":"Ruth"}]}"#).unwrap();
        let err = builder().build_index(&sources).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Build);
    }

    #[test]
    fn test_unknown_analyzer_rejected() {
        let mut config = SearchConfig::default();
        config.index.analyzer = "klingon".into();
        assert!(IndexBuilder::new(config).is_err());
    }

    #[test]
    fn test_progress_counts_shards() {
        let sources = ContentSources::from_json(
            r#"{"books":[{"name":"Ruth","slug":"ruth","chapterSummaries":{"1":"Naomi and Ruth"}}],
                "categories":[{"slug":"history","name":"History"}]}"#,
        ).unwrap();
        let builder = builder();
        let output = builder.build_index(&sources).unwrap();
        assert_eq!(builder.get_progress(), output.shards.len());
    }
}
