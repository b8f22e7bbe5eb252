use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::debug;
use crate::build::sources::ContentSources;
use crate::core::config::{IndexConfig, PartitionStrategy};
use crate::core::error::{Error, Result};
use crate::core::size::{estimate_record, SizeEstimator};
use crate::core::types::{DocumentType, ShardId};

pub const CATEGORY_GROUP: &str = "category:all";

pub fn book_group(slug: &str) -> String {
    format!("book:{}", slug)
}

/// Entities are grouped by the first alphanumeric character of their name.
pub fn entity_group(name: &str) -> String {
    let initial = name.chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_lowercase().collect::<String>())
        .unwrap_or_else(|| "_".to_string());
    format!("entity:{}", initial)
}

/// A unit of routing: every document of a group lands in the same shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentGroup {
    pub key: String,
    pub doc_type: DocumentType,
    pub estimated_bytes: usize,
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedShard {
    pub id: ShardId,
    pub groups: Vec<String>,
    pub estimated_bytes: usize,
    pub content_types: BTreeSet<DocumentType>,
}

/// Group → shard assignment. Computed once per build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardPlan {
    pub strategy: PartitionStrategy,
    pub target_shard_bytes: usize,
    pub shards: Vec<PlannedShard>,
    pub assignments: BTreeMap<String, ShardId>,
}

impl ShardPlan {
    pub fn shard_for(&self, group: &str) -> Option<&ShardId> {
        self.assignments.get(group)
    }

    /// Every group is assigned to exactly one existing shard.
    pub fn validate(&self, groups: &[ContentGroup]) -> Result<()> {
        let mut placements: BTreeMap<&str, usize> = BTreeMap::new();
        for shard in &self.shards {
            if shard.groups.is_empty() {
                return Err(Error::build(format!("planned shard {} is empty", shard.id)));
            }
            for group in &shard.groups {
                *placements.entry(group.as_str()).or_default() += 1;
                if self.assignments.get(group) != Some(&shard.id) {
                    return Err(Error::build(format!("group {} routed inconsistently", group)));
                }
            }
        }

        for group in groups {
            match placements.get(group.key.as_str()) {
                Some(1) => {}
                Some(n) => return Err(Error::build(format!("group {} assigned to {} shards", group.key, n))),
                None => return Err(Error::build(format!("group {} not assigned", group.key))),
            }
        }
        if placements.len() != groups.len() || self.assignments.len() != groups.len() {
            return Err(Error::build("plan references unknown groups"));
        }

        Ok(())
    }
}

pub struct ShardPlanner {
    config: IndexConfig,
    estimator: Arc<dyn SizeEstimator>,
}

impl ShardPlanner {
    pub fn new(config: IndexConfig, estimator: Arc<dyn SizeEstimator>) -> Self {
        ShardPlanner { config, estimator }
    }

    /// Content-size analysis: one group per book, entities by initial, all
    /// categories together. Sorted by key.
    pub fn analyze(&self, sources: &ContentSources) -> Vec<ContentGroup> {
        let mut groups: BTreeMap<String, ContentGroup> = BTreeMap::new();
        let estimator = self.estimator.as_ref();

        for book in &sources.books {
            let key = book_group(&book.slug);
            let group = groups.entry(key.clone()).or_insert_with(|| ContentGroup {
                key,
                doc_type: DocumentType::Book,
                estimated_bytes: 0,
                document_count: 0,
            });
            group.estimated_bytes += estimate_record(estimator, book);
            group.document_count += 1 + book.chapter_summaries.len();
        }

        for entity in &sources.entities {
            let key = entity_group(&entity.name);
            let group = groups.entry(key.clone()).or_insert_with(|| ContentGroup {
                key,
                doc_type: DocumentType::Entity,
                estimated_bytes: 0,
                document_count: 0,
            });
            group.estimated_bytes += estimate_record(estimator, entity);
            group.document_count += 1;
        }

        if !sources.categories.is_empty() {
            groups.insert(CATEGORY_GROUP.to_string(), ContentGroup {
                key: CATEGORY_GROUP.to_string(),
                doc_type: DocumentType::Category,
                estimated_bytes: sources.categories.iter()
                    .map(|c| estimate_record(estimator, c))
                    .sum(),
                document_count: sources.categories.len(),
            });
        }

        groups.into_values().collect()
    }

    /// Total size ÷ target shard count, clamped to the configured bounds.
    pub fn target_shard_bytes(&self, total_bytes: usize) -> usize {
        let count = self.config.target_shard_count.max(1);
        (total_bytes / count).clamp(self.config.min_shard_bytes, self.config.max_shard_bytes.max(self.config.min_shard_bytes))
    }

    pub fn plan(&self, groups: &[ContentGroup]) -> Result<ShardPlan> {
        let total: usize = groups.iter().map(|g| g.estimated_bytes).sum();
        let target = self.target_shard_bytes(total);

        let mut ordered: Vec<&ContentGroup> = groups.iter().collect();
        ordered.sort_by(|a, b| a.key.cmp(&b.key));

        let bins = match self.config.strategy {
            PartitionStrategy::ContentType => by_content_type(&ordered),
            PartitionStrategy::Alphabetical => by_alphabetical_range(&ordered, self.config.target_shard_count),
            PartitionStrategy::Size => by_size(&ordered, target),
            PartitionStrategy::Hybrid => hybrid(&ordered, target),
        };

        let mut plan = ShardPlan {
            strategy: self.config.strategy,
            target_shard_bytes: target,
            shards: Vec::with_capacity(bins.len()),
            assignments: BTreeMap::new(),
        };

        for (n, bin) in bins.into_iter().filter(|bin| !bin.is_empty()).enumerate() {
            let id = ShardId::numbered(n);
            for group in &bin {
                plan.assignments.insert(group.key.clone(), id.clone());
            }
            plan.shards.push(PlannedShard {
                id,
                groups: bin.iter().map(|g| g.key.clone()).collect(),
                estimated_bytes: bin.iter().map(|g| g.estimated_bytes).sum(),
                content_types: bin.iter().map(|g| g.doc_type).collect(),
            });
        }

        debug!(
            strategy = ?plan.strategy,
            target_bytes = target,
            shards = plan.shards.len(),
            groups = groups.len(),
            "Partition plan computed"
        );

        plan.validate(groups)?;
        Ok(plan)
    }
}

/// Next-fit packing in input order: open a new bin when the next group
/// would push the current one past `target`.
fn pack<'a>(groups: &[&'a ContentGroup], target: usize) -> Vec<Vec<&'a ContentGroup>> {
    let mut bins: Vec<Vec<&ContentGroup>> = Vec::new();
    let mut current: Vec<&ContentGroup> = Vec::new();
    let mut current_bytes = 0;

    for group in groups {
        if !current.is_empty() && current_bytes + group.estimated_bytes > target {
            bins.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += group.estimated_bytes;
        current.push(*group);
    }
    if !current.is_empty() {
        bins.push(current);
    }
    bins
}

fn of_type<'a>(groups: &[&'a ContentGroup], doc_type: DocumentType) -> Vec<&'a ContentGroup> {
    groups.iter().copied().filter(|g| g.doc_type == doc_type).collect()
}

fn by_content_type<'a>(groups: &[&'a ContentGroup]) -> Vec<Vec<&'a ContentGroup>> {
    [DocumentType::Book, DocumentType::Entity, DocumentType::Category]
        .into_iter()
        .map(|doc_type| of_type(groups, doc_type))
        .collect()
}

fn by_alphabetical_range<'a>(groups: &[&'a ContentGroup], shard_count: usize) -> Vec<Vec<&'a ContentGroup>> {
    let mut sorted = groups.to_vec();
    sorted.sort_by(|a, b| sort_name(&a.key).cmp(&sort_name(&b.key)).then_with(|| a.key.cmp(&b.key)));

    let count = shard_count.max(1).min(sorted.len().max(1));
    let per_shard = sorted.len().div_ceil(count).max(1);
    sorted.chunks(per_shard).map(|chunk| chunk.to_vec()).collect()
}

/// First-fit decreasing: largest groups first, ties by key.
fn by_size<'a>(groups: &[&'a ContentGroup], target: usize) -> Vec<Vec<&'a ContentGroup>> {
    let mut sorted = groups.to_vec();
    sorted.sort_by(|a, b| b.estimated_bytes.cmp(&a.estimated_bytes).then_with(|| a.key.cmp(&b.key)));

    let mut bins: Vec<(usize, Vec<&ContentGroup>)> = Vec::new();
    for group in sorted {
        match bins.iter_mut().find(|(bytes, _)| bytes + group.estimated_bytes <= target) {
            Some((bytes, bin)) => {
                *bytes += group.estimated_bytes;
                bin.push(group);
            }
            None => bins.push((group.estimated_bytes, vec![group])),
        }
    }
    bins.into_iter().map(|(_, bin)| bin).collect()
}

/// Large content types get their own size-bounded shards; the small ones
/// share shards up to the target size.
fn hybrid<'a>(groups: &[&'a ContentGroup], target: usize) -> Vec<Vec<&'a ContentGroup>> {
    let mut bins = Vec::new();
    let mut small = Vec::new();

    for doc_type in [DocumentType::Book, DocumentType::Entity, DocumentType::Category] {
        let typed = of_type(groups, doc_type);
        let type_bytes: usize = typed.iter().map(|g| g.estimated_bytes).sum();
        if type_bytes > target {
            bins.extend(pack(&typed, target));
        } else {
            small.extend(typed);
        }
    }

    bins.extend(pack(&small, target));
    bins
}

fn sort_name(key: &str) -> &str {
    key.split_once(':').map(|(_, name)| name).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::size::StructuralSizeEstimator;

    fn group(key: &str, doc_type: DocumentType, bytes: usize) -> ContentGroup {
        ContentGroup {
            key: key.to_string(),
            doc_type,
            estimated_bytes: bytes,
            document_count: 1,
        }
    }

    fn planner(strategy: PartitionStrategy) -> ShardPlanner {
        let config = IndexConfig {
            strategy,
            target_shard_count: 4,
            min_shard_bytes: 100,
            max_shard_bytes: 1000,
            ..IndexConfig::default()
        };
        ShardPlanner::new(config, Arc::new(StructuralSizeEstimator::default()))
    }

    fn corpus() -> Vec<ContentGroup> {
        vec![
            group("book:genesis", DocumentType::Book, 400),
            group("book:exodus", DocumentType::Book, 300),
            group("book:ruth", DocumentType::Book, 100),
            group("entity:a", DocumentType::Entity, 50),
            group("entity:m", DocumentType::Entity, 40),
            group(CATEGORY_GROUP, DocumentType::Category, 30),
        ]
    }

    #[test]
    fn test_group_keys() {
        assert_eq!(book_group("genesis"), "book:genesis");
        assert_eq!(entity_group("Moses"), "entity:m");
        assert_eq!(entity_group("'Abigail"), "entity:a");
        assert_eq!(entity_group(""), "entity:_");
    }

    #[test]
    fn test_target_is_clamped() {
        let planner = planner(PartitionStrategy::Hybrid);
        assert_eq!(planner.target_shard_bytes(0), 100);
        assert_eq!(planner.target_shard_bytes(2000), 500);
        assert_eq!(planner.target_shard_bytes(100_000), 1000);
    }

    #[test]
    fn test_every_strategy_assigns_each_group_once() {
        let groups = corpus();
        for strategy in [
            PartitionStrategy::ContentType,
            PartitionStrategy::Alphabetical,
            PartitionStrategy::Size,
            PartitionStrategy::Hybrid,
        ] {
            let plan = planner(strategy).plan(&groups).unwrap();
            assert_eq!(plan.assignments.len(), groups.len(), "{:?}", strategy);
            assert!(plan.validate(&groups).is_ok());
        }
    }

    #[test]
    fn test_hybrid_separates_large_types() {
        // total 920 / 4 -> target 230
        let plan = planner(PartitionStrategy::Hybrid).plan(&corpus()).unwrap();
        let genesis = plan.shard_for("book:genesis").unwrap();
        let moses = plan.shard_for("entity:m").unwrap();
        let categories = plan.shard_for(CATEGORY_GROUP).unwrap();
        assert_ne!(genesis, moses);
        assert_eq!(moses, categories);
        for shard in &plan.shards {
            if shard.content_types.contains(&DocumentType::Book) {
                assert_eq!(shard.content_types.len(), 1);
            }
        }
    }

    #[test]
    fn test_content_type_strategy() {
        let plan = planner(PartitionStrategy::ContentType).plan(&corpus()).unwrap();
        assert_eq!(plan.shards.len(), 3);
        assert_eq!(plan.shard_for("book:ruth"), plan.shard_for("book:genesis"));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let mut reversed = corpus();
        reversed.reverse();
        let a = planner(PartitionStrategy::Size).plan(&corpus()).unwrap();
        let b = planner(PartitionStrategy::Size).plan(&reversed).unwrap();
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn test_validate_catches_missing_group() {
        let groups = corpus();
        let mut plan = planner(PartitionStrategy::Hybrid).plan(&groups).unwrap();
        plan.assignments.remove("book:ruth");
        assert!(plan.validate(&groups).is_err());
    }

    #[test]
    fn test_analyze_groups_sources() {
        let sources = ContentSources::from_json(r#"{
            "books": [{"name": "Genesis", "slug": "genesis", "chapterSummaries": {"1": "x", "2": "y"}}],
            "entities": [{"id": "moses", "name": "Moses"}, {"id": "miriam", "name": "Miriam"}],
            "categories": [{"slug": "law", "name": "Law"}]
        }"#).unwrap();
        let groups = planner(PartitionStrategy::Hybrid).analyze(&sources);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["book:genesis", "category:all", "entity:m"]);
        assert_eq!(groups[0].document_count, 3);
        assert_eq!(groups[2].document_count, 2);
        assert!(groups.iter().all(|g| g.estimated_bytes > 0));
    }
}
