use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use serde::{Serialize, Deserialize};
use crate::core::types::{DocId, DocumentType, ShardId};

/// One ranked document in a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: DocId,
    pub score: f32,
    pub snippet: String,
    pub term_matches: Vec<String>,
    pub phrase_matches: Vec<String>,
    pub shard_id: ShardId,
    pub title: String,
    pub doc_type: DocumentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,

    /// Distinct matching documents before truncation
    pub total_results: usize,
    pub search_time_ms: u64,
    pub shards_covered: Vec<ShardId>,
    pub from_cache: bool,
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn failed(error: impl Into<String>, search_time_ms: u64) -> Self {
        SearchResponse {
            results: vec![],
            total_results: 0,
            search_time_ms,
            shards_covered: vec![],
            from_cache: false,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Final ranking: score descending, then document id ascending.
pub fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score)
        .then_with(|| a.document_id.cmp(&b.document_id))
}

/// Heap wrapper where the better-ranked hit compares greater.
#[derive(Debug)]
struct Ranked(SearchHit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&other.0, &self.0)
    }
}

/// Keeps the best `k` hits seen so far.
pub struct TopKCollector {
    heap: BinaryHeap<Reverse<Ranked>>,
    pub k: usize,
    pub total_collected: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, hit: SearchHit) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        self.heap.push(Reverse(Ranked(hit)));
        if self.heap.len() > self.k {
            // Worst hit sits on top of the reversed heap
            self.heap.pop();
        }
    }

    pub fn max_score(&self) -> f32 {
        self.heap.iter().map(|Reverse(r)| r.0.score).fold(0.0, f32::max)
    }

    pub fn into_results(self) -> Vec<SearchHit> {
        let mut results: Vec<SearchHit> = self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        results.sort_by(rank_order);
        results
    }
}

/// Merge per-shard hit lists into one ranking.
///
/// A document reported by several shards keeps its best score (ties go to
/// the lower shard id), so the output does not depend on the order the
/// shard lists arrive in. Returns the top `max_results` and the number of
/// distinct documents seen.
pub fn merge_results(shard_results: Vec<Vec<SearchHit>>, max_results: usize) -> (Vec<SearchHit>, usize) {
    let mut unique: BTreeMap<DocId, SearchHit> = BTreeMap::new();
    for hit in shard_results.into_iter().flatten() {
        match unique.get(&hit.document_id) {
            Some(kept) if !replaces(&hit, kept) => {}
            _ => {
                unique.insert(hit.document_id.clone(), hit);
            }
        }
    }

    let total = unique.len();
    let mut collector = TopKCollector::new(max_results);
    for hit in unique.into_values() {
        collector.collect(hit);
    }
    (collector.into_results(), total)
}

fn replaces(candidate: &SearchHit, kept: &SearchHit) -> bool {
    match candidate.score.total_cmp(&kept.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.shard_id < kept.shard_id,
    }
}
