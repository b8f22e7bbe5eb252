//! Property-based tests using proptest.
//!
//! Invariants that must hold for any input: analysis is stable under
//! re-analysis, shard statistics agree with their postings, merging does not
//! depend on shard arrival order, and builds are deterministic.

mod common;

use std::collections::BTreeSet;
use proptest::prelude::*;
use common::{book, shard, small_config};
use scripture_search::analysis::Analyzer;
use scripture_search::build::{ContentSources, EntitySource, IndexBuilder};
use scripture_search::core::types::{DocId, DocumentType, ShardId};
use scripture_search::search::{merge_results, SearchHit};

// ============================================================================
// STRATEGIES
// ============================================================================

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z]{1,10}").unwrap()
}

fn text_strategy() -> impl Strategy<Value = String> {
    let separator = prop::sample::select(vec![" ", ", ", ". ", "! ", " - "]);
    prop::collection::vec((word_strategy(), separator), 0..20)
        .prop_map(|parts| parts.into_iter().map(|(w, s)| format!("{}{}", w, s)).collect())
}

fn hit_strategy() -> impl Strategy<Value = SearchHit> {
    (0usize..12, 0u32..20, 0usize..4).prop_map(|(doc, score, shard)| SearchHit {
        document_id: DocId::new(format!("doc-{:02}", doc)),
        score: score as f32 * 0.5,
        snippet: String::new(),
        term_matches: vec![],
        phrase_matches: vec![],
        shard_id: ShardId::numbered(shard),
        title: format!("doc-{:02}", doc),
        doc_type: DocumentType::Chapter,
    })
}

fn shard_lists_strategy() -> impl Strategy<Value = Vec<Vec<SearchHit>>> {
    prop::collection::vec(prop::collection::vec(hit_strategy(), 0..8), 1..5)
}

fn sources_strategy() -> impl Strategy<Value = ContentSources> {
    (
        prop::collection::vec(text_strategy(), 1..6),
        prop::collection::vec(word_strategy(), 0..4),
    ).prop_map(|(chapters, names)| {
        let chapters: Vec<(String, String)> = chapters.into_iter()
            .enumerate()
            .map(|(i, summary)| ((i + 1).to_string(), summary))
            .collect();
        let refs: Vec<(&str, &str)> = chapters.iter().map(|(c, s)| (c.as_str(), s.as_str())).collect();

        let names: BTreeSet<String> = names.into_iter().map(|n| n.to_lowercase()).collect();
        ContentSources {
            books: vec![book("Genesis", "genesis", "old", &refs)],
            entities: names.into_iter()
                .map(|name| EntitySource {
                    id: name.clone(),
                    description: format!("Figure named {}", name),
                    name,
                    ..Default::default()
                })
                .collect(),
            categories: vec![],
        }
    })
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Analyzing the output of analysis gives the same terms back.
    #[test]
    fn prop_analysis_is_idempotent(text in text_strategy()) {
        let analyzer = Analyzer::standard();
        let terms = analyzer.extract_terms(&text);
        let again = analyzer.extract_terms(&terms.join(" "));
        prop_assert_eq!(terms, again);
    }

    /// Document frequency equals the number of distinct documents posted,
    /// and every posting's frequency matches its positions.
    #[test]
    fn prop_document_frequency_matches_postings(bodies in prop::collection::vec(text_strategy(), 1..8)) {
        let docs: Vec<(String, String)> = bodies.into_iter()
            .enumerate()
            .map(|(i, body)| (format!("chapter-test-{}", i), body))
            .collect();
        let refs: Vec<(&str, &str, &str)> = docs.iter()
            .map(|(id, body)| (id.as_str(), "Test", body.as_str()))
            .collect();
        let index = shard(0, &refs);

        for entry in index.terms.values() {
            let distinct: BTreeSet<&DocId> = entry.postings.iter().map(|p| &p.document_id).collect();
            prop_assert_eq!(entry.document_frequency as usize, entry.postings.len());
            prop_assert_eq!(distinct.len(), entry.postings.len());
            for posting in &entry.postings {
                prop_assert_eq!(posting.term_frequency as usize, posting.positions.len());
                prop_assert!(posting.positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
        prop_assert!(index.integrity_issues().is_empty());
    }

    /// The merged ranking ignores the order shard lists arrive in.
    #[test]
    fn prop_merge_is_order_independent(lists in shard_lists_strategy(), max in 0usize..10) {
        let mut reversed = lists.clone();
        reversed.reverse();
        let mut rotated = lists.clone();
        rotated.rotate_left(1);

        let expected = merge_results(lists, max);
        prop_assert_eq!(&expected, &merge_results(reversed, max));
        prop_assert_eq!(&expected, &merge_results(rotated, max));

        let (hits, total) = expected;
        prop_assert!(hits.len() <= max);
        prop_assert!(hits.len() <= total);
        let unique: BTreeSet<&DocId> = hits.iter().map(|h| &h.document_id).collect();
        prop_assert_eq!(unique.len(), hits.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Two builds of the same bundle agree on everything but ids and clocks.
    #[test]
    fn prop_builds_are_deterministic(sources in sources_strategy()) {
        let builder = IndexBuilder::new(small_config()).unwrap();
        let first = builder.build_index(&sources).unwrap();
        let second = builder.build_index(&sources).unwrap();

        prop_assert_eq!(first.shards.len(), second.shards.len());
        for (a, b) in first.shards.iter().zip(&second.shards) {
            prop_assert_eq!(&a.id, &b.id);
            let a_docs: Vec<&DocId> = a.documents.keys().collect();
            let b_docs: Vec<&DocId> = b.documents.keys().collect();
            prop_assert_eq!(a_docs, b_docs);
            prop_assert_eq!(serde_json::to_string(&a.terms).unwrap(), serde_json::to_string(&b.terms).unwrap());
        }
        prop_assert_eq!(first.auxiliary.autocomplete, second.auxiliary.autocomplete);
        prop_assert_eq!(first.statistics.total_documents, second.statistics.total_documents);
    }
}
