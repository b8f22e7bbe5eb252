use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use crate::analysis::Analyzer;
use crate::core::config::ScoringConfig;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::{DocumentSummary, ShardIndex, TermEntry, TermPosting};
use crate::query::types::{ProcessedQuery, QueryPhrase};
use crate::scoring::{field_weight, scorer_for, type_multiplier, DocStats, Scorer};
use crate::search::results::{rank_order, SearchHit};
use crate::search::snippet::SnippetGenerator;

/// Searches one shard for one processed query.
///
/// Runs on a blocking worker; implementations must not assume any ordering
/// relative to other shards.
pub trait ShardExecutor: Send + Sync {
    fn execute(&self, shard: &ShardIndex, query: &ProcessedQuery) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// Per-document accumulator for one query.
#[derive(Debug, Default)]
struct DocumentMatch {
    term_scores: BTreeMap<String, f32>,
    phrase_score: f32,
    phrases: Vec<String>,
}

impl DocumentMatch {
    fn base_score(&self) -> f32 {
        self.term_scores.values().sum::<f32>() + self.phrase_score
    }

    /// Matched terms, best contribution first.
    fn ranked_terms(&self) -> Vec<String> {
        let mut terms: Vec<(&String, &f32)> = self.term_scores.iter().collect();
        terms.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        terms.into_iter().map(|(term, _)| term.clone()).collect()
    }
}

/// Field-weighted term and phrase scoring over a shard's inverted index.
pub struct ScoringExecutor {
    scoring: ScoringConfig,
    scorer: Box<dyn Scorer>,
    snippets: SnippetGenerator,
    analyzer: Arc<Analyzer>,
}

impl ScoringExecutor {
    pub fn new(scoring: ScoringConfig, snippet_length: usize, analyzer: Arc<Analyzer>) -> Self {
        ScoringExecutor {
            scorer: scorer_for(&scoring),
            scoring,
            snippets: SnippetGenerator::new(snippet_length),
            analyzer,
        }
    }

    /// Weighted score of one posting: scorer output × field weight × document boost.
    fn term_score(&self, shard: &ShardIndex, doc: &DocumentSummary, entry: &TermEntry, posting: &TermPosting) -> f32 {
        let stats = DocStats {
            doc_length: doc.length as usize,
            avg_doc_length: shard.metadata.average_document_length,
            total_docs: shard.document_count(),
        };
        let in_title = posting.positions.iter().any(|p| doc.is_title_position(*p));
        self.scorer.score(posting, entry, &stats)
            * field_weight(&self.scoring.field_weights, doc, &entry.term, in_title)
            * doc.boost
    }

    fn match_terms(&self, shard: &ShardIndex, query: &ProcessedQuery, matches: &mut BTreeMap<DocId, DocumentMatch>) {
        let terms: BTreeSet<&String> = query.expanded_terms.iter().collect();
        for term in terms {
            let Some(entry) = shard.term(term) else {
                continue;
            };
            for posting in &entry.postings {
                let Some(doc) = shard.document(&posting.document_id) else {
                    continue;
                };
                if !query.filters.accepts(doc.doc_type, doc.testament()) {
                    continue;
                }

                let score = self.term_score(shard, doc, entry, posting);
                *matches.entry(doc.id.clone())
                    .or_default()
                    .term_scores
                    .entry(term.clone())
                    .or_insert(0.0) += score;
            }
        }
    }

    fn match_phrases(&self, shard: &ShardIndex, query: &ProcessedQuery, matches: &mut BTreeMap<DocId, DocumentMatch>) {
        for phrase in &query.phrases {
            let entries: Option<Vec<&TermEntry>> = phrase.terms.iter().map(|t| shard.term(t)).collect();
            let Some(entries) = entries.filter(|e| !e.is_empty()) else {
                continue;
            };

            for first in &entries[0].postings {
                let Some(doc) = shard.document(&first.document_id) else {
                    continue;
                };
                if !query.filters.accepts(doc.doc_type, doc.testament()) {
                    continue;
                }

                let postings: Option<Vec<&TermPosting>> = entries.iter()
                    .map(|entry| entry.posting_for(&doc.id))
                    .collect();
                let Some(postings) = postings else {
                    continue;
                };
                if !is_contiguous(&postings) {
                    continue;
                }

                let constituent: f32 = entries.iter()
                    .zip(&postings)
                    .map(|(entry, posting)| self.term_score(shard, doc, entry, posting))
                    .sum();

                let doc_match = matches.entry(doc.id.clone()).or_default();
                doc_match.phrase_score += constituent * self.scoring.phrase_weight;
                doc_match.phrases.push(phrase.text.clone());
            }
        }
    }

    fn final_score(&self, query: &ProcessedQuery, doc: &DocumentSummary, doc_match: &DocumentMatch) -> f32 {
        let mut score = doc_match.base_score()
            * query.boosts.product()
            * type_multiplier(&self.scoring.type_multipliers, doc.doc_type);

        if !doc_match.phrases.is_empty() {
            score *= self.scoring.phrase_bonus;
        }

        let distinct = doc_match.term_scores.len();
        if distinct > 1 {
            score *= 1.0 + self.scoring.multi_term_bonus * (distinct - 1) as f32;
        }
        score
    }

    fn snippet(&self, doc: &DocumentSummary, ranked_terms: &[String], phrases: &[QueryPhrase]) -> String {
        let text = if doc.body.trim().is_empty() { &doc.title } else { &doc.body };
        self.snippets.generate(text, ranked_terms, phrases, &self.analyzer)
    }
}

impl ShardExecutor for ScoringExecutor {
    fn execute(&self, shard: &ShardIndex, query: &ProcessedQuery) -> Result<Vec<SearchHit>> {
        let mut matches: BTreeMap<DocId, DocumentMatch> = BTreeMap::new();
        self.match_terms(shard, query, &mut matches);
        self.match_phrases(shard, query, &mut matches);

        let mut hits = Vec::with_capacity(matches.len());
        for (id, doc_match) in matches {
            let Some(doc) = shard.document(&id) else {
                continue;
            };
            let score = self.final_score(query, doc, &doc_match);
            if score <= 0.0 || !score.is_finite() {
                continue;
            }

            let ranked_terms = doc_match.ranked_terms();
            hits.push(SearchHit {
                snippet: self.snippet(doc, &ranked_terms, &query.phrases),
                document_id: id,
                score,
                term_matches: ranked_terms,
                phrase_matches: doc_match.phrases,
                shard_id: shard.id.clone(),
                title: doc.title.clone(),
                doc_type: doc.doc_type,
            });
        }

        hits.sort_by(rank_order);
        Ok(hits)
    }

    fn name(&self) -> &str {
        self.scorer.name()
    }
}

/// True when some occurrence of the first term is followed by each later
/// term at the next position.
fn is_contiguous(postings: &[&TermPosting]) -> bool {
    let Some((first, rest)) = postings.split_first() else {
        return false;
    };
    first.positions.iter().any(|&start| {
        rest.iter().enumerate().all(|(i, posting)| {
            posting.positions.binary_search(&(start + i as u32 + 1)).is_ok()
        })
    })
}
