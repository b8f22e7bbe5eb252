use crate::core::config::{FieldWeights, ScorerKind, ScoringConfig, TypeMultipliers};
use crate::core::types::DocumentType;
use crate::index::inverted::DocumentSummary;
use crate::index::posting::{TermEntry, TermPosting};

/// Scorer trait
pub trait Scorer: Send + Sync {
    /// Relevance of one posting before field weight and document boost.
    fn score(&self, posting: &TermPosting, entry: &TermEntry, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Document statistics for scoring
#[derive(Debug, Clone)]
pub struct DocStats {
    pub doc_length: usize,    // Number of terms in the document
    pub avg_doc_length: f32,  // Average document length in the shard
    pub total_docs: usize,    // Documents in the shard
}

/// `ln(total_docs / doc_freq)`, never below `floor`.
///
/// Without the floor a term present in every document of a shard scores zero.
pub fn idf(total_docs: usize, doc_freq: u32, floor: f32) -> f32 {
    if doc_freq == 0 || total_docs == 0 {
        return floor;
    }
    (total_docs as f32 / doc_freq as f32).ln().max(floor)
}

/// TF-IDF Scorer: `(tf / doc_length) × idf`
pub struct TfIdfScorer {
    pub idf_floor: f32,
}

impl TfIdfScorer {
    pub fn new(idf_floor: f32) -> Self {
        TfIdfScorer { idf_floor }
    }
}

impl Scorer for TfIdfScorer {
    fn score(&self, posting: &TermPosting, entry: &TermEntry, doc_stats: &DocStats) -> f32 {
        let tf = posting.term_frequency as f32 / doc_stats.doc_length.max(1) as f32;
        tf * idf(doc_stats.total_docs, entry.document_frequency, self.idf_floor)
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

/// BM25 Scorer
pub struct Bm25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
    pub idf_floor: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer {
            k1: 1.2,
            b: 0.75,
            idf_floor: 0.05,
        }
    }
}

impl Scorer for Bm25Scorer {
    fn score(&self, posting: &TermPosting, entry: &TermEntry, doc_stats: &DocStats) -> f32 {
        let tf = posting.term_frequency as f32;
        let doc_len = doc_stats.doc_length as f32;
        let avg_doc_len = doc_stats.avg_doc_length.max(1.0);
        let idf = idf(doc_stats.total_docs, entry.document_frequency, self.idf_floor);

        // BM25 formula
        let numerator = idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

pub fn scorer_for(config: &ScoringConfig) -> Box<dyn Scorer> {
    match config.scorer {
        ScorerKind::TfIdf => Box::new(TfIdfScorer::new(config.idf_floor)),
        ScorerKind::Bm25 => Box::new(Bm25Scorer {
            idf_floor: config.idf_floor,
            ..Bm25Scorer::default()
        }),
    }
}

/// Weight of the field a term matched in.
///
/// Title hits use the title weight (the name weight for entities), tag hits
/// the tag weight, anything else the weight of the type's body field.
pub fn field_weight(weights: &FieldWeights, doc: &DocumentSummary, term: &str, in_title: bool) -> f32 {
    if in_title {
        return match doc.doc_type {
            DocumentType::Entity => weights.name,
            _ => weights.title,
        };
    }
    if doc.tag_terms.contains(term) {
        return weights.tag;
    }
    match doc.doc_type {
        DocumentType::Book | DocumentType::Chapter => weights.summary,
        DocumentType::Entity | DocumentType::Category => weights.description,
    }
}

pub fn type_multiplier(multipliers: &TypeMultipliers, doc_type: DocumentType) -> f32 {
    match doc_type {
        DocumentType::Book => multipliers.book,
        DocumentType::Chapter => multipliers.chapter,
        DocumentType::Entity => multipliers.entity,
        DocumentType::Category => multipliers.category,
    }
}
