use std::collections::HashSet;
use serde::{Serialize, Deserialize};
use crate::core::types::DocId;

/// One term's occurrences in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermPosting {
    pub document_id: DocId,
    pub term_frequency: u32,       // Occurrences in the document, always >= 1
    pub positions: Vec<u32>,       // Ascending offsets in the title+body term sequence
}

/// Dictionary entry for a term: its postings plus precomputed statistics.
///
/// Invariant: `document_frequency == postings.len()`, one posting per document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub document_frequency: u32,
    pub postings: Vec<TermPosting>,
    pub max_term_frequency: u32,
    pub mean_term_frequency: f32,
}

impl TermEntry {
    pub fn new(term: &str) -> Self {
        TermEntry {
            term: term.to_string(),
            ..Default::default()
        }
    }

    /// Callers add each document at most once.
    pub fn add_posting(&mut self, posting: TermPosting) {
        self.postings.push(posting);
        self.document_frequency += 1;
    }

    /// Sort postings by descending term frequency (stable, so ties keep
    /// insertion order) and refresh the frequency statistics.
    pub fn optimize(&mut self) {
        self.postings.sort_by(|a, b| b.term_frequency.cmp(&a.term_frequency));

        self.max_term_frequency = self.postings.iter()
            .map(|p| p.term_frequency)
            .max()
            .unwrap_or(0);
        self.mean_term_frequency = if self.postings.is_empty() {
            0.0
        } else {
            self.total_frequency() as f32 / self.postings.len() as f32
        };
    }

    pub fn total_frequency(&self) -> u64 {
        self.postings.iter().map(|p| p.term_frequency as u64).sum()
    }

    pub fn posting_for(&self, doc_id: &DocId) -> Option<&TermPosting> {
        self.postings.iter().find(|p| &p.document_id == doc_id)
    }

    pub fn doc_ids(&self) -> HashSet<&DocId> {
        self.postings.iter().map(|p| &p.document_id).collect()
    }

    /// Document frequency matches the number of distinct documents and every
    /// posting is internally consistent.
    pub fn is_consistent(&self) -> bool {
        let distinct = self.doc_ids().len();
        distinct == self.postings.len()
            && self.document_frequency as usize == distinct
            && self.postings.iter().all(|p| {
                p.term_frequency >= 1
                    && p.term_frequency as usize == p.positions.len()
                    && p.positions.windows(2).all(|w| w[0] < w[1])
            })
    }
}
