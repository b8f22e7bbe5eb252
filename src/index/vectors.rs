use std::collections::{BTreeMap, HashMap};
use serde::{Serialize, Deserialize};
use crate::core::types::DocId;

/// Sparse TF–IDF vector for one document, sorted by term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentVector {
    pub weights: Vec<(String, f32)>,
    pub norm: f32,
}

impl DocumentVector {
    pub fn new(mut weights: Vec<(String, f32)>) -> Self {
        weights.sort_by(|a, b| a.0.cmp(&b.0));
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        DocumentVector { weights, norm }
    }

    pub fn cosine(&self, other: &DocumentVector) -> f32 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }

        // Both sides are sorted by term: linear merge
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0;
        while i < self.weights.len() && j < other.weights.len() {
            match self.weights[i].0.cmp(&other.weights[j].0) {
                std::cmp::Ordering::Equal => {
                    dot += self.weights[i].1 * other.weights[j].1;
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        dot / (self.norm * other.norm)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentVectors {
    pub vectors: BTreeMap<DocId, DocumentVector>,
}

impl DocumentVectors {
    /// `term_frequencies[doc][term]` with document lengths and per-term
    /// document frequencies. `tf = freq / doc_len`, `idf = ln(N / df)`.
    pub fn build(
        term_frequencies: &BTreeMap<DocId, HashMap<String, u32>>,
        doc_lengths: &BTreeMap<DocId, u32>,
        doc_freqs: &HashMap<String, u32>,
    ) -> Self {
        let total_docs = term_frequencies.len() as f32;
        let mut vectors = BTreeMap::new();

        for (doc_id, freqs) in term_frequencies {
            let doc_len = doc_lengths.get(doc_id).copied().unwrap_or(0).max(1) as f32;
            let weights = freqs.iter()
                .filter_map(|(term, freq)| {
                    let df = *doc_freqs.get(term)? as f32;
                    let idf = (total_docs / df).ln();
                    Some((term.clone(), (*freq as f32 / doc_len) * idf))
                })
                .filter(|(_, weight)| *weight > 0.0)
                .collect();
            vectors.insert(doc_id.clone(), DocumentVector::new(weights));
        }

        DocumentVectors { vectors }
    }

    pub fn get(&self, doc_id: &DocId) -> Option<&DocumentVector> {
        self.vectors.get(doc_id)
    }

    /// The `k` most similar other documents by cosine similarity.
    pub fn most_similar(&self, doc_id: &DocId, k: usize) -> Vec<(DocId, f32)> {
        let Some(target) = self.vectors.get(doc_id) else {
            return vec![];
        };

        let mut scored: Vec<(DocId, f32)> = self.vectors.iter()
            .filter(|(id, _)| *id != doc_id)
            .map(|(id, vector)| (id.clone(), target.cosine(vector)))
            .filter(|(_, similarity)| *similarity > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}
