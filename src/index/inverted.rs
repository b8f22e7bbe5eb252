use std::collections::{BTreeMap, BTreeSet, HashMap};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::analysis::Analyzer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::size::{estimate_record, SizeEstimator};
use crate::core::types::{DocId, Document, DocumentType, MetadataValue, ShardId, Testament};
use crate::index::bloom::BloomFilter;
use crate::index::posting::{TermEntry, TermPosting};
use crate::index::prefix::PrefixTree;
use crate::index::vectors::DocumentVectors;

/// What a shard keeps about each of its documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocId,
    pub doc_type: DocumentType,
    pub title: String,
    pub body: String,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub boost: f32,

    /// Terms in the title+body sequence
    pub length: u32,

    /// Terms at positions below this came from the title
    pub title_length: u32,

    /// Analyzed tag terms
    pub tag_terms: BTreeSet<String>,
}

impl DocumentSummary {
    pub fn testament(&self) -> Option<Testament> {
        self.metadata.get("testament")
            .and_then(MetadataValue::as_text)
            .and_then(Testament::parse)
    }

    pub fn is_title_position(&self, position: u32) -> bool {
        position < self.title_length
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardMetadata {
    pub document_count: usize,
    pub term_count: usize,
    pub average_document_length: f32,
    pub created_at: DateTime<Utc>,
    pub content_types: BTreeSet<DocumentType>,
    pub estimated_bytes: usize,
}

impl Default for ShardMetadata {
    fn default() -> Self {
        ShardMetadata {
            document_count: 0,
            term_count: 0,
            average_document_length: 0.0,
            created_at: Utc::now(),
            content_types: BTreeSet::new(),
            estimated_bytes: 0,
        }
    }
}

/// A complete, independently searchable inverted index over one partition.
///
/// Built once by the index builder and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardIndex {
    pub id: ShardId,
    pub documents: BTreeMap<DocId, DocumentSummary>,
    pub terms: BTreeMap<String, TermEntry>,
    pub metadata: ShardMetadata,
    pub bloom: BloomFilter,
    pub prefix: PrefixTree,
    pub vectors: DocumentVectors,
}

impl ShardIndex {
    pub fn new(id: ShardId) -> Self {
        ShardIndex {
            id,
            documents: BTreeMap::new(),
            terms: BTreeMap::new(),
            metadata: ShardMetadata::default(),
            bloom: BloomFilter::default(),
            prefix: PrefixTree::default(),
            vectors: DocumentVectors::default(),
        }
    }

    /// Index the document's title followed by its body. Each term gets one
    /// posting, so its document frequency rises by exactly one.
    pub fn add_document(&mut self, doc: &Document, analyzer: &Analyzer) -> Result<()> {
        if self.documents.contains_key(&doc.id) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("document {} already indexed in {}", doc.id, self.id),
            ));
        }

        let title_terms = analyzer.extract_terms(&doc.title);
        let body_terms = analyzer.extract_terms(&doc.body);
        let title_length = title_terms.len() as u32;

        // Group positions by term
        let mut term_positions: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (position, term) in title_terms.into_iter().chain(body_terms).enumerate() {
            term_positions.entry(term)
                .or_default()
                .push(position as u32);
        }
        let length = term_positions.values().map(|p| p.len() as u32).sum();

        for (term, positions) in term_positions {
            let posting = TermPosting {
                document_id: doc.id.clone(),
                term_frequency: positions.len() as u32,
                positions,
            };
            self.terms.entry(term.clone())
                .or_insert_with(|| TermEntry::new(&term))
                .add_posting(posting);
        }

        let tag_terms = doc.tags().iter()
            .flat_map(|tag| analyzer.extract_terms(tag))
            .collect();

        self.documents.insert(doc.id.clone(), DocumentSummary {
            id: doc.id.clone(),
            doc_type: doc.doc_type,
            title: doc.title.clone(),
            body: doc.body.clone(),
            metadata: doc.metadata.clone(),
            boost: doc.boost,
            length,
            title_length,
            tag_terms,
        });

        Ok(())
    }

    /// Optimization pass: posting order and term statistics, then the bloom
    /// filter, prefix tree, document vectors and shard metadata.
    pub fn finalize(&mut self, estimator: &dyn SizeEstimator) -> Result<()> {
        for entry in self.terms.values_mut() {
            entry.optimize();
        }

        self.bloom = BloomFilter::from_terms(self.terms.keys().map(String::as_str));
        self.prefix = PrefixTree::build(
            self.terms.values().map(|e| (e.term.clone(), e.document_frequency as u64)),
            1,
        )?;

        let mut term_frequencies: BTreeMap<DocId, HashMap<String, u32>> = self.documents.keys()
            .map(|id| (id.clone(), HashMap::new()))
            .collect();
        let mut doc_freqs = HashMap::with_capacity(self.terms.len());
        for entry in self.terms.values() {
            doc_freqs.insert(entry.term.clone(), entry.document_frequency);
            for posting in &entry.postings {
                if let Some(freqs) = term_frequencies.get_mut(&posting.document_id) {
                    freqs.insert(entry.term.clone(), posting.term_frequency);
                }
            }
        }
        let doc_lengths = self.documents.iter()
            .map(|(id, summary)| (id.clone(), summary.length))
            .collect();
        self.vectors = DocumentVectors::build(&term_frequencies, &doc_lengths, &doc_freqs);

        let total_length: u64 = self.documents.values().map(|d| d.length as u64).sum();
        self.metadata.document_count = self.documents.len();
        self.metadata.term_count = self.terms.len();
        self.metadata.average_document_length = if self.documents.is_empty() {
            0.0
        } else {
            total_length as f32 / self.documents.len() as f32
        };
        self.metadata.content_types = self.documents.values().map(|d| d.doc_type).collect();
        self.metadata.estimated_bytes = 0;
        self.metadata.estimated_bytes = estimate_record(estimator, &*self);

        Ok(())
    }

    pub fn term(&self, term: &str) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    pub fn document(&self, id: &DocId) -> Option<&DocumentSummary> {
        self.documents.get(id)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn holds_type(&self, doc_type: DocumentType) -> bool {
        self.metadata.content_types.contains(&doc_type)
    }

    /// False means the term is definitely not in this shard.
    pub fn might_contain(&self, term: &str) -> bool {
        self.bloom.contains(term)
    }

    pub fn might_contain_any(&self, terms: &[String]) -> bool {
        terms.iter().any(|term| self.might_contain(term))
    }

    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Result<Vec<(String, u64)>> {
        self.prefix.search_prefix(prefix, limit)
    }

    pub fn similar_documents(&self, id: &DocId, k: usize) -> Vec<(DocId, f32)> {
        self.vectors.most_similar(id, k)
    }

    /// Structural problems with this shard; empty when it is sound.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.metadata.document_count != self.documents.len() {
            issues.push(format!(
                "metadata lists {} documents, shard holds {}",
                self.metadata.document_count,
                self.documents.len()
            ));
        }
        if self.metadata.term_count != self.terms.len() {
            issues.push(format!(
                "metadata lists {} terms, shard holds {}",
                self.metadata.term_count,
                self.terms.len()
            ));
        }

        for (term, entry) in &self.terms {
            if term != &entry.term || !entry.is_consistent() {
                issues.push(format!("term '{}' has inconsistent postings", term));
                continue;
            }
            if let Some(posting) = entry.postings.iter().find(|p| !self.documents.contains_key(&p.document_id)) {
                issues.push(format!("term '{}' references unknown document {}", term, posting.document_id));
            }
        }

        issues
    }

    pub fn verify_integrity(&self) -> Result<()> {
        match self.integrity_issues().into_iter().next() {
            None => Ok(()),
            Some(issue) => Err(Error::new(ErrorKind::InvalidState, format!("{}: {}", self.id, issue))),
        }
    }
}
