use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use crate::core::config::LoadBalanceStrategy;
use crate::core::types::{DocumentType, Testament};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Reference,
    Entity,
    Topical,
    Popular,
    General,
}

impl QueryIntent {
    /// Contribution to the complexity score
    pub fn weight(&self) -> f32 {
        match self {
            QueryIntent::Reference => 3.0,
            QueryIntent::Entity | QueryIntent::Topical => 2.0,
            QueryIntent::Popular | QueryIntent::General => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    Medium,
    Complex,
}

impl QueryComplexity {
    pub fn from_score(score: f32) -> Self {
        if score <= 2.0 {
            QueryComplexity::Simple
        } else if score <= 5.0 {
            QueryComplexity::Medium
        } else {
            QueryComplexity::Complex
        }
    }
}

/// Result filters, either detected from the query text or supplied by the
/// caller. Caller-supplied fields win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    pub testament: Option<Testament>,
    pub content_types: BTreeSet<DocumentType>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.testament.is_none() && self.content_types.is_empty()
    }

    pub fn count(&self) -> usize {
        self.testament.is_some() as usize + self.content_types.len()
    }

    pub fn with_testament(mut self, testament: Testament) -> Self {
        self.testament = Some(testament);
        self
    }

    pub fn with_content_type(mut self, doc_type: DocumentType) -> Self {
        self.content_types.insert(doc_type);
        self
    }

    /// Fields set in `explicit` replace the detected ones.
    pub fn overridden_by(mut self, explicit: &QueryFilters) -> Self {
        if explicit.testament.is_some() {
            self.testament = explicit.testament;
        }
        if !explicit.content_types.is_empty() {
            self.content_types = explicit.content_types.clone();
        }
        self
    }

    pub fn accepts(&self, doc_type: DocumentType, testament: Option<Testament>) -> bool {
        if !self.content_types.is_empty() && !self.content_types.contains(&doc_type) {
            return false;
        }
        match self.testament {
            Some(wanted) => testament == Some(wanted),
            None => true,
        }
    }

    /// Stable textual form for cache keys.
    pub fn cache_key(&self) -> String {
        let types: Vec<&str> = self.content_types.iter().map(|t| t.as_str()).collect();
        format!(
            "t={};c={}",
            self.testament.map(|t| t.as_str()).unwrap_or("*"),
            types.join(",")
        )
    }
}

/// Multiplicative boosts. Each factor is 1.0 unless its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBoosts {
    pub popular_query: f32,
    pub exact_match: f32,
    pub phrase_match: f32,
    pub contextual_match: f32,
    pub reference: f32,
    pub fallback: f32,
}

impl Default for QueryBoosts {
    fn default() -> Self {
        QueryBoosts {
            popular_query: 1.0,
            exact_match: 1.0,
            phrase_match: 1.0,
            contextual_match: 1.0,
            reference: 1.0,
            fallback: 1.0,
        }
    }
}

impl QueryBoosts {
    pub fn product(&self) -> f32 {
        self.popular_query
            * self.exact_match
            * self.phrase_match
            * self.contextual_match
            * self.reference
            * self.fallback
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPhrase {
    /// As written in the normalized query
    pub text: String,

    /// Analyzed words, in order
    pub terms: Vec<String>,
}

/// Structured form of one incoming query. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedQuery {
    pub original: String,
    pub normalized: String,
    pub terms: Vec<String>,
    pub expanded_terms: Vec<String>,
    pub phrases: Vec<QueryPhrase>,
    pub filters: QueryFilters,
    pub boosts: QueryBoosts,
    pub intent: QueryIntent,
    pub complexity: QueryComplexity,
    pub is_fallback: bool,
}

impl ProcessedQuery {
    /// Every distinct term the executor may look up: expanded terms, then
    /// phrase words.
    pub fn lookup_terms(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.expanded_terms.iter()
            .chain(self.phrases.iter().flat_map(|p| p.terms.iter()))
            .filter(|term| seen.insert(term.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded_terms.is_empty() && self.phrases.is_empty()
    }

    pub fn is_popular(&self) -> bool {
        self.boosts.popular_query > 1.0
    }
}

/// Caller-side options for one search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_results: usize,
    pub filters: QueryFilters,

    /// Shard-selection hint; the configured strategy applies when absent
    pub strategy: Option<LoadBalanceStrategy>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_results: 50,
            filters: QueryFilters::default(),
            strategy: None,
        }
    }
}

impl SearchOptions {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_strategy(mut self, strategy: LoadBalanceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}
