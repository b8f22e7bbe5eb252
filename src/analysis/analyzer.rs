use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::length::MinLengthFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::filters::suffix::SuffixStemmer;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{ReferenceTokenizer, StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Clone for Analyzer {
    fn clone(&self) -> Self {
        Analyzer {
            tokenizer: self.tokenizer.clone_box(),
            filters: self.filters.iter().map(|f| f.clone_box()).collect(),
            name: self.name.clone(),
        }
    }
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Run the pipeline. Positions are renumbered afterwards so they index
    /// the surviving term sequence.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        for (position, token) in tokens.iter_mut().enumerate() {
            token.position = position as u32;
        }

        tokens
    }

    pub fn extract_terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// Reference-aware pipeline used by both the index and the query path:
    /// punctuation stripping (keeping `-` and `:`), length and stop-word
    /// filtering, suffix stemming.
    pub fn standard() -> Self {
        Analyzer::new("standard".to_string(),
                      Box::new(ReferenceTokenizer::default()))
            .add_filter(Box::new(MinLengthFilter::new(2)))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(SuffixStemmer))
            // A stem can land on a stop word ("hers" -> "her").
            .add_filter(Box::new(StopWordFilter::english()))
    }

    /// Snowball English stemming over Unicode word boundaries.
    pub fn snowball_english() -> Self {
        Analyzer::new("snowball".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(MinLengthFilter::new(2)))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }
}

static STANDARD_ANALYZER: LazyLock<Analyzer> = LazyLock::new(Analyzer::standard);

/// Normalize `text` into its ordered term sequence with the standard analyzer.
pub fn extract_terms(text: &str) -> Vec<String> {
    STANDARD_ANALYZER.extract_terms(text)
}

/// Offsets `i` where `terms[i] == target`.
pub fn find_term_positions(terms: &[String], target: &str) -> Vec<usize> {
    terms.iter()
        .enumerate()
        .filter(|(_, term)| term.as_str() == target)
        .map(|(i, _)| i)
        .collect()
}

/// Registry for managing analyzers
#[derive(Clone)]
pub struct AnalyzerRegistry {
    analyzers: Arc<RwLock<HashMap<String, Arc<Analyzer>>>>,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: Arc::new(RwLock::new(HashMap::new())),
        };

        // Register default analyzers
        registry.register("standard", Analyzer::standard());
        registry.register("snowball", Analyzer::snowball_english());
        registry
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        self.analyzers.write().insert(name.to_string(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Analyzer>> {
        self.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("Analyzer '{}' not found", name))
        })
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        self.resolve(analyzer_name).map(|analyzer| analyzer.analyze(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_terms_pipeline() {
        let terms = extract_terms("In the beginning God created the heavens and the earth.");
        assert_eq!(terms, vec!["beginn", "god", "creat", "heaven", "earth"]);
    }

    #[test]
    fn test_extract_terms_keeps_references() {
        assert_eq!(extract_terms("John 3:16"), vec!["john", "3:16"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_terms("").is_empty());
        assert!(extract_terms("   \n\t").is_empty());
    }

    #[test]
    fn test_positions_are_renumbered_after_filtering() {
        let tokens = Analyzer::standard().analyze("the kingdom of god");
        let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(tokens[1].text, "god");
    }

    #[test]
    fn test_find_term_positions() {
        let terms: Vec<String> = ["god", "said", "god"].iter().map(|s| s.to_string()).collect();
        assert_eq!(find_term_positions(&terms, "god"), vec![0, 2]);
        assert!(find_term_positions(&terms, "light").is_empty());
    }

    #[test]
    fn test_reanalysis_is_stable() {
        let once = extract_terms("Blessings upon the nations; things were being offered!");
        let twice = extract_terms(&once.join(" "));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AnalyzerRegistry::new();
        assert!(registry.get("standard").is_some());
        assert!(registry.get("snowball").is_some());
        let err = registry.analyze("klingon", "text").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
