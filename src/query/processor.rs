use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::analysis::Analyzer;
use crate::build::auxiliary::AuxiliaryData;
use crate::core::config::QueryConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Testament;
use crate::query::cache::{QueryCache, QueryCacheStats, QueryKey};
use crate::query::patterns::QueryPatterns;
use crate::query::types::{
    ProcessedQuery, QueryBoosts, QueryComplexity, QueryFilters, QueryIntent, QueryPhrase, SearchOptions,
};

struct ContextRule {
    keywords: HashSet<String>,
    terms: Vec<String>,
}

/// Turns raw query strings into `ProcessedQuery` values.
///
/// Never fails: anything that goes wrong inside the pipeline yields the
/// fallback interpretation instead.
pub struct QueryProcessor {
    config: QueryConfig,
    analyzer: Arc<Analyzer>,
    patterns: QueryPatterns,
    abbreviations: HashMap<String, String>,
    /// Analyzed term -> analyzed alternatives
    synonyms: HashMap<String, Vec<String>>,
    /// Normalized popular queries
    popular: HashSet<String>,
    contextual: Vec<ContextRule>,
    cache: QueryCache,
}

impl QueryProcessor {
    pub fn new(config: QueryConfig, auxiliary: &AuxiliaryData, analyzer: Arc<Analyzer>) -> Result<Self> {
        let mut synonyms: HashMap<String, Vec<String>> = HashMap::new();
        for (term, alternatives) in &auxiliary.synonyms {
            for key in analyzer.extract_terms(term) {
                let entry = synonyms.entry(key).or_default();
                for alternative in alternatives.iter().flat_map(|a| analyzer.extract_terms(a)) {
                    if !entry.contains(&alternative) {
                        entry.push(alternative);
                    }
                }
            }
        }

        let contextual = auxiliary.contextual_rules.iter()
            .map(|rule| ContextRule {
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                terms: rule.terms.iter().flat_map(|t| analyzer.extract_terms(t)).collect(),
            })
            .collect();

        let mut processor = QueryProcessor {
            cache: QueryCache::new(config.cache_capacity),
            config,
            analyzer,
            patterns: QueryPatterns::new()?,
            abbreviations: auxiliary.abbreviations.iter()
                .map(|(short, long)| (short.to_lowercase(), long.to_lowercase()))
                .collect(),
            synonyms,
            popular: HashSet::new(),
            contextual,
        };
        let popular: HashSet<String> = auxiliary.popular_queries.iter()
            .map(|query| processor.normalize(query))
            .collect();
        processor.popular = popular;

        Ok(processor)
    }

    /// Cached by (query, options); equal inputs return the same instance.
    pub fn process_query(&self, raw: &str, options: &SearchOptions) -> Arc<ProcessedQuery> {
        let key = QueryKey::new(raw, options);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let processed = match self.try_process(raw, options) {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, "Query processing failed, using fallback interpretation");
                self.fallback(raw, options)
            }
        };

        debug!(
            query = raw,
            intent = ?processed.intent,
            complexity = ?processed.complexity,
            terms = processed.terms.len(),
            phrases = processed.phrases.len(),
            fallback = processed.is_fallback,
            "Query processed"
        );

        let processed = Arc::new(processed);
        self.cache.put(key, processed.clone());
        processed
    }

    pub fn cache_stats(&self) -> QueryCacheStats {
        self.cache.stats()
    }

    /// Lower-case, expand abbreviations word by word, rewrite `c:v`
    /// references, collapse whitespace. Quoted spans are kept verbatim
    /// apart from whitespace.
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase();
        let mut parts = Vec::new();
        let mut last = 0;
        for quoted in self.patterns.quoted.find_iter(&lowered) {
            parts.push(self.expand_words(&lowered[last..quoted.start()]));
            parts.push(collapse_whitespace(quoted.as_str()));
            last = quoted.end();
        }
        parts.push(self.expand_words(&lowered[last..]));
        collapse_whitespace(&parts.join(" "))
    }

    fn expand_words(&self, text: &str) -> String {
        let expanded: Vec<String> = text.split_whitespace()
            .map(|word| {
                let bare = word.trim_end_matches('.');
                match self.abbreviations.get(bare) {
                    Some(long) => long.clone(),
                    None => word.to_string(),
                }
            })
            .collect();
        self.patterns.expand_references(&expanded.join(" "))
    }

    pub fn classify(&self, normalized: &str) -> QueryIntent {
        if self.patterns.reference.is_match(normalized) {
            QueryIntent::Reference
        } else if self.patterns.entity.is_match(normalized) {
            QueryIntent::Entity
        } else if self.patterns.topical.is_match(normalized) {
            QueryIntent::Topical
        } else if self.popular.contains(normalized) {
            QueryIntent::Popular
        } else {
            QueryIntent::General
        }
    }

    fn try_process(&self, raw: &str, options: &SearchOptions) -> Result<ProcessedQuery> {
        if raw.chars().count() > self.config.max_query_length {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("query longer than {} characters", self.config.max_query_length),
            ));
        }

        let normalized = self.normalize(raw);
        let intent = self.classify(&normalized);
        let (phrases, remaining) = self.extract_phrases(&normalized);

        let mut terms = Vec::new();
        for term in self.analyzer.extract_terms(&remaining) {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }

        let mut expanded_terms = terms.clone();
        for term in &terms {
            if let Some(alternatives) = self.synonyms.get(term) {
                for alternative in alternatives {
                    if !expanded_terms.contains(alternative) {
                        expanded_terms.push(alternative.clone());
                    }
                }
            }
        }

        let words: HashSet<&str> = normalized.split_whitespace().collect();
        let mut contextual_match = false;
        for rule in &self.contextual {
            if rule.keywords.iter().any(|k| words.contains(k.as_str())) {
                contextual_match = true;
                for term in &rule.terms {
                    if !expanded_terms.contains(term) {
                        expanded_terms.push(term.clone());
                    }
                }
            }
        }

        let filters = self.detect_filters(raw, &normalized).overridden_by(&options.filters);

        let factors = &self.config.boosts;
        let popular = self.popular.contains(&normalized);
        let boosts = QueryBoosts {
            popular_query: if popular { factors.popular_query } else { 1.0 },
            exact_match: if terms.len() == 1 { factors.exact_match } else { 1.0 },
            phrase_match: if phrases.is_empty() { 1.0 } else { factors.phrase_match },
            contextual_match: if contextual_match { factors.contextual_match } else { 1.0 },
            reference: if intent == QueryIntent::Reference { factors.reference } else { 1.0 },
            fallback: 1.0,
        };

        let complexity = complexity(terms.len(), phrases.len(), filters.count(), intent);

        Ok(ProcessedQuery {
            original: raw.to_string(),
            normalized,
            terms,
            expanded_terms,
            phrases,
            filters,
            boosts,
            intent,
            complexity,
            is_fallback: false,
        })
    }

    /// Quoted phrases first, then known phrases from 2–4 word windows.
    /// Returns the phrases and the text left for term extraction.
    fn extract_phrases(&self, normalized: &str) -> (Vec<QueryPhrase>, String) {
        let mut phrases: Vec<QueryPhrase> = Vec::new();
        let push = |text: &str, phrases: &mut Vec<QueryPhrase>| {
            let terms = self.analyzer.extract_terms(text);
            if !terms.is_empty() && !phrases.iter().any(|p| p.terms == terms) {
                phrases.push(QueryPhrase { text: text.to_string(), terms });
            }
        };

        for capture in self.patterns.quoted.captures_iter(normalized) {
            if let Some(text) = capture.get(1) {
                push(text.as_str().trim(), &mut phrases);
            }
        }

        let remaining = self.patterns.quoted.replace_all(normalized, " ").replace('"', " ");
        let words: Vec<&str> = remaining.split_whitespace().collect();
        for size in (2..=4).rev() {
            for window in words.windows(size) {
                let candidate = window.join(" ");
                if self.patterns.is_known_phrase(&candidate) {
                    push(&candidate, &mut phrases);
                }
            }
        }

        (phrases, remaining)
    }

    fn detect_filters(&self, raw: &str, normalized: &str) -> QueryFilters {
        let mut filters = QueryFilters {
            content_types: self.patterns.content_types(raw),
            ..QueryFilters::default()
        };
        if self.patterns.old_testament.is_match(normalized) {
            filters.testament = Some(Testament::Old);
        } else if self.patterns.new_testament.is_match(normalized) {
            filters.testament = Some(Testament::New);
        }
        filters
    }

    /// Whitespace tokens of the raw query with the fallback boost.
    pub fn fallback(&self, raw: &str, options: &SearchOptions) -> ProcessedQuery {
        let bounded: String = raw.chars().take(self.config.max_query_length).collect();
        let mut terms: Vec<String> = Vec::new();
        for word in bounded.split_whitespace().map(str::to_lowercase) {
            if word.chars().count() > 1 && !terms.contains(&word) {
                terms.push(word);
            }
        }

        let filters = options.filters.clone();
        let complexity = complexity(terms.len(), 0, filters.count(), QueryIntent::General);
        ProcessedQuery {
            original: raw.to_string(),
            normalized: terms.join(" "),
            expanded_terms: terms.clone(),
            terms,
            phrases: Vec::new(),
            filters,
            boosts: QueryBoosts {
                fallback: self.config.boosts.fallback,
                ..QueryBoosts::default()
            },
            intent: QueryIntent::General,
            complexity,
            is_fallback: true,
        }
    }
}

fn complexity(terms: usize, phrases: usize, filters: usize, intent: QueryIntent) -> QueryComplexity {
    let score = 0.5 * terms as f32 + phrases as f32 + 0.3 * filters as f32 + intent.weight();
    QueryComplexity::from_score(score)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocumentType;

    fn processor() -> QueryProcessor {
        QueryProcessor::new(
            QueryConfig::default(),
            &AuxiliaryData::default(),
            Arc::new(Analyzer::standard()),
        ).unwrap()
    }

    fn process(query: &str) -> Arc<ProcessedQuery> {
        processor().process_query(query, &SearchOptions::default())
    }

    #[test]
    fn test_reference_query() {
        let query = process("john 3:16");
        assert_eq!(query.intent, QueryIntent::Reference);
        assert_eq!(query.normalized, "john chapter 3 verse 16");
        assert!(query.normalized.split(' ').any(|w| w == "chapter"));
        assert!(query.normalized.split(' ').any(|w| w == "verse"));
        assert_eq!(query.boosts.reference, 1.5);
        assert!(!query.is_fallback);
    }

    #[test]
    fn test_popular_query() {
        let query = process("Love");
        assert_eq!(query.intent, QueryIntent::Popular);
        assert!(query.boosts.popular_query > 1.0);
        assert_eq!(query.boosts.exact_match, 1.2);
        assert!(query.expanded_terms.contains(&"charity".to_string()));
    }

    #[test]
    fn test_entity_and_topical_intent() {
        assert_eq!(process("who is Moses").intent, QueryIntent::Entity);
        assert_eq!(process("psalms about hope").intent, QueryIntent::Topical);
        assert_eq!(process("shepherd").intent, QueryIntent::General);
    }

    #[test]
    fn test_abbreviations_expand_whole_words() {
        let p = processor();
        assert_eq!(p.normalize("Gen   1"), "genesis 1");
        assert_eq!(p.normalize("exodus"), "exodus");
        assert_eq!(p.normalize("Matt. 5:3"), "matthew chapter 5 verse 3");
    }

    #[test]
    fn test_quoted_and_known_phrases() {
        let query = process(r#""in the beginning" and the good samaritan"#);
        let texts: Vec<&str> = query.phrases.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["in the beginning", "good samaritan"]);
        assert_eq!(query.phrases[0].terms, vec!["beginn"]);
        assert!(!query.terms.contains(&"beginn".to_string()));
        assert!(query.terms.contains(&"samaritan".to_string()));
        assert_eq!(query.boosts.phrase_match, 1.4);
    }

    #[test]
    fn test_quoted_text_is_not_rewritten() {
        let query = process(r#""the ex wife" gen 1:1"#);
        assert_eq!(query.normalized, r#""the ex wife" genesis chapter 1 verse 1"#);
        assert_eq!(query.phrases[0].text, "the ex wife");

        let query = process(r#"ex "John  3:16" "#);
        assert_eq!(query.normalized, r#"exodus "john 3:16""#);
        assert_eq!(query.phrases[0].text, "john 3:16");
    }

    #[test]
    fn test_contextual_expansion() {
        let query = process("moses in egypt");
        assert_eq!(query.boosts.contextual_match, 1.2);
        assert!(query.expanded_terms.contains(&"covenant".to_string()));
    }

    #[test]
    fn test_filters_detected_and_overridden() {
        let query = process("old testament books");
        assert_eq!(query.filters.testament, Some(Testament::Old));
        assert!(query.filters.content_types.contains(&DocumentType::Book));

        let options = SearchOptions::default()
            .with_filters(QueryFilters::default().with_testament(Testament::New));
        let query = processor().process_query("ot prophets", &options);
        assert_eq!(query.filters.testament, Some(Testament::New));
    }

    #[test]
    fn test_complexity() {
        assert_eq!(process("shepherd").complexity, QueryComplexity::Simple);
        assert_eq!(process("shepherd flock pasture water").complexity, QueryComplexity::Medium);
        assert_eq!(
            process(r#""kingdom of heaven" "son of man" sheep goats wheat tares vine"#).complexity,
            QueryComplexity::Complex
        );
    }

    #[test]
    fn test_overlong_query_falls_back() {
        let long = "word ".repeat(200);
        let query = process(&long);
        assert!(query.is_fallback);
        assert_eq!(query.boosts.fallback, 0.8);
        assert_eq!(query.terms, vec!["word"]);
        assert!((query.boosts.product() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_processing_is_cached_and_idempotent() {
        let p = processor();
        let options = SearchOptions::default();
        let first = p.process_query("who is David", &options);
        let second = p.process_query("who is David", &options);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(p.cache_stats().hit_count, 1);

        let fresh = processor().process_query("who is David", &options);
        assert_eq!(*first, *fresh);
    }

    #[test]
    fn test_empty_query() {
        let query = process("   ");
        assert!(query.is_empty());
        assert!(!query.is_fallback);
    }
}
