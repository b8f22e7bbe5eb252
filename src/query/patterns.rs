use std::collections::BTreeSet;
use regex::Regex;
use crate::core::error::Result;
use crate::core::types::DocumentType;

/// Multi-word phrases recognised in 2–4 word windows of a query.
pub const KNOWN_PHRASES: &[&str] = &[
    "ten commandments",
    "sermon on the mount",
    "lord's prayer",
    "good samaritan",
    "prodigal son",
    "garden of eden",
    "tower of babel",
    "red sea",
    "promised land",
    "burning bush",
    "holy spirit",
    "kingdom of god",
    "kingdom of heaven",
    "son of man",
    "lamb of god",
    "last supper",
    "david and goliath",
    "noah's ark",
    "fruit of the spirit",
    "armor of god",
    "new jerusalem",
    "day of atonement",
    "golden calf",
    "walls of jericho",
    "born again",
];

const CONTENT_TYPE_KEYWORDS: &[(&str, DocumentType)] = &[
    ("book", DocumentType::Book),
    ("books", DocumentType::Book),
    ("chapter", DocumentType::Chapter),
    ("chapters", DocumentType::Chapter),
    ("person", DocumentType::Entity),
    ("people", DocumentType::Entity),
    ("character", DocumentType::Entity),
    ("characters", DocumentType::Entity),
    ("category", DocumentType::Category),
    ("categories", DocumentType::Category),
];

/// Compiled patterns used by the query processor.
pub struct QueryPatterns {
    pub chapter_verse: Regex,
    pub reference: Regex,
    pub entity: Regex,
    pub topical: Regex,
    pub quoted: Regex,
    pub old_testament: Regex,
    pub new_testament: Regex,
    known_phrases: BTreeSet<String>,
}

impl QueryPatterns {
    pub fn new() -> Result<Self> {
        Ok(QueryPatterns {
            chapter_verse: Regex::new(r"\b(\d+):(\d+(?:-\d+)?)\b")?,
            reference: Regex::new(r"\b[a-z]+\s+\d+\b|\b(?:chapter|verse)s?\b")?,
            entity: Regex::new(r"\b(?:who|what|where)\s+(?:is|was|are|were)\b")?,
            topical: Regex::new(r"\b(?:about|topics?|themes?)\b")?,
            quoted: Regex::new(r#""([^"]*)""#)?,
            old_testament: Regex::new(r"\bold\s+testament\b")?,
            new_testament: Regex::new(r"\bnew\s+testament\b")?,
            known_phrases: KNOWN_PHRASES.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// `3:16` becomes `chapter 3 verse 16`.
    pub fn expand_references(&self, text: &str) -> String {
        self.chapter_verse
            .replace_all(text, "chapter $1 verse $2")
            .into_owned()
    }

    pub fn is_known_phrase(&self, candidate: &str) -> bool {
        self.known_phrases.contains(candidate)
    }

    /// Content types named by keywords in the raw query.
    pub fn content_types(&self, text: &str) -> BTreeSet<DocumentType> {
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter_map(|word| {
                CONTENT_TYPE_KEYWORDS.iter()
                    .find(|(keyword, _)| *keyword == word)
                    .map(|(_, doc_type)| *doc_type)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_references() {
        let patterns = QueryPatterns::new().unwrap();
        assert_eq!(patterns.expand_references("john 3:16"), "john chapter 3 verse 16");
        assert_eq!(patterns.expand_references("psalm 23:1-6"), "psalm chapter 23 verse 1-6");
        assert_eq!(patterns.expand_references("no reference"), "no reference");
    }

    #[test]
    fn test_intent_patterns() {
        let patterns = QueryPatterns::new().unwrap();
        assert!(patterns.reference.is_match("genesis 1"));
        assert!(patterns.reference.is_match("first chapter of ruth"));
        assert!(!patterns.reference.is_match("love"));
        assert!(patterns.entity.is_match("who is moses"));
        assert!(patterns.topical.is_match("verses about hope"));
        assert!(!patterns.topical.is_match("abouts"));
    }

    #[test]
    fn test_quoted_capture() {
        let patterns = QueryPatterns::new().unwrap();
        let phrases: Vec<&str> = patterns.quoted
            .captures_iter(r#"find "in the beginning" and "light""#)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
        assert_eq!(phrases, vec!["in the beginning", "light"]);
    }

    #[test]
    fn test_content_type_keywords() {
        let patterns = QueryPatterns::new().unwrap();
        let types = patterns.content_types("Books about kings, and people");
        assert!(types.contains(&DocumentType::Book));
        assert!(types.contains(&DocumentType::Entity));
        assert_eq!(types.len(), 2);
    }
}
