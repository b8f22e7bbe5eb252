use std::collections::{BTreeMap, BTreeSet, HashMap};
use serde::{Serialize, Deserialize};
use crate::core::types::Document;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("god", &["lord", "almighty", "creator"]),
    ("lord", &["god", "master"]),
    ("jesus", &["christ", "messiah"]),
    ("christ", &["jesus", "messiah"]),
    ("messiah", &["christ", "anointed"]),
    ("love", &["charity", "compassion"]),
    ("sin", &["transgression", "iniquity"]),
    ("heaven", &["paradise", "kingdom"]),
    ("prophet", &["seer", "messenger"]),
    ("king", &["ruler", "monarch"]),
    ("faith", &["belief", "trust"]),
    ("grace", &["mercy", "favor"]),
    ("salvation", &["redemption", "deliverance"]),
    ("law", &["commandments", "torah"]),
    ("praise", &["worship", "glory"]),
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("gen", "genesis"),
    ("ex", "exodus"),
    ("exod", "exodus"),
    ("lev", "leviticus"),
    ("num", "numbers"),
    ("deut", "deuteronomy"),
    ("josh", "joshua"),
    ("judg", "judges"),
    ("sam", "samuel"),
    ("kgs", "kings"),
    ("chr", "chronicles"),
    ("neh", "nehemiah"),
    ("ps", "psalms"),
    ("psa", "psalms"),
    ("prov", "proverbs"),
    ("eccl", "ecclesiastes"),
    ("isa", "isaiah"),
    ("jer", "jeremiah"),
    ("ezek", "ezekiel"),
    ("dan", "daniel"),
    ("matt", "matthew"),
    ("mt", "matthew"),
    ("mk", "mark"),
    ("lk", "luke"),
    ("jn", "john"),
    ("rom", "romans"),
    ("cor", "corinthians"),
    ("gal", "galatians"),
    ("eph", "ephesians"),
    ("phil", "philippians"),
    ("heb", "hebrews"),
    ("rev", "revelation"),
    ("ot", "old testament"),
    ("nt", "new testament"),
];

const POPULAR_QUERIES: &[&str] = &[
    "love",
    "faith",
    "hope",
    "creation",
    "prayer",
    "forgiveness",
    "john 3:16",
    "psalm 23",
    "ten commandments",
    "lord's prayer",
    "david and goliath",
    "noah's ark",
    "sermon on the mount",
    "good samaritan",
    "prodigal son",
];

/// `(category, trigger keywords, terms to add)`
const CONTEXTUAL_RULES: &[(&str, &[&str], &[&str])] = &[
    ("creation", &["genesis", "creation", "beginning"], &["creation", "heavens", "earth"]),
    ("exodus", &["exodus", "moses", "pharaoh", "egypt"], &["deliverance", "covenant", "wilderness"]),
    ("gospels", &["matthew", "mark", "luke", "john"], &["jesus", "disciples", "kingdom"]),
    ("wisdom", &["proverbs", "ecclesiastes", "wisdom", "job"], &["wisdom", "understanding", "fear"]),
    ("prophets", &["isaiah", "jeremiah", "ezekiel", "prophecy"], &["prophet", "judgment", "restoration"]),
    ("christmas", &["christmas", "nativity", "bethlehem", "advent"], &["birth", "shepherds", "magi"]),
    ("easter", &["easter", "resurrection", "crucifixion", "cross"], &["resurrection", "tomb", "risen"]),
    ("pentecost", &["pentecost", "spirit"], &["spirit", "tongues", "church"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteEntry {
    pub text: String,
    pub frequency: u32,
}

/// Topical or seasonal rule: a query mentioning any keyword gains the terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualRule {
    pub category: String,
    pub keywords: Vec<String>,
    pub terms: Vec<String>,
}

/// Query-side data published next to the shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxiliaryData {
    pub synonyms: BTreeMap<String, Vec<String>>,
    pub abbreviations: BTreeMap<String, String>,
    pub popular_queries: BTreeSet<String>,

    /// Ranked by frequency, then text
    pub autocomplete: Vec<AutocompleteEntry>,
    pub contextual_rules: Vec<ContextualRule>,
}

impl Default for AuxiliaryData {
    fn default() -> Self {
        AuxiliaryData {
            synonyms: SYNONYMS.iter()
                .map(|(term, alternatives)| {
                    (term.to_string(), alternatives.iter().map(|a| a.to_string()).collect())
                })
                .collect(),
            abbreviations: ABBREVIATIONS.iter()
                .map(|(short, long)| (short.to_string(), long.to_string()))
                .collect(),
            popular_queries: POPULAR_QUERIES.iter().map(|q| q.to_string()).collect(),
            autocomplete: Vec::new(),
            contextual_rules: CONTEXTUAL_RULES.iter()
                .map(|(category, keywords, terms)| ContextualRule {
                    category: category.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    terms: terms.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
        }
    }
}

impl AuxiliaryData {
    /// Fixed maps plus an autocomplete index over document titles.
    pub fn generate<'a, I>(documents: I, autocomplete_limit: usize) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        AuxiliaryData {
            autocomplete: build_autocomplete(documents.into_iter().map(|d| d.title.as_str()), autocomplete_limit),
            ..AuxiliaryData::default()
        }
    }

    /// Autocomplete suggestions starting with `prefix`, best first.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<&AutocompleteEntry> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return vec![];
        }
        self.autocomplete.iter()
            .filter(|entry| entry.text.starts_with(&prefix))
            .take(limit)
            .collect()
    }
}

fn title_words(title: &str) -> Vec<String> {
    title.split_whitespace()
        .map(|word| {
            word.to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Counts every 1–3 word n-gram of every title.
fn build_autocomplete<'a>(titles: impl Iterator<Item = &'a str>, limit: usize) -> Vec<AutocompleteEntry> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for title in titles {
        let words = title_words(title);
        for n in 1..=3 {
            for window in words.windows(n) {
                *counts.entry(window.join(" ")).or_default() += 1;
            }
        }
    }

    let mut entries: Vec<AutocompleteEntry> = counts.into_iter()
        .map(|(text, frequency)| AutocompleteEntry { text, frequency })
        .collect();
    entries.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.text.cmp(&b.text)));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DocId, DocumentType};

    fn doc(title: &str) -> Document {
        Document::new(DocId::new(title), DocumentType::Chapter, title, "")
    }

    #[test]
    fn test_autocomplete_ngrams_ranked() {
        let docs = vec![doc("Song of Songs 1"), doc("Song of Songs 2"), doc("Samuel 1")];
        let aux = AuxiliaryData::generate(&docs, 100);

        // "1" ties with the song n-grams at 2 and wins alphabetically
        assert_eq!(aux.autocomplete[0].frequency, 2);
        assert_eq!(aux.autocomplete[0].text, "1");
        let song = aux.autocomplete.iter().find(|e| e.text == "song of songs").unwrap();
        assert_eq!(song.frequency, 2);
        assert!(aux.autocomplete.iter().all(|e| e.text.split(' ').count() <= 3));
    }

    #[test]
    fn test_suggest_prefix() {
        let docs = vec![doc("Samuel 1"), doc("Samuel 2"), doc("Sarah")];
        let aux = AuxiliaryData::generate(&docs, 100);
        let texts: Vec<&str> = aux.suggest("Sa", 2).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["samuel", "samuel 1"]);
        assert!(aux.suggest("", 5).is_empty());
    }

    #[test]
    fn test_autocomplete_limit() {
        let docs = vec![doc("In the beginning God created")];
        let aux = AuxiliaryData::generate(&docs, 4);
        assert_eq!(aux.autocomplete.len(), 4);
    }

    #[test]
    fn test_fixed_maps_present() {
        let aux = AuxiliaryData::default();
        assert_eq!(aux.abbreviations["gen"], "genesis");
        assert!(aux.popular_queries.contains("john 3:16"));
        assert!(aux.synonyms["god"].contains(&"lord".to_string()));
        assert!(aux.contextual_rules.iter().any(|r| r.category == "christmas"));
    }
}
