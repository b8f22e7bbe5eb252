use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use serde::{Serialize, Deserialize};
use crate::core::error::Result;

/// FST-backed prefix tree over a shard's vocabulary, used for autocomplete.
///
/// Stored as raw FST bytes so it travels inside the shard artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefixTree {
    /// Serialized FST mapping term -> document frequency
    bytes: Vec<u8>,

    /// Minimum prefix length to prevent abuse
    min_prefix_len: usize,

    term_count: usize,
}

impl PrefixTree {
    /// Build from `(term, document frequency)` pairs in any order.
    pub fn build<I>(terms: I, min_prefix_len: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut sorted_terms: Vec<(String, u64)> = terms.into_iter().collect();

        // FST requires sorted, unique input
        sorted_terms.sort_by(|a, b| a.0.cmp(&b.0));
        sorted_terms.dedup_by(|a, b| a.0 == b.0);

        let mut builder = MapBuilder::memory();
        for (term, freq) in &sorted_terms {
            builder.insert(term.as_bytes(), *freq)?;
        }

        Ok(PrefixTree {
            bytes: builder.into_inner()?,
            min_prefix_len,
            term_count: sorted_terms.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.term_count
    }

    pub fn is_empty(&self) -> bool {
        self.term_count == 0
    }

    /// Terms starting with `prefix`, most frequent first, ties alphabetical.
    pub fn search_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<(String, u64)>> {
        if prefix.len() < self.min_prefix_len || self.bytes.is_empty() {
            return Ok(vec![]);
        }

        let map = Map::new(self.bytes.as_slice())?;
        let prefix_bytes = prefix.as_bytes();
        let mut results = Vec::new();

        // Use FST range query for efficient prefix search
        let mut stream = map.range().ge(prefix_bytes).into_stream();
        while let Some((term_bytes, freq)) = stream.next() {
            if !term_bytes.starts_with(prefix_bytes) {
                break;
            }
            if let Ok(term) = String::from_utf8(term_bytes.to_vec()) {
                results.push((term, freq));
            }
        }

        results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(limit);
        Ok(results)
    }

    pub fn contains(&self, term: &str) -> Result<bool> {
        if self.bytes.is_empty() {
            return Ok(false);
        }
        let map = Map::new(self.bytes.as_slice())?;
        Ok(map.contains_key(term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> PrefixTree {
        PrefixTree::build(
            vec![
                ("david".to_string(), 3),
                ("daniel".to_string(), 7),
                ("day".to_string(), 7),
                ("egypt".to_string(), 2),
            ],
            1,
        ).unwrap()
    }

    #[test]
    fn test_prefix_ranked_by_frequency() {
        let results = tree().search_prefix("da", 10).unwrap();
        let terms: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["daniel", "day", "david"]);
    }

    #[test]
    fn test_limit_and_miss() {
        let tree = tree();
        assert_eq!(tree.search_prefix("da", 1).unwrap().len(), 1);
        assert!(tree.search_prefix("zz", 10).unwrap().is_empty());
        assert!(tree.contains("egypt").unwrap());
        assert!(!tree.contains("egy").unwrap());
    }

    #[test]
    fn test_empty_tree() {
        let tree = PrefixTree::default();
        assert!(tree.search_prefix("a", 5).unwrap().is_empty());
    }

    #[test]
    fn test_survives_serialization() {
        let json = serde_json::to_string(&tree()).unwrap();
        let restored: PrefixTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.search_prefix("eg", 5).unwrap()[0].0, "egypt");
    }
}
