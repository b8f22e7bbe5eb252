use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};

/// One book with its per-chapter summaries, keyed by chapter number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookSource {
    pub name: String,
    pub slug: String,
    pub testament: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub chapter_summaries: BTreeMap<String, String>,
}

impl BookSource {
    /// Chapter keys in numeric order; non-numeric keys sort after, by text.
    pub fn ordered_chapters(&self) -> Vec<(&str, &str)> {
        let mut chapters: Vec<(&str, &str)> = self.chapter_summaries.iter()
            .map(|(key, summary)| (key.as_str(), summary.as_str()))
            .collect();
        chapters.sort_by(|a, b| {
            let left = a.0.trim().parse::<u32>().ok();
            let right = b.0.trim().parse::<u32>().ok();
            match (left, right) {
                (Some(l), Some(r)) => l.cmp(&r),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.0.cmp(b.0),
            }
        });
        chapters
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitySource {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub aliases: Vec<String>,
    pub is_popular: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorySource {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub testament: Option<String>,
    pub books: Vec<String>,
}

/// Content bundle handed over by the content-preparation layer.
///
/// A missing group means zero documents of that type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSources {
    pub books: Vec<BookSource>,
    pub entities: Vec<EntitySource>,
    pub categories: Vec<CategorySource>,
}

impl ContentSources {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::build(format!("malformed content sources: {}", e)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::build(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty() && self.entities.is_empty() && self.categories.is_empty()
    }

    /// Reject records that cannot produce stable, unique document ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut claim = |id: String| -> Result<()> {
            if seen.insert(id.clone()) {
                Ok(())
            } else {
                Err(Error::build(format!("duplicate document id {}", id)))
            }
        };

        for book in &self.books {
            if book.slug.trim().is_empty() {
                return Err(Error::build(format!("book '{}' has no slug", book.name)));
            }
            if book.name.trim().is_empty() {
                return Err(Error::build(format!("book {} has no name", book.slug)));
            }
            claim(format!("book-{}", book.slug))?;
            for (chapter, _) in book.ordered_chapters() {
                if chapter.trim().is_empty() {
                    return Err(Error::build(format!("book {} has an unnamed chapter", book.slug)));
                }
                claim(format!("chapter-{}-{}", book.slug, chapter.trim()))?;
            }
        }

        for entity in &self.entities {
            if entity.id.trim().is_empty() || entity.name.trim().is_empty() {
                return Err(Error::build(format!("entity '{}' needs both id and name", entity.name)));
            }
            claim(format!("entity-{}", entity.id))?;
        }

        for category in &self.categories {
            if category.slug.trim().is_empty() || category.name.trim().is_empty() {
                return Err(Error::build(format!("category '{}' needs both slug and name", category.name)));
            }
            claim(format!("category-{}", category.slug))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn test_missing_groups_are_empty() {
        let sources = ContentSources::from_json(
            r#"{"books":[{"name":"Genesis","slug":"genesis","chapterSummaries":{"1":"In the beginning"}}]}"#,
        ).unwrap();
        assert_eq!(sources.books.len(), 1);
        assert!(sources.entities.is_empty());
        assert!(sources.categories.is_empty());
        assert_eq!(sources.books[0].chapter_summaries["1"], "In the beginning");
        assert!(sources.validate().is_ok());
    }

    #[test]
    fn test_camel_case_fields() {
        let sources = ContentSources::from_json(
            r#"{"entities":[{"id":"moses","name":"Moses","isPopular":true,"tags":["prophet"]}]}"#,
        ).unwrap();
        assert!(sources.entities[0].is_popular);
        assert_eq!(sources.entities[0].tags, vec!["prophet"]);
    }

    #[test]
    fn test_malformed_bundle_is_build_error() {
        let err = ContentSources::from_json("{\"books\": 7}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Build);
    }

    #[test]
    fn test_chapters_ordered_numerically() {
        let mut book = BookSource::default();
        for key in ["10", "2", "1"] {
            book.chapter_summaries.insert(key.into(), String::new());
        }
        let keys: Vec<&str> = book.ordered_chapters().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let entity = EntitySource {
            id: "moses".into(),
            name: "Moses".into(),
            ..Default::default()
        };
        let sources = ContentSources {
            entities: vec![entity.clone(), entity],
            ..Default::default()
        };
        assert_eq!(sources.validate().unwrap_err().kind, ErrorKind::Build);
    }

    #[test]
    fn test_missing_slug_rejected() {
        let sources = ContentSources {
            books: vec![BookSource { name: "Ruth".into(), ..Default::default() }],
            ..Default::default()
        };
        assert!(sources.validate().is_err());
    }
}
