//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use scripture_search::analysis::Analyzer;
use scripture_search::build::{BookSource, CategorySource, ContentSources, EntitySource};
use scripture_search::core::config::SearchConfig;
use scripture_search::core::size::StructuralSizeEstimator;
use scripture_search::core::types::{DocId, Document, DocumentType, ShardId};
use scripture_search::index::ShardIndex;

pub fn book(name: &str, slug: &str, testament: &str, chapters: &[(&str, &str)]) -> BookSource {
    let mut book = BookSource {
        name: name.to_string(),
        slug: slug.to_string(),
        testament: Some(testament.to_string()),
        ..Default::default()
    };
    for (chapter, summary) in chapters {
        book.chapter_summaries.insert(chapter.to_string(), summary.to_string());
    }
    book
}

/// A small bundle covering every document type.
pub fn scripture_sources() -> ContentSources {
    ContentSources {
        books: vec![
            book("Genesis", "genesis", "old", &[
                ("1", "In the beginning God created the heavens and the earth."),
                ("2", "God rested on the seventh day and formed man from dust."),
                ("3", "The serpent deceives Eve in the garden."),
            ]),
            book("Exodus", "exodus", "old", &[
                ("3", "Moses sees the burning bush on the mountain."),
                ("14", "The sea is parted and Israel crosses on dry ground."),
            ]),
            book("Psalms", "psalms", "old", &[
                ("23", "The Lord is my shepherd, I shall not want."),
            ]),
            book("John", "john", "new", &[
                ("1", "In the beginning was the Word, and the Word was with God."),
                ("3", "For God so loved the world. Nicodemus visits Jesus at night."),
            ]),
            book("Romans", "romans", "new", &[
                ("8", "Nothing can separate us from the love of God."),
            ]),
        ],
        entities: vec![
            EntitySource {
                id: "moses".into(),
                name: "Moses".into(),
                description: "Prophet who led Israel out of Egypt and received the law.".into(),
                tags: vec!["prophet".into(), "lawgiver".into()],
                aliases: vec![],
                is_popular: true,
            },
            EntitySource {
                id: "david".into(),
                name: "David".into(),
                description: "Shepherd boy who became king of Israel.".into(),
                tags: vec!["king".into()],
                aliases: vec!["Son of Jesse".into()],
                is_popular: false,
            },
        ],
        categories: vec![CategorySource {
            slug: "gospels".into(),
            name: "Gospels".into(),
            description: "Accounts of the life of Jesus.".into(),
            testament: Some("new".into()),
            books: vec!["john".into()],
        }],
    }
}

pub fn small_config() -> SearchConfig {
    let mut config = SearchConfig::default();
    config.index.target_shard_count = 3;
    config.index.build_workers = 2;
    config
}

/// A finalized shard holding `(id, title, body)` chapter documents.
pub fn shard(n: usize, docs: &[(&str, &str, &str)]) -> ShardIndex {
    let analyzer = Analyzer::standard();
    let mut shard = ShardIndex::new(ShardId::numbered(n));
    for (id, title, body) in docs {
        let doc = Document::new(DocId::from(*id), DocumentType::Chapter, *title, *body);
        shard.add_document(&doc, &analyzer).unwrap();
    }
    shard.finalize(&StructuralSizeEstimator::default()).unwrap();
    shard
}
