use crate::build::partition::{book_group, entity_group, CATEGORY_GROUP};
use crate::build::sources::{BookSource, CategorySource, ContentSources, EntitySource};
use crate::core::types::{DocId, Document, DocumentType, MetadataValue};

pub const BOOK_BOOST: f32 = 1.5;
pub const CHAPTER_BOOST: f32 = 1.0;
pub const ENTITY_BOOST: f32 = 1.1;
pub const POPULAR_ENTITY_BOOST: f32 = 1.3;
pub const CATEGORY_BOOST: f32 = 0.8;

/// A document together with the content group that routes it to a shard.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub group: String,
    pub document: Document,
}

/// Maps content sources to documents with type-specific boosts and metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn extract(&self, sources: &ContentSources) -> Vec<ExtractedDocument> {
        let mut extracted = Vec::new();

        for book in &sources.books {
            let group = book_group(&book.slug);
            extracted.push(ExtractedDocument { group: group.clone(), document: self.book(book) });
            for (chapter, summary) in book.ordered_chapters() {
                extracted.push(ExtractedDocument {
                    group: group.clone(),
                    document: self.chapter(book, chapter.trim(), summary),
                });
            }
        }

        for entity in &sources.entities {
            extracted.push(ExtractedDocument {
                group: entity_group(&entity.name),
                document: self.entity(entity),
            });
        }

        for category in &sources.categories {
            extracted.push(ExtractedDocument {
                group: CATEGORY_GROUP.to_string(),
                document: self.category(category),
            });
        }

        extracted
    }

    pub fn book(&self, book: &BookSource) -> Document {
        let body = match &book.description {
            Some(description) if !description.trim().is_empty() => description.clone(),
            _ => describe_book(book),
        };

        let mut doc = Document::new(
            DocId::new(format!("book-{}", book.slug)),
            DocumentType::Book,
            book.name.clone(),
            body,
        ).with_boost(BOOK_BOOST);

        doc.add_metadata("book", MetadataValue::Text(book.slug.clone()));
        doc.add_metadata("chapters", MetadataValue::Number(book.chapter_summaries.len() as f64));
        add_book_context(&mut doc, book);
        doc
    }

    pub fn chapter(&self, book: &BookSource, chapter: &str, summary: &str) -> Document {
        let mut doc = Document::new(
            DocId::new(format!("chapter-{}-{}", book.slug, chapter)),
            DocumentType::Chapter,
            format!("{} {}", book.name, chapter),
            summary,
        ).with_boost(CHAPTER_BOOST);

        doc.add_metadata("book", MetadataValue::Text(book.slug.clone()));
        doc.add_metadata("book_name", MetadataValue::Text(book.name.clone()));
        match chapter.parse::<u32>() {
            Ok(number) => doc.add_metadata("chapter", MetadataValue::Number(number as f64)),
            Err(_) => doc.add_metadata("chapter", MetadataValue::Text(chapter.to_string())),
        }
        add_book_context(&mut doc, book);
        doc
    }

    /// Aliases and tags are appended to the body so they are searchable.
    pub fn entity(&self, entity: &EntitySource) -> Document {
        let mut body = entity.description.clone();
        if !entity.aliases.is_empty() {
            body.push_str(&format!(" Also known as {}.", entity.aliases.join(", ")));
        }
        if !entity.tags.is_empty() {
            body.push_str(&format!(" {}", entity.tags.join(" ")));
        }

        let boost = if entity.is_popular { POPULAR_ENTITY_BOOST } else { ENTITY_BOOST };
        let mut doc = Document::new(
            DocId::new(format!("entity-{}", entity.id)),
            DocumentType::Entity,
            entity.name.clone(),
            body.trim().to_string(),
        ).with_boost(boost);

        doc.add_metadata("tags", MetadataValue::List(entity.tags.clone()));
        doc.add_metadata("aliases", MetadataValue::List(entity.aliases.clone()));
        doc.add_metadata("popular", MetadataValue::Boolean(entity.is_popular));
        doc
    }

    pub fn category(&self, category: &CategorySource) -> Document {
        let mut doc = Document::new(
            DocId::new(format!("category-{}", category.slug)),
            DocumentType::Category,
            category.name.clone(),
            category.description.clone(),
        ).with_boost(CATEGORY_BOOST);

        if let Some(testament) = &category.testament {
            doc.add_metadata("testament", MetadataValue::Text(testament.clone()));
        }
        doc.add_metadata("books", MetadataValue::List(category.books.clone()));
        doc
    }
}

fn add_book_context(doc: &mut Document, book: &BookSource) {
    if let Some(testament) = &book.testament {
        doc.add_metadata("testament", MetadataValue::Text(testament.clone()));
    }
    if let Some(category) = &book.category {
        doc.add_metadata("category", MetadataValue::Text(category.clone()));
    }
}

fn describe_book(book: &BookSource) -> String {
    let mut parts = vec![format!("The book of {}", book.name)];
    if let Some(testament) = &book.testament {
        parts.push(format!("in the {} Testament", capitalize(testament)));
    }
    if let Some(category) = &book.category {
        parts.push(format!("among the {} books", category));
    }
    let mut text = parts.join(" ");
    if !book.chapter_summaries.is_empty() {
        text.push_str(&format!(", {} chapters", book.chapter_summaries.len()));
    }
    text.push('.');
    text
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
