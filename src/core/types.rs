use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Stable document identifier, e.g. `chapter-genesis-1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        DocId(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        ShardId(id.into())
    }

    pub fn numbered(n: usize) -> Self {
        ShardId(format!("shard-{:02}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Book,
    Chapter,
    Entity,
    Category,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Book,
        DocumentType::Chapter,
        DocumentType::Entity,
        DocumentType::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Book => "book",
            DocumentType::Chapter => "chapter",
            DocumentType::Entity => "entity",
            DocumentType::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    Old,
    New,
}

impl Testament {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "old" | "ot" | "old testament" => Some(Testament::Old),
            "new" | "nt" | "new testament" => Some(Testament::New),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Testament::Old => "old",
            Testament::New => "new",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A searchable record produced by the index builder. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub doc_type: DocumentType,
    pub title: String,
    pub body: String,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub boost: f32,
}

impl Document {
    pub fn new(id: DocId, doc_type: DocumentType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Document {
            id,
            doc_type,
            title: title.into(),
            body: body.into(),
            metadata: BTreeMap::new(),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn add_metadata(&mut self, key: &str, value: MetadataValue) {
        self.metadata.insert(key.to_string(), value);
    }

    pub fn get_metadata(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    pub fn testament(&self) -> Option<Testament> {
        self.get_metadata("testament")
            .and_then(MetadataValue::as_text)
            .and_then(Testament::parse)
    }

    pub fn tags(&self) -> &[String] {
        self.get_metadata("tags")
            .and_then(MetadataValue::as_list)
            .unwrap_or(&[])
    }
}
