//! Data types for documents, chunks, stored vectors and search results.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Metadata key naming the origin of a document (file path, log name, URL).
pub const SOURCE_KEY: &str = "source";

/// Metadata key a caller uses to declare the content type of a document.
pub const TYPE_HINT_KEY: &str = "type";

/// A document as handed to ingestion: either bare text or text with metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DocumentInput {
    /// Raw text without metadata.
    Text(String),
    /// Text with caller-supplied metadata.
    WithMetadata {
        /// The text content.
        content: String,
        /// Key-value metadata attached to every chunk of the document.
        #[serde(default)]
        metadata: HashMap<String, String>,
    },
}

impl DocumentInput {
    /// Create an input with metadata.
    pub fn with_metadata(
        content: impl Into<String>,
        metadata: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self::WithMetadata {
            content: content.into(),
            metadata: metadata.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Attach the ordinal id assigned at ingestion.
    pub fn into_document(self, id: usize) -> Document {
        match self {
            Self::Text(content) => Document { id, content, metadata: HashMap::new() },
            Self::WithMetadata { content, metadata } => Document { id, content, metadata },
        }
    }
}

impl From<&str> for DocumentInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for DocumentInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A source document with its ingestion ordinal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Ordinal assigned at ingestion, unique per engine.
    pub id: usize,
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata, caller supplied.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// The declared content type, if the caller supplied one.
    pub fn type_hint(&self) -> Option<&str> {
        self.metadata.get(TYPE_HINT_KEY).map(String::as_str)
    }
}

/// A bounded-size segment of a [`Document`], the unit of embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `{document_id}_{index}`, unique within a store.
    pub id: String,
    /// The ordinal of the parent [`Document`].
    pub document_id: usize,
    /// Position of this chunk within its document.
    pub index: usize,
    /// The text content of the chunk.
    pub content: String,
    /// Estimated token count of `content`.
    pub token_count: usize,
    /// Parent document metadata plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Compose the chunk id for a document ordinal and chunk index.
    pub fn compose_id(document_id: usize, index: usize) -> String {
        format!("{document_id}_{index}")
    }

    /// The source identifier used for diversity re-ranking.
    ///
    /// Falls back to the document ordinal when no `source` metadata is set.
    pub fn source(&self) -> String {
        self.metadata
            .get(SOURCE_KEY)
            .cloned()
            .unwrap_or_else(|| format!("document-{}", self.document_id))
    }
}

/// A stored chunk together with its embedding. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VectorRecord {
    /// Sequential id assigned by the store.
    pub id: usize,
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// A retrieved [`VectorRecord`] paired with its relevance scores.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matching record, shared with the store.
    pub record: Arc<VectorRecord>,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f32,
    /// Score after re-ranking, when a re-rank pass ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl SearchResult {
    /// Create an un-reranked result.
    pub fn new(record: Arc<VectorRecord>, similarity: f32) -> Self {
        Self { record, similarity, rerank_score: None }
    }

    /// The text content of the matching chunk.
    pub fn content(&self) -> &str {
        &self.record.chunk.content
    }

    /// The metadata of the matching chunk.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.record.chunk.metadata
    }

    /// The source identifier of the matching chunk.
    pub fn source(&self) -> String {
        self.record.chunk.source()
    }

    /// The re-rank score if present, otherwise the similarity.
    pub fn score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.similarity)
    }
}
