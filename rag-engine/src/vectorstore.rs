//! Vector store trait for storing and scanning embedded chunks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{Chunk, VectorRecord};
use crate::error::Result;

/// An append-only storage backend for embedded chunks.
///
/// Insertion is the only mutation. Implementations must assign ids
/// atomically so concurrent inserts never share or skip an id, and a scan
/// must never observe a partially written record. The store also hands out
/// document ids, so chunk ids stay unique when several engines share it.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let id = store.insert(chunk, embedding).await?;
/// let records = store.snapshot().await;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Reserve the next document id. Never returns the same id twice.
    fn next_document_id(&self) -> usize;

    /// Append a chunk with its embedding and return the assigned id.
    async fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<usize>;

    /// All records in insertion order, as of the moment of the call.
    async fn snapshot(&self) -> Vec<Arc<VectorRecord>>;

    /// Number of stored records.
    async fn len(&self) -> usize;

    /// Whether the store holds no records.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
