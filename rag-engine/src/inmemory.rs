//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a brute-force store backed
//! by a `Vec` protected by a `tokio::sync::RwLock`. Retrieval scans every
//! record, which suits corpora of moderate size.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::document::{Chunk, VectorRecord};
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// An append-only in-memory vector store.
///
/// The record id is the store size at insertion time; assignment and push
/// happen under one write lock. Records are shared as `Arc`s so scans can
/// release the lock before scoring. Document ids come from a separate
/// counter so chunks can be named before any of them is stored.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::{InMemoryVectorStore, VectorStore};
///
/// let store = Arc::new(InMemoryVectorStore::new());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<Arc<VectorRecord>>>,
    next_document_id: AtomicUsize,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn next_document_id(&self) -> usize {
        self.next_document_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<usize> {
        let mut records = self.records.write().await;
        let id = records.len();
        trace!(id, chunk.id = %chunk.id, dimensions = embedding.len(), "inserting record");
        records.push(Arc::new(VectorRecord { id, chunk, embedding }));
        Ok(id)
    }

    async fn snapshot(&self) -> Vec<Arc<VectorRecord>> {
        self.records.read().await.clone()
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn chunk(document_id: usize, index: usize) -> Chunk {
        Chunk {
            id: Chunk::compose_id(document_id, index),
            document_id,
            index,
            content: format!("chunk {index} of {document_id}"),
            token_count: 4,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = InMemoryVectorStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.insert(chunk(0, 0), vec![1.0]).await.unwrap(), 0);
        assert_eq!(store.insert(chunk(0, 1), vec![2.0]).await.unwrap(), 1);
        assert_eq!(store.len().await, 2);

        let records = store.snapshot().await;
        assert_eq!(records[1].chunk.id, "0_1");
        assert_eq!(records[1].embedding, vec![2.0]);
    }

    #[test]
    fn document_ids_are_never_reused() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.next_document_id(), 0);
        assert_eq!(store.next_document_id(), 1);
        assert_eq!(store.next_document_id(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_never_collide() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut handles = Vec::new();
        for task in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store.insert(chunk(task, i), vec![i as f32]).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = store.snapshot().await;
        assert_eq!(records.len(), 200);
        for (position, record) in records.iter().enumerate() {
            assert_eq!(record.id, position);
        }
    }
}
