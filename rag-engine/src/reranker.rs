//! Reranker trait for re-scoring search results.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// A reranker that re-scores and reorders search results.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// heuristics to improve on raw vector similarity. The retriever truncates
/// the reranked list to the requested size.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank search results given the original query.
    ///
    /// Receives candidates sorted by descending similarity and returns them
    /// in a new order with `rerank_score` set.
    async fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>>;
}

/// A no-op reranker that returns results unchanged.
///
/// Useful as a default when no reranking is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        Ok(results)
    }
}

/// Penalizes repeated sources and favors the opening chunk of a document.
///
/// Walking candidates in similarity order, a candidate whose source has
/// already been seen is multiplied by `diversity_penalty`, and a candidate
/// that is chunk 0 of its document by `recency_boost`:
///
/// `rerank_score = similarity × diversity × recency`
///
/// Candidates are then sorted by `rerank_score`, descending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityRecencyReranker {
    /// Multiplier for a candidate whose source already appeared.
    pub diversity_penalty: f32,
    /// Multiplier for the first chunk of a document.
    pub recency_boost: f32,
}

impl Default for DiversityRecencyReranker {
    fn default() -> Self {
        Self { diversity_penalty: 0.95, recency_boost: 1.02 }
    }
}

impl DiversityRecencyReranker {
    /// Score and reorder `results`; synchronous core of [`Reranker::rerank`].
    pub fn apply(&self, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut seen_sources = HashSet::new();
        for result in &mut results {
            let diversity =
                if seen_sources.insert(result.source()) { 1.0 } else { self.diversity_penalty };
            let recency = if result.record.chunk.index == 0 { self.recency_boost } else { 1.0 };
            result.rerank_score = Some(result.similarity * diversity * recency);
        }
        results.sort_by(|a, b| {
            b.score().partial_cmp(&a.score()).unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }
}

#[async_trait]
impl Reranker for DiversityRecencyReranker {
    async fn rerank(&self, _query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        Ok(self.apply(results))
    }
}
