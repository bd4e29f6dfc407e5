//! Similarity search over a [`VectorStore`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::RetrievalConfig;
use crate::document::{SearchResult, VectorRecord};
use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::reranker::Reranker;
use crate::similarity::checked_cosine_similarity;
use crate::vectorstore::VectorStore;

/// Score every record against `query`, keep those at or above `threshold`,
/// and sort descending by similarity.
///
/// Records whose embedding length differs from the query score 0.0; the
/// number of such records is logged.
pub fn rank_by_similarity(
    records: &[Arc<VectorRecord>],
    query: &[f32],
    threshold: f32,
) -> Vec<SearchResult> {
    let mut mismatched = 0usize;
    let mut ranked: Vec<SearchResult> = records
        .iter()
        .filter_map(|record| {
            let similarity = match checked_cosine_similarity(query, &record.embedding) {
                Ok(similarity) => similarity,
                Err(_) => {
                    mismatched += 1;
                    0.0
                }
            };
            (similarity >= threshold).then(|| SearchResult::new(record.clone(), similarity))
        })
        .collect();

    if mismatched > 0 {
        warn!(
            mismatched,
            query_dimensions = query.len(),
            "stored vectors differ in dimension from the query; scored as 0"
        );
    }

    ranked.sort_by(|a, b| {
        b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Embeds queries and ranks stored chunks against them.
///
/// The same [`EmbeddingClient`] must be used for ingestion and retrieval;
/// vectors from different models are not comparable.
pub struct Retriever {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Create a retriever over `store`.
    pub fn new(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        config: RetrievalConfig,
    ) -> Self {
        Self { client, store, reranker, config }
    }

    /// Return up to `top_k` chunks relevant to `query`, best first.
    ///
    /// Uses `defaultTopK` when `top_k` is `None`. Candidates below the
    /// similarity threshold are discarded; the best `2 × top_k` survivors are
    /// re-ranked when re-ranking is enabled and there are more than `top_k`
    /// of them. An empty result means nothing relevant was found.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded, or the
    /// reranker's error.
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.client.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let records = self.store.snapshot().await;
        let mut candidates =
            rank_by_similarity(&records, &query_embedding, self.config.similarity_threshold);
        debug!(
            scanned = records.len(),
            above_threshold = candidates.len(),
            threshold = self.config.similarity_threshold,
            "scored stored vectors"
        );
        candidates.truncate(top_k.saturating_mul(2));

        if self.config.rerank_results && candidates.len() > top_k {
            candidates = self.reranker.rerank(query, candidates).await.map_err(|e| {
                error!(error = %e, "reranking failed");
                e
            })?;
        }
        candidates.truncate(top_k);

        info!(result_count = candidates.len(), top_k, "query completed");
        Ok(candidates)
    }
}
