//! Bounded-concurrency embedding of chunks into a vector store.
//!
//! [`EmbeddingPipeline::run`] groups chunks into batches and hands each batch
//! to its own task. Two counting limiters bound the load on the provider:
//!
//! - a batch limiter with `concurrency` permits, acquired by the
//!   coordinating loop in batch order (tokio's semaphore is FIFO), so at most
//!   `concurrency` batches are in flight;
//! - a request limiter with `maxInFlightRequests` permits, held only for the
//!   duration of one provider call, so the chunks of concurrent batches
//!   never exceed that many simultaneous calls.
//!
//! A batch keeps its permit through the `rateLimitDelay` pause that follows
//! it, which delays the next batch start. Every chunk is retried on its own;
//! a chunk that exhausts its attempts is dropped without affecting siblings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::EmbeddingConfig;
use crate::document::Chunk;
use crate::embedding::EmbeddingClient;
use crate::error::RagError;
use crate::retry::RetryPolicy;
use crate::vectorstore::VectorStore;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Batches dispatched.
    pub batches: usize,
    /// Chunks submitted.
    pub chunks: usize,
    /// Chunks embedded and inserted into the store.
    pub stored: usize,
    /// Chunks dropped after failing permanently.
    pub dropped: usize,
    /// Provider calls made, including retries.
    pub attempts: u32,
}

/// Shared state of one run, handed to every batch task.
struct RunContext {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    requests: Arc<Semaphore>,
    retry: RetryPolicy,
    attempts: AtomicU32,
    rate_limit_delay: Duration,
    total_batches: usize,
}

/// Embeds chunks with bounded concurrency and stores the results.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::{EmbeddingPipeline, EmbeddingConfig, InMemoryVectorStore};
///
/// let pipeline = EmbeddingPipeline::new(client, store, EmbeddingConfig::default());
/// let stats = pipeline.run(chunks).await;
/// println!("stored {} of {}", stats.stored, stats.chunks);
/// ```
#[derive(Clone)]
pub struct EmbeddingPipeline {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    config: EmbeddingConfig,
}

impl EmbeddingPipeline {
    /// Create a pipeline writing into `store`.
    pub fn new(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        config: EmbeddingConfig,
    ) -> Self {
        Self { client, store, config }
    }

    /// Embed and store `chunks`, returning what happened.
    ///
    /// Never fails as a whole: per-chunk failures are counted in
    /// [`PipelineStats::dropped`] and logged.
    pub async fn run(&self, chunks: Vec<Chunk>) -> PipelineStats {
        let chunk_count = chunks.len();
        if chunk_count == 0 {
            return PipelineStats::default();
        }

        let batch_size = self.config.batch_size.max(1);
        let total_batches = chunk_count.div_ceil(batch_size);
        let batch_limiter = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let context = Arc::new(RunContext {
            client: self.client.clone(),
            store: self.store.clone(),
            requests: Arc::new(Semaphore::new(self.config.max_in_flight_requests.max(1))),
            retry: RetryPolicy::new(self.config.retry_attempts, self.config.base_delay()),
            attempts: AtomicU32::new(0),
            rate_limit_delay: self.config.rate_limit_delay(),
            total_batches,
        });

        info!(
            chunks = chunk_count,
            batches = total_batches,
            batch_size,
            concurrency = self.config.concurrency,
            "starting embedding pipeline"
        );

        let mut tasks = JoinSet::new();
        let mut remaining = chunks.into_iter();
        for batch_index in 0..total_batches {
            let batch: Vec<Chunk> = remaining.by_ref().take(batch_size).collect();
            let permit = match batch_limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(batch = batch_index, error = %e, "batch limiter closed");
                    break;
                }
            };
            tasks.spawn(process_batch(context.clone(), batch_index, batch, permit));
        }

        let mut stored = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(batch_stored) => stored += batch_stored,
                Err(e) => error!(error = %e, "embedding batch task failed"),
            }
        }

        let stats = PipelineStats {
            batches: total_batches,
            chunks: chunk_count,
            stored,
            dropped: chunk_count - stored,
            attempts: context.attempts.load(Ordering::SeqCst),
        };
        info!(
            stored = stats.stored,
            dropped = stats.dropped,
            attempts = stats.attempts,
            "embedding pipeline finished"
        );
        stats
    }
}

/// Embed every chunk of one batch concurrently, store the successes, then
/// pause if more batches follow. Returns the number of stored chunks.
async fn process_batch(
    context: Arc<RunContext>,
    batch_index: usize,
    batch: Vec<Chunk>,
    _permit: OwnedSemaphorePermit,
) -> usize {
    let size = batch.len();
    debug!(batch = batch_index, size, "batch started");

    let outcomes =
        join_all(batch.into_iter().map(|chunk| embed_and_store(&context, chunk))).await;
    let stored = outcomes.into_iter().filter(|stored| *stored).count();

    info!(batch = batch_index, size, stored, "batch completed");

    if batch_index + 1 < context.total_batches && !context.rate_limit_delay.is_zero() {
        tokio::time::sleep(context.rate_limit_delay).await;
    }
    stored
}

/// Embed one chunk under the retry policy and insert it on success.
async fn embed_and_store(context: &RunContext, chunk: Chunk) -> bool {
    let embedding = context
        .retry
        .run(|attempt| {
            context.attempts.fetch_add(1, Ordering::SeqCst);
            let content = chunk.content.as_str();
            let chunk_id = chunk.id.as_str();
            async move {
                let _request = context
                    .requests
                    .acquire()
                    .await
                    .map_err(|e| RagError::Pipeline(format!("request limiter closed: {e}")))?;
                debug!(chunk.id = chunk_id, attempt, "requesting embedding");
                context.client.embed(content).await
            }
        })
        .await;

    match embedding {
        Ok(embedding) => {
            let chunk_id = chunk.id.clone();
            match context.store.insert(chunk, embedding).await {
                Ok(id) => {
                    debug!(chunk.id = %chunk_id, record.id = id, "stored embedding");
                    true
                }
                Err(e) => {
                    error!(chunk.id = %chunk_id, error = %e, "failed to store embedding");
                    false
                }
            }
        }
        Err(e) => {
            error!(chunk.id = %chunk.id, error = %e, "dropping chunk after failed embedding");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::error::Result;
    use crate::inmemory::InMemoryVectorStore;

    struct LengthProvider;

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    fn chunks(count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk {
                id: Chunk::compose_id(0, i),
                document_id: 0,
                index: i,
                content: "x".repeat(i + 1),
                token_count: 1,
                metadata: HashMap::new(),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn stores_every_chunk_with_unique_ids() {
        let store = Arc::new(InMemoryVectorStore::new());
        let client = Arc::new(EmbeddingClient::new(Arc::new(LengthProvider)));
        let config = EmbeddingConfig { batch_size: 3, ..EmbeddingConfig::default() };
        let pipeline = EmbeddingPipeline::new(client, store.clone(), config);

        let stats = pipeline.run(chunks(10)).await;
        assert_eq!(
            stats,
            PipelineStats { batches: 4, chunks: 10, stored: 10, dropped: 0, attempts: 10 }
        );

        let records = store.snapshot().await;
        let mut ids: Vec<usize> = records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
        for record in &records {
            assert_eq!(record.embedding[0], record.chunk.content.len() as f32);
        }
    }

    #[tokio::test]
    async fn empty_input_does_nothing() {
        let store = Arc::new(InMemoryVectorStore::new());
        let client = Arc::new(EmbeddingClient::new(Arc::new(LengthProvider)));
        let pipeline = EmbeddingPipeline::new(client, store.clone(), EmbeddingConfig::default());
        assert_eq!(pipeline.run(Vec::new()).await, PipelineStats::default());
        assert!(store.is_empty().await);
    }
}
