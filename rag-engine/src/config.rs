//! Configuration for the RAG engine.
//!
//! The serialized form uses the camelCase option names of the JSON config
//! file (`chunking.maxChunkSize`, `embedding.rateLimitDelay`, ...). Every
//! field is optional on input and falls back to its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Chunk sizing, expressed in estimated tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingConfig {
    /// Upper token bound per chunk.
    pub max_chunk_size: usize,
    /// Lower token bound a buffer must reach before it is emitted.
    pub min_chunk_size: usize,
    /// Tokens of the previous chunk carried into the next one.
    #[serde(rename = "overlap")]
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chunk_size: 512, min_chunk_size: 100, overlap_size: 50 }
    }
}

/// Batching, concurrency, retry and pacing of embedding calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    /// Chunks grouped per embedding batch.
    pub batch_size: usize,
    /// Maximum tries per chunk embedding.
    pub retry_attempts: u32,
    /// Pause between completed batches, in milliseconds.
    #[serde(rename = "rateLimitDelay")]
    pub rate_limit_delay_ms: u64,
    /// Retry backoff unit in milliseconds; attempt `n` waits `n × baseDelay`.
    #[serde(rename = "baseDelay")]
    pub base_delay_ms: u64,
    /// Maximum batches in flight.
    pub concurrency: usize,
    /// Maximum provider calls in flight across all batches.
    pub max_in_flight_requests: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            retry_attempts: 3,
            rate_limit_delay_ms: 100,
            base_delay_ms: 1000,
            concurrency: 4,
            max_in_flight_requests: 16,
        }
    }
}

impl EmbeddingConfig {
    /// Pause applied after a batch completes while more batches remain.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Backoff unit between retry attempts.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Query-time ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Result count when the caller does not pass one.
    pub default_top_k: usize,
    /// Minimum cosine similarity a record needs to be returned.
    pub similarity_threshold: f32,
    /// Apply the diversity/recency re-rank pass.
    pub rerank_results: bool,
    /// Character budget of the assembled context.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            similarity_threshold: 0.3,
            rerank_results: true,
            max_context_chars: 2000,
        }
    }
}

/// Process-wide configuration of the RAG engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Chunker settings.
    pub chunking: ChunkingConfig,
    /// Embedding pipeline settings.
    pub embedding: EmbeddingConfig,
    /// Retriever and context assembler settings.
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the JSON is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RagError::Config(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `max_chunk_size == 0` or `min_chunk_size > max_chunk_size`
    /// - `overlap_size >= max_chunk_size`
    /// - `batch_size`, `concurrency`, `max_in_flight_requests`, `retry_attempts`
    ///   or `default_top_k` is zero
    /// - `similarity_threshold` is outside `[-1, 1]`
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.max_chunk_size == 0 {
            return Err(RagError::Config("maxChunkSize must be greater than zero".into()));
        }
        if chunking.min_chunk_size > chunking.max_chunk_size {
            return Err(RagError::Config(format!(
                "minChunkSize ({}) must not exceed maxChunkSize ({})",
                chunking.min_chunk_size, chunking.max_chunk_size
            )));
        }
        if chunking.overlap_size >= chunking.max_chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be less than maxChunkSize ({})",
                chunking.overlap_size, chunking.max_chunk_size
            )));
        }

        let embedding = &self.embedding;
        for (name, value) in [
            ("batchSize", embedding.batch_size),
            ("concurrency", embedding.concurrency),
            ("maxInFlightRequests", embedding.max_in_flight_requests),
            ("retryAttempts", embedding.retry_attempts as usize),
            ("defaultTopK", self.retrieval.default_top_k),
        ] {
            if value == 0 {
                return Err(RagError::Config(format!("{name} must be greater than zero")));
            }
        }

        let threshold = self.retrieval.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(RagError::Config(format!(
                "similarityThreshold ({threshold}) must be within [-1, 1]"
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Replace the chunking section.
    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    /// Replace the embedding section.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the retrieval section.
    pub fn retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.config.retrieval = retrieval;
        self
    }

    /// Set the chunk token bounds and overlap.
    pub fn chunk_sizes(mut self, min: usize, max: usize, overlap: usize) -> Self {
        self.config.chunking =
            ChunkingConfig { max_chunk_size: max, min_chunk_size: min, overlap_size: overlap };
        self
    }

    /// Set the number of chunks per embedding batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.embedding.batch_size = size;
        self
    }

    /// Set the number of batches allowed in flight.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding.concurrency = concurrency;
        self
    }

    /// Cap the provider calls in flight across all batches.
    pub fn max_in_flight_requests(mut self, limit: usize) -> Self {
        self.config.embedding.max_in_flight_requests = limit;
        self
    }

    /// Set the retry budget and backoff unit for chunk embeddings.
    pub fn retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.config.embedding.retry_attempts = attempts;
        self.config.embedding.base_delay_ms = base_delay.as_millis() as u64;
        self
    }

    /// Set the pause between completed batches.
    pub fn rate_limit_delay(mut self, delay: Duration) -> Self {
        self.config.embedding.rate_limit_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the default number of results returned by retrieval.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.retrieval.default_top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.retrieval.similarity_threshold = threshold;
        self
    }

    /// Set the character budget of assembled context.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.retrieval.max_context_chars = chars;
        self
    }

    /// Enable or disable the diversity/recency re-rank pass.
    pub fn rerank_results(mut self, enabled: bool) -> Self {
        self.config.retrieval.rerank_results = enabled;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
