//! Retrieval-augmented generation engine.
//!
//! This crate provides:
//! - Content-type classification and content-aware chunking
//! - Embedding with retries, batching and bounded concurrency
//! - An in-memory vector store with cosine-similarity search
//! - Diversity and recency re-ranking, and character-budgeted context assembly
//!
//! The [`RagEngine`] composes these behind two calls:
//! [`RagEngine::store_documents`] and [`RagEngine::retrieve_relevant_documents`].
//!
//! # Features
//!
//! - `http` enables [`http::HttpEmbeddingProvider`] and the `rag-query` binary.

pub mod chunking;
pub mod classifier;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod inmemory;
pub mod reranker;
pub mod response;
pub mod retriever;
pub mod retry;
pub mod similarity;
pub mod telemetry;
pub mod vectorstore;

#[cfg(feature = "http")]
pub mod http;

pub use chunking::{Chunker, ContentAwareChunker, estimate_tokens};
pub use classifier::{ContentType, classify};
pub use config::{ChunkingConfig, EmbeddingConfig, RagConfig, RagConfigBuilder, RetrievalConfig};
pub use context::{AssembledContext, ContextOutcome, NO_RELEVANT_INFORMATION, assemble_context};
pub use document::{Chunk, Document, DocumentInput, SearchResult, VectorRecord};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use engine::{IngestReport, RagEngine, RagEngineBuilder};
pub use error::{RagError, Result};
pub use ingest::{EmbeddingPipeline, PipelineStats};
pub use inmemory::InMemoryVectorStore;
pub use reranker::{DiversityRecencyReranker, NoOpReranker, Reranker};
pub use response::ProviderResponse;
pub use retriever::{Retriever, rank_by_similarity};
pub use retry::RetryPolicy;
pub use similarity::{checked_cosine_similarity, cosine_similarity};
pub use telemetry::init_tracing;
pub use vectorstore::VectorStore;
