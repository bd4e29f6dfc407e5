//! RAG engine orchestrator.
//!
//! The [`RagEngine`] coordinates ingestion (classify → chunk → embed → store)
//! and querying (embed → scan → re-rank → assemble context) by composing an
//! [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`] and a [`Reranker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_engine::{DocumentInput, RagConfig, RagEngine};
//!
//! let engine = RagEngine::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let stored = engine.store_documents(vec![DocumentInput::from("...")]).await;
//! let results = engine.retrieve_relevant_documents("why did the deploy fail?", None).await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, ContentAwareChunker};
use crate::config::RagConfig;
use crate::context::{ContextOutcome, assemble_context};
use crate::document::{Chunk, Document, DocumentInput, SearchResult};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::ingest::EmbeddingPipeline;
use crate::reranker::{DiversityRecencyReranker, Reranker};
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// Summary of one ingestion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents submitted.
    pub documents: usize,
    /// Documents rejected before chunking.
    pub failed_documents: usize,
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Chunks embedded and stored.
    pub stored: usize,
    /// Chunks dropped after exhausting their embedding attempts.
    pub dropped: usize,
    /// Provider calls made, including retries.
    pub attempts: u32,
}

/// The RAG engine orchestrator.
///
/// Construct one via [`RagEngine::builder()`]. Several engines may share one
/// store; document ids are drawn from the store, so their chunk ids never
/// collide.
pub struct RagEngine {
    config: RagConfig,
    client: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    pipeline: EmbeddingPipeline,
    retriever: Retriever,
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return a reference to the embedding client shared by ingestion and retrieval.
    pub fn embedding_client(&self) -> &Arc<EmbeddingClient> {
        &self.client
    }

    /// Assign an id to one document and chunk it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentFailure`] for empty or whitespace-only content.
    fn prepare_document(&self, input: DocumentInput) -> Result<(Document, Vec<Chunk>)> {
        let id = self.store.next_document_id();
        let document = input.into_document(id);
        if document.content.trim().is_empty() {
            return Err(RagError::DocumentFailure {
                document: id,
                message: "document has no content".into(),
            });
        }
        let chunks = self.chunker.chunk(&document);
        if chunks.is_empty() {
            info!(document.id = id, "document produced no chunks above the minimum size");
        }
        Ok((document, chunks))
    }

    /// Ingest documents and report per-stage counts.
    ///
    /// A document that fails preparation is counted and skipped; chunks that
    /// cannot be embedded are dropped. Neither aborts the call.
    pub async fn ingest_documents<I, D>(&self, documents: I) -> IngestReport
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentInput>,
    {
        let mut report = IngestReport::default();
        let mut chunks = Vec::new();

        for input in documents {
            report.documents += 1;
            match self.prepare_document(input.into()) {
                Ok((document, document_chunks)) => {
                    info!(
                        document.id = document.id,
                        chunk_count = document_chunks.len(),
                        "prepared document"
                    );
                    chunks.extend(document_chunks);
                }
                Err(e) => {
                    error!(error = %e, "document failed during ingestion");
                    report.failed_documents += 1;
                }
            }
        }

        report.chunks = chunks.len();
        let stats = self.pipeline.run(chunks).await;
        report.stored = stats.stored;
        report.dropped = stats.dropped;
        report.attempts = stats.attempts;

        info!(
            documents = report.documents,
            failed_documents = report.failed_documents,
            chunks = report.chunks,
            stored = report.stored,
            dropped = report.dropped,
            "ingestion finished"
        );
        report
    }

    /// Ingest documents and return the number of chunks embedded and stored.
    pub async fn store_documents<I, D>(&self, documents: I) -> usize
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentInput>,
    {
        self.ingest_documents(documents).await.stored
    }

    /// Return up to `top_k` (default `retrieval.defaultTopK`) relevant chunks.
    ///
    /// An empty `Vec` means nothing scored above the similarity threshold.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded.
    pub async fn retrieve_relevant_documents(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(query, top_k).await
    }

    /// Retrieve and assemble a character-budgeted context for a generator.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded.
    pub async fn build_context(&self, query: &str, top_k: Option<usize>) -> Result<ContextOutcome> {
        let results = self.retrieve_relevant_documents(query, top_k).await?;
        if results.is_empty() {
            warn!(query_len = query.len(), "no relevant information found");
            return Ok(ContextOutcome::NoRelevantInformation);
        }
        Ok(ContextOutcome::Found(assemble_context(
            &results,
            self.config.retrieval.max_context_chars,
        )))
    }
}

/// Builder for constructing a [`RagEngine`].
///
/// `config` and `embedding_provider` are required. The vector store defaults
/// to a fresh [`InMemoryVectorStore`], the chunker to a
/// [`ContentAwareChunker`] using the configured sizes, and the reranker to
/// [`DiversityRecencyReranker`].
///
/// # Example
///
/// ```rust,ignore
/// let engine = RagEngine::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))  // optional
///     .reranker(Arc::new(reranker))   // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the reranker applied when `retrieval.rerankResults` is enabled.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagEngine`], validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is inconsistent.
    pub fn build(self) -> Result<RagEngine> {
        let config = self.config.ok_or_else(|| RagError::Config("config is required".into()))?;
        config.validate()?;
        let provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".into()))?;

        let client = Arc::new(EmbeddingClient::new(provider));
        let store: Arc<dyn VectorStore> =
            self.vector_store.unwrap_or_else(|| Arc::new(InMemoryVectorStore::new()));
        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(ContentAwareChunker::try_new(config.chunking.clone())?),
        };
        let reranker: Arc<dyn Reranker> =
            self.reranker.unwrap_or_else(|| Arc::new(DiversityRecencyReranker::default()));

        let pipeline =
            EmbeddingPipeline::new(client.clone(), store.clone(), config.embedding.clone());
        let retriever =
            Retriever::new(client.clone(), store.clone(), reranker, config.retrieval.clone());

        Ok(RagEngine {
            config,
            client,
            store,
            chunker,
            pipeline,
            retriever,
        })
    }
}
