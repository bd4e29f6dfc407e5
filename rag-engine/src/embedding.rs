//! Embedding provider trait and the validating client wrapped around it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. Errors from the network should surface as
/// [`RagError::Transport`], malformed answers as [`RagError::Format`]; both
/// are retried by the ingestion pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// A short name used in errors and logs.
    fn name(&self) -> &str;
}

/// Wraps an [`EmbeddingProvider`] with input and output validation.
///
/// Ingestion and retrieval share one client so stored and query vectors come
/// from the same model.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingClient {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// The wrapped provider's name.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for empty or whitespace-only text; the
    ///   provider is not called.
    /// - [`RagError::Format`] if the provider returns an empty vector or one
    ///   containing NaN or infinite values.
    /// - Any error the provider itself returns.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Validation("cannot embed empty text".into()));
        }
        debug!(provider = self.provider.name(), text_len = text.len(), "embedding text");
        let vector = self.provider.embed(text).await?;
        validate_vector(self.provider.name(), vector)
    }
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient").field("provider", &self.provider.name()).finish()
    }
}

/// Reject empty vectors and non-finite elements.
pub fn validate_vector(provider: &str, vector: Vec<f32>) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(RagError::format(provider, "embedding is empty"));
    }
    if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
        return Err(RagError::format(
            provider,
            format!("embedding element {position} is not a finite number"),
        ));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FixedProvider {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn client(vector: Vec<f32>) -> (EmbeddingClient, Arc<FixedProvider>) {
        let provider = Arc::new(FixedProvider { vector, calls: AtomicUsize::new(0) });
        (EmbeddingClient::new(provider.clone()), provider)
    }

    #[tokio::test]
    async fn blank_text_fails_without_calling_provider() {
        let (client, provider) = client(vec![1.0]);
        let err = client.embed("   \n").await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
        assert!(!err.is_retryable());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nan_and_empty_vectors_are_format_errors() {
        let (nan_client, _) = client(vec![0.1, f32::NAN]);
        assert!(matches!(nan_client.embed("text").await, Err(RagError::Format { .. })));

        let (empty_client, _) = client(Vec::new());
        assert!(matches!(empty_client.embed("text").await, Err(RagError::Format { .. })));
    }

    #[tokio::test]
    async fn default_batch_embeds_each_text() {
        let (_, provider) = client(vec![0.5, 0.5]);
        let vectors = provider.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
