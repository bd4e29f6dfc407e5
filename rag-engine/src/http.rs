//! Embedding provider that calls an HTTP embedding service.
//!
//! This module is only available when the `http` feature is enabled.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::response::ProviderResponse;

const PROVIDER: &str = "http";

/// An [`EmbeddingProvider`] that POSTs `{"model", "input"}` to an endpoint.
///
/// The response may use any envelope [`ProviderResponse`] accepts, so the
/// same provider works against Ollama-style, OpenAI-compatible and plain
/// array endpoints.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::http::HttpEmbeddingProvider;
///
/// let provider =
///     HttpEmbeddingProvider::new("http://localhost:11434/api/embed", "nomic-embed-text")?
///         .with_api_key("secret");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingProvider {
    /// Create a provider for `endpoint` using `model`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the endpoint or model is empty.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let model = model.into();
        if endpoint.trim().is_empty() {
            return Err(RagError::Config("embedding endpoint must not be empty".into()));
        }
        if model.trim().is_empty() {
            return Err(RagError::Config("embedding model must not be empty".into()));
        }
        Ok(Self { client: reqwest::Client::new(), endpoint, model, api_key: None })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest { model: &self.model, input: text });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            RagError::transport(PROVIDER, format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "embedding service returned an error");
            return Err(RagError::transport(PROVIDER, format!("service returned {status}: {body}")));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::format(PROVIDER, format!("response is not JSON: {e}"))
        })?;

        ProviderResponse::parse(PROVIDER, body)?.into_vector(PROVIDER)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
