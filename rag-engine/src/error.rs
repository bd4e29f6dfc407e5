//! Error types for the `rag-engine` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Input was rejected before reaching the embedding provider.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The embedding provider could not be reached or returned a non-success status.
    #[error("Transport error ({provider}): {message}")]
    Transport {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider answered with something that is not a usable vector.
    #[error("Format error ({provider}): {message}")]
    Format {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Two compared vectors have different lengths.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the reference vector.
        expected: usize,
        /// Length of the compared vector.
        actual: usize,
    },

    /// Every attempt of a retried operation failed.
    #[error("Gave up after {attempts} attempt(s): {last_error}")]
    ExhaustedRetries {
        /// Number of attempts made.
        attempts: u32,
        /// The error returned by the final attempt.
        last_error: Box<RagError>,
    },

    /// A whole document could not be processed.
    #[error("Document {document} failed: {message}")]
    DocumentFailure {
        /// Ordinal id of the document.
        document: usize,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in pipeline orchestration (limiter closed, task lost).
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl RagError {
    /// Create a [`RagError::Transport`] for the given provider.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport { provider: provider.into(), message: message.into() }
    }

    /// Create a [`RagError::Format`] for the given provider.
    pub fn format(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format { provider: provider.into(), message: message.into() }
    }

    /// Whether a failed embedding attempt with this error may be tried again.
    ///
    /// Transport and format failures are transient from the caller's point of
    /// view; everything else fails immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Format { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
