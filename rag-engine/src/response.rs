//! Parsing of raw embedding-service responses.
//!
//! Embedding services disagree on the response envelope. [`ProviderResponse`]
//! names every accepted shape explicitly and [`ProviderResponse::into_vector`]
//! turns it into one validated vector or a [`RagError::Format`].

use serde::Deserialize;
use serde_json::Value;

use crate::embedding::validate_vector;
use crate::error::{RagError, Result};

/// The response envelopes accepted from an embedding service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProviderResponse {
    /// `{"embeddings": [[...]]}` as returned by batch-style endpoints.
    Batch {
        /// One vector per input (or a single bare vector).
        embeddings: Vec<Value>,
    },
    /// `{"embedding": [...]}` as returned by single-input endpoints.
    Single {
        /// The vector.
        embedding: Value,
    },
    /// `{"data": [{"embedding": [...]}]}` as returned by OpenAI-compatible endpoints.
    Data {
        /// One entry per input.
        data: Vec<DataEntry>,
    },
    /// A bare JSON array.
    Bare(Vec<Value>),
}

/// One entry of a [`ProviderResponse::Data`] envelope.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataEntry {
    /// The vector.
    pub embedding: Value,
}

impl ProviderResponse {
    /// Parse a JSON body into a known envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Format`] if the body matches none of the envelopes.
    pub fn parse(provider: &str, body: Value) -> Result<Self> {
        serde_json::from_value(body).map_err(|_| {
            RagError::format(provider, "response matches no known embedding envelope")
        })
    }

    /// Extract the single embedding vector this response carries.
    ///
    /// Single-element nesting such as `[[0.1, 0.2]]` is unwrapped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Format`] if the payload is not exactly one
    /// non-empty vector of finite numbers.
    pub fn into_vector(self, provider: &str) -> Result<Vec<f32>> {
        let payload = match self {
            Self::Batch { embeddings } => Value::Array(embeddings),
            Self::Single { embedding } => embedding,
            Self::Data { mut data } => {
                if data.len() != 1 {
                    return Err(RagError::format(
                        provider,
                        format!("expected one data entry, got {}", data.len()),
                    ));
                }
                data.remove(0).embedding
            }
            Self::Bare(values) => Value::Array(values),
        };
        numeric_vector(provider, payload)
    }
}

/// Unwrap single-element nesting, then read every element as a number.
fn numeric_vector(provider: &str, mut payload: Value) -> Result<Vec<f32>> {
    loop {
        match payload {
            Value::Array(mut items) if items.len() == 1 && items[0].is_array() => {
                payload = items.remove(0);
            }
            Value::Array(items) => {
                let vector = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        item.as_f64().map(|x| x as f32).ok_or_else(|| {
                            RagError::format(provider, format!("element {i} is not a number"))
                        })
                    })
                    .collect::<Result<Vec<f32>>>()?;
                return validate_vector(provider, vector);
            }
            other => {
                return Err(RagError::format(
                    provider,
                    format!("expected an array of numbers, got {other}"),
                ));
            }
        }
    }
}
