//! Scripted embedding provider shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rag_engine::{EmbeddingProvider, RagError, Result};

/// An [`EmbeddingProvider`] whose answers are scripted per text.
///
/// Texts are matched by substring against the `vectors` script; unmatched
/// texts get the default vector. The provider counts every call and tracks
/// how many calls were in flight at once.
pub struct ScriptedProvider {
    vectors: Vec<(String, Vec<f32>)>,
    default_vector: Vec<f32>,
    fail_first: Mutex<HashMap<String, usize>>,
    always_fail: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(default_vector: Vec<f32>) -> Self {
        Self {
            vectors: Vec::new(),
            default_vector,
            fail_first: Mutex::new(HashMap::new()),
            always_fail: HashSet::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer texts containing `needle` with `vector`.
    pub fn with_vector(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.vectors.push((needle.to_string(), vector));
        self
    }

    /// Fail the first `failures` calls for texts containing `needle`.
    pub fn failing_first(self, needle: &str, failures: usize) -> Self {
        if let Ok(mut fail_first) = self.fail_first.lock() {
            fail_first.insert(needle.to_string(), failures);
        }
        self
    }

    /// Fail every call for texts containing `needle`.
    pub fn always_failing(mut self, needle: &str) -> Self {
        self.always_fail.insert(needle.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, text: &str) -> bool {
        if self.always_fail.iter().any(|needle| text.contains(needle.as_str())) {
            return true;
        }
        let mut fail_first = self.fail_first.lock().unwrap();
        for (needle, remaining) in fail_first.iter_mut() {
            if text.contains(needle.as_str()) && *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = if self.scripted_failure(text) {
            Err(RagError::transport("scripted", "connection reset"))
        } else {
            let vector = self
                .vectors
                .iter()
                .find(|(needle, _)| text.contains(needle.as_str()))
                .map(|(_, vector)| vector.clone())
                .unwrap_or_else(|| self.default_vector.clone());
            Ok(vector)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A document of about `sentences × 16` tokens about `topic`.
pub fn document_text(topic: &str, sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("The {topic} service recorded event number {i} while handling requests."))
        .collect::<Vec<_>>()
        .join(" ")
}
