//! Assembly of retrieved chunks into a bounded prompt context.

use serde::Serialize;

use crate::document::SearchResult;

/// Message shown to a generator when retrieval found nothing above threshold.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the indexed documents.";

/// A character-budgeted concatenation of ranked results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    /// The context text, entries in rank order.
    pub text: String,
    /// Number of results included.
    pub included: usize,
    /// Number of results cut off by the budget.
    pub omitted: usize,
}

/// Outcome of building context for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContextOutcome {
    /// Retrieval returned nothing above the similarity threshold.
    NoRelevantInformation,
    /// At least one result was retrieved.
    Found(AssembledContext),
}

impl ContextOutcome {
    /// The context text, or [`NO_RELEVANT_INFORMATION`].
    pub fn text(&self) -> &str {
        match self {
            Self::NoRelevantInformation => NO_RELEVANT_INFORMATION,
            Self::Found(context) => &context.text,
        }
    }
}

fn format_entry(result: &SearchResult) -> String {
    format!("[Similarity: {:.3}]\n{}\n\n", result.similarity, result.content())
}

/// Concatenate results in order until the next one would exceed `max_chars`.
///
/// This is a hard stop, not best-fit packing: once one entry does not fit,
/// no later entry is considered even if it is shorter.
pub fn assemble_context(results: &[SearchResult], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut used = 0usize;
    let mut included = 0usize;

    for result in results {
        let entry = format_entry(result);
        let entry_chars = entry.chars().count();
        if used + entry_chars > max_chars {
            break;
        }
        text.push_str(&entry);
        used += entry_chars;
        included += 1;
    }

    AssembledContext { text, included, omitted: results.len() - included }
}
