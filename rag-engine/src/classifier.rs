//! Content classification.
//!
//! [`classify`] labels a text blob so the chunker can pick a splitting
//! strategy. A caller-supplied hint always wins; otherwise an ordered set of
//! heuristics runs: code patterns, then markdown structure, then sentence
//! length.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Average words per sentence above which text counts as narrative.
const NARRATIVE_WORDS_PER_SENTENCE: f64 = 15.0;

/// The kind of content a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Source code or markup.
    Code,
    /// Markdown-like text with headers or lists.
    Structured,
    /// Prose with long sentences.
    Narrative,
    /// Anything else.
    General,
}

impl ContentType {
    /// The lowercase label used in metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Structured => "structured",
            Self::Narrative => "narrative",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "structured" => Ok(Self::Structured),
            "narrative" => Ok(Self::Narrative),
            "general" => Ok(Self::General),
            other => Err(format!("unknown content type '{other}'")),
        }
    }
}

static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // JavaScript / TypeScript functions and arrow functions
        r"(?m)^\s*(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*\w+\s*\(",
        r"(?m)^\s*(export\s+)?(const|let|var)\s+\w+\s*=\s*(async\s*)?\([^)]*\)\s*=>",
        // classes in most C-family languages and Python
        r"(?m)^\s*(export\s+)?(default\s+)?(abstract\s+)?class\s+\w+",
        // Rust
        r"(?m)^\s*(pub(\([^)]*\))?\s+)?(async\s+)?fn\s+\w+",
        r"(?m)^\s*impl(<[^>]*>)?\s+\w+",
        // Python
        r"(?m)^\s*(async\s+)?def\s+\w+\s*\(",
        // imports
        r#"(?m)^\s*import\s+[\w{}*,\s]+\s+from\s+['"]"#,
        r"(?m)^\s*import\s+[\w.]+\s*;?\s*$",
        r"(?m)^\s*from\s+[\w.]+\s+import\s+\w+",
        r"(?m)^\s*(use|using)\s+[\w:.]+\s*;",
        r#"(?m)^\s*#include\s*[<"]"#,
        // Java / C# methods
        r"(?m)^\s*(public|private|protected)\s+(static\s+)?[\w<>\[\],\s]+\s+\w+\s*\(",
        // markup
        r"(?i)<(html|head|body|div|span|script|style|template|section|table)\b[^>]*>",
        r"(?i)<\?xml\b|<!doctype\s+html",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("unreachable error: invalid code pattern"))
    .collect()
});

static STRUCTURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // markdown headers
        r"(?m)^\s{0,3}#{1,6}\s+\S",
        // numbered lists
        r"(?m)^\s*\d+[.)]\s+\S",
        // bullet lists
        r"(?m)^\s*[-*+]\s+\S",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("unreachable error: invalid structure pattern"))
    .collect()
});

/// Classify `text`, preferring a declared type hint when it names a known type.
///
/// Pure: the same `(text, hint)` always yields the same label.
pub fn classify(text: &str, hint: Option<&str>) -> ContentType {
    if let Some(declared) = hint.and_then(|h| h.parse::<ContentType>().ok()) {
        return declared;
    }

    if CODE_PATTERNS.iter().any(|re| re.is_match(text)) {
        return ContentType::Code;
    }

    if STRUCTURE_PATTERNS.iter().any(|re| re.is_match(text)) {
        return ContentType::Structured;
    }

    if average_sentence_length(text) > NARRATIVE_WORDS_PER_SENTENCE {
        return ContentType::Narrative;
    }

    ContentType::General
}

/// Word count divided by sentence count, sentences split on `.`, `!` and `?`.
fn average_sentence_length(text: &str) -> f64 {
    let sentences = text.split(['.', '!', '?']).filter(|s| !s.trim().is_empty()).count();
    if sentences == 0 {
        return 0.0;
    }
    let words = text.split_whitespace().count();
    words as f64 / sentences as f64
}
