//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and [`ContentAwareChunker`],
//! which classifies each document and dispatches to one of three strategies:
//!
//! - general / narrative: sentence and paragraph accumulation with word-aligned overlap
//! - structured: markdown sections, each chunked with the general strategy
//! - code: brace-depth block detection, oversized blocks split line by line
//!
//! All sizes are estimated tokens, see [`estimate_tokens`].

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::classifier::{ContentType, classify};
use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Metadata key for the chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key for the chunk creation timestamp (RFC 3339).
pub const CREATED_AT_KEY: &str = "created_at";
/// Metadata key for the classified content type.
pub const CONTENT_TYPE_KEY: &str = "content_type";
/// Metadata key for the number of leading characters repeated from the previous chunk.
pub const OVERLAP_CHARS_KEY: &str = "overlap_chars";
/// Metadata key for the enclosing markdown header text.
pub const SECTION_HEADER_KEY: &str = "section_header";
/// Metadata key for the enclosing markdown header level (0 before the first header).
pub const SECTION_LEVEL_KEY: &str = "section_level";
/// Metadata key for the kind of code block (`declaration` or `module`).
pub const BLOCK_KIND_KEY: &str = "block_kind";
/// Metadata key for the first source line of a code chunk (1-based).
pub const START_LINE_KEY: &str = "start_line";
/// Metadata key for the last source line of a code chunk (1-based).
pub const END_LINE_KEY: &str = "end_line";

/// Estimate the token count of `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_for_chars(text.chars().count())
}

fn estimate_tokens_for_chars(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with content and metadata; embeddings
/// are computed later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no content worth keeping.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Chooses a splitting strategy per document from its classified content type.
///
/// # Example
///
/// ```rust,ignore
/// use rag_engine::{ChunkingConfig, ContentAwareChunker, Chunker};
///
/// let chunker = ContentAwareChunker::new(ChunkingConfig::default());
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct ContentAwareChunker {
    config: ChunkingConfig,
}

impl ContentAwareChunker {
    /// Create a chunker bounded by the given token sizes.
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Create a chunker, rejecting sizes that cannot produce chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] if `max_chunk_size` is zero or not
    /// larger than the overlap.
    pub fn try_new(config: ChunkingConfig) -> Result<Self> {
        if config.max_chunk_size == 0 {
            return Err(RagError::Chunking("max_chunk_size must be greater than zero".into()));
        }
        if config.overlap_size >= config.max_chunk_size {
            return Err(RagError::Chunking(format!(
                "overlap ({}) must be less than max_chunk_size ({})",
                config.overlap_size, config.max_chunk_size
            )));
        }
        Ok(Self::new(config))
    }

    /// Split prose into overlapping pieces, see [`split_prose`].
    fn prose_pieces(&self, text: &str) -> Vec<Piece> {
        split_prose(text, &self.config)
    }

    fn structured_pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for section in parse_sections(text) {
            for mut piece in self.prose_pieces(&section.body) {
                piece.structure.push((SECTION_HEADER_KEY, section.header.clone()));
                piece.structure.push((SECTION_LEVEL_KEY, section.level.to_string()));
                pieces.push(piece);
            }
        }
        pieces
    }

    fn code_pieces(&self, text: &str) -> Vec<Piece> {
        let max = self.config.max_chunk_size;
        let mut pieces = Vec::new();
        for block in detect_code_blocks(text) {
            let lines = &block.lines;
            let whole = lines.join("\n");
            if whole.trim().is_empty() {
                continue;
            }
            if estimate_tokens(&whole) <= max {
                pieces.push(block.piece(whole, 0, lines.len()));
                continue;
            }

            // Oversized block: greedy line packing, no overlap between sub-chunks.
            let mut start = 0;
            let mut buffer = String::new();
            for (offset, line) in lines.iter().enumerate() {
                let extra = usize::from(!buffer.is_empty()) + line.chars().count();
                if !buffer.is_empty()
                    && estimate_tokens_for_chars(buffer.chars().count() + extra) > max
                {
                    let content = std::mem::take(&mut buffer);
                    if !content.trim().is_empty() {
                        pieces.push(block.piece(content, start, offset));
                    }
                    start = offset;
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(line);
            }
            if !buffer.trim().is_empty() {
                pieces.push(block.piece(buffer, start, lines.len()));
            }
        }
        pieces
    }
}

impl Chunker for ContentAwareChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }

        let content_type = classify(&document.content, document.type_hint());
        let pieces = match content_type {
            ContentType::Code => self.code_pieces(&document.content),
            ContentType::Structured => self.structured_pieces(&document.content),
            ContentType::Narrative | ContentType::General => {
                self.prose_pieces(&document.content)
            }
        };

        let mut builder = ChunkBuilder::new(document, content_type);
        let chunks: Vec<Chunk> = pieces.into_iter().map(|piece| builder.build(piece)).collect();
        debug!(
            document.id = document.id,
            content_type = %content_type,
            chunk_count = chunks.len(),
            "chunked document"
        );
        chunks
    }
}

/// Chunk text plus the structural metadata its strategy attached.
#[derive(Debug, Clone, PartialEq)]
struct Piece {
    content: String,
    structure: Vec<(&'static str, String)>,
}

impl Piece {
    fn new(content: String) -> Self {
        Self { content, structure: Vec::new() }
    }
}

/// Assigns ids, token estimates and merged metadata to every chunk of a document.
struct ChunkBuilder<'a> {
    document: &'a Document,
    content_type: ContentType,
    created_at: String,
    next_index: usize,
}

impl<'a> ChunkBuilder<'a> {
    fn new(document: &'a Document, content_type: ContentType) -> Self {
        Self {
            document,
            content_type,
            created_at: chrono::Utc::now().to_rfc3339(),
            next_index: 0,
        }
    }

    fn build(&mut self, piece: Piece) -> Chunk {
        let index = self.next_index;
        self.next_index += 1;

        let mut metadata: HashMap<String, String> = self.document.metadata.clone();
        metadata.insert(CHUNK_INDEX_KEY.to_string(), index.to_string());
        metadata.insert(CREATED_AT_KEY.to_string(), self.created_at.clone());
        metadata.insert(CONTENT_TYPE_KEY.to_string(), self.content_type.to_string());
        for (key, value) in piece.structure {
            metadata.insert(key.to_string(), value);
        }

        Chunk {
            id: Chunk::compose_id(self.document.id, index),
            document_id: self.document.id,
            index,
            token_count: estimate_tokens(&piece.content),
            content: piece.content,
            metadata,
        }
    }
}

// ── general / narrative ─────────────────────────────────────────────

/// A sentence, flagged when it opens a new paragraph.
struct Unit<'t> {
    text: &'t str,
    paragraph_start: bool,
}

/// Split text into trimmed sentences, remembering paragraph boundaries.
fn split_units(text: &str) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    for paragraph in text.split("\n\n") {
        let mut paragraph_start = true;
        let mut start = 0;
        let mut chars = paragraph.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if !at_boundary {
                continue;
            }
            let end = pos + c.len_utf8();
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                units.push(Unit { text: sentence, paragraph_start });
                paragraph_start = false;
            }
            start = end;
        }
        let rest = paragraph[start..].trim();
        if !rest.is_empty() {
            units.push(Unit { text: rest, paragraph_start });
        }
    }
    units
}

/// The last `overlap_tokens` worth of `text`, starting on a word boundary.
fn overlap_tail(text: &str, overlap_tokens: usize) -> &str {
    let budget = overlap_tokens * 4;
    if budget == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= budget {
        return text.trim();
    }

    let cut = text.char_indices().nth(total - budget).map_or(text.len(), |(i, _)| i);
    let starts_on_word = text[..cut].ends_with(char::is_whitespace);
    let tail = &text[cut..];
    let aligned = if starts_on_word {
        tail
    } else {
        match tail.find(char::is_whitespace) {
            Some(ws) => &tail[ws..],
            None => "",
        }
    };
    aligned.trim()
}

/// Split `text` at the last word boundary that keeps the head within
/// `budget_chars`. `None` when not even the first word fits.
fn split_to_fit(text: &str, budget_chars: usize) -> Option<(&str, &str)> {
    let mut cut = None;
    for (chars, (pos, c)) in text.char_indices().enumerate() {
        if chars > budget_chars {
            break;
        }
        if c.is_whitespace() {
            cut = Some(pos);
        }
    }
    let (head, rest) = text.split_at(cut?);
    let (head, rest) = (head.trim_end(), rest.trim_start());
    (!head.is_empty() && !rest.is_empty()).then_some((head, rest))
}

/// Accumulate sentence units into chunks bounded by `max_chunk_size`.
///
/// A buffer is emitted once the next unit would overflow it and it already
/// holds `min_chunk_size` tokens; the following buffer is seeded with the
/// word-aligned overlap tail of the emitted chunk. A buffer still short of
/// `min_chunk_size` is topped up with the leading words of the overflowing
/// unit instead, so only a single sentence longer than `max_chunk_size` can
/// exceed it. A trailing buffer below `min_chunk_size` is dropped.
fn split_prose(text: &str, config: &ChunkingConfig) -> Vec<Piece> {
    let max = config.max_chunk_size;
    let min = config.min_chunk_size;

    let mut pieces = Vec::new();
    let mut buffer = String::new();
    let mut overlap_chars = 0usize;
    let mut units: VecDeque<Unit<'_>> = split_units(text).into();

    while let Some(unit) = units.pop_front() {
        let separator = match (buffer.is_empty(), unit.paragraph_start) {
            (true, _) => "",
            (false, true) => "\n\n",
            (false, false) => " ",
        };
        let projected =
            buffer.chars().count() + separator.len() + unit.text.chars().count();

        if !buffer.is_empty()
            && estimate_tokens_for_chars(projected) > max
            && estimate_tokens(&buffer) >= min
        {
            let tail = overlap_tail(&buffer, config.overlap_size).to_string();
            pieces.push(prose_piece(std::mem::take(&mut buffer), overlap_chars));

            let seeded_chars = tail.chars().count() + 1 + unit.text.chars().count();
            if !tail.is_empty() && estimate_tokens_for_chars(seeded_chars) <= max {
                overlap_chars = tail.chars().count() + 1;
                buffer = format!("{tail} {}", unit.text);
            } else {
                overlap_chars = 0;
                buffer = unit.text.to_string();
            }
            continue;
        }

        if !buffer.is_empty() && estimate_tokens_for_chars(projected) > max {
            let used = buffer.chars().count() + separator.len();
            if let Some((head, rest)) = split_to_fit(unit.text, (max * 4).saturating_sub(used)) {
                buffer.push_str(separator);
                buffer.push_str(head);
                units.push_front(Unit { text: rest, paragraph_start: false });
                continue;
            }
        }

        buffer.push_str(separator);
        buffer.push_str(unit.text);
    }

    if !buffer.is_empty() {
        if estimate_tokens(&buffer) >= min {
            pieces.push(prose_piece(buffer, overlap_chars));
        } else {
            debug!(
                tokens = estimate_tokens(&buffer),
                min_chunk_size = min,
                "dropping trailing remainder below minimum chunk size"
            );
        }
    }

    pieces
}

fn prose_piece(content: String, overlap_chars: usize) -> Piece {
    let mut piece = Piece::new(content);
    if overlap_chars > 0 {
        piece.structure.push((OVERLAP_CHARS_KEY, overlap_chars.to_string()));
    }
    piece
}

// ── structured ──────────────────────────────────────────────────────

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*#*\s*$")
        .expect("unreachable error: invalid header pattern")
});

/// A markdown section: its header text, nesting level and body.
struct Section {
    header: String,
    level: usize,
    body: String,
}

/// Parse markdown text into sections split at header lines.
///
/// Text before the first header becomes a section with an empty header and level 0.
fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section { header: String::new(), level: 0, body: String::new() };

    for line in text.lines() {
        let header = HEADER_LINE.captures(line);
        match header {
            Some(caps) => {
                let next = Section {
                    header: caps[2].to_string(),
                    level: caps[1].len(),
                    body: String::new(),
                };
                let finished = std::mem::replace(&mut current, next);
                if !finished.body.trim().is_empty() {
                    sections.push(finished);
                }
            }
            None => {
                current.body.push_str(line);
                current.body.push('\n');
            }
        }
    }
    if !current.body.trim().is_empty() {
        sections.push(current);
    }
    sections
}

// ── code ────────────────────────────────────────────────────────────

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(export\s+)?(default\s+)?(pub(\([^)]*\))?\s+)?((public|private|protected|static|abstract|async|unsafe|const)\s+)*(function|class|def|fn|impl|struct|enum|trait|interface|mod)\b",
    )
    .expect("unreachable error: invalid declaration pattern")
});

static ARROW_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(export\s+)?(const|let|var)\s+\w+\s*=\s*(async\s*)?\([^)]*\)\s*=>")
        .expect("unreachable error: invalid arrow declaration pattern")
});

fn is_declaration(line: &str) -> bool {
    DECLARATION.is_match(line) || ARROW_DECLARATION.is_match(line)
}

/// Net brace depth change of one line.
fn brace_delta(line: &str) -> (i64, bool) {
    let opens = line.matches('{').count() as i64;
    let closes = line.matches('}').count() as i64;
    (opens - closes, opens > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Declaration,
    Module,
}

impl BlockKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Declaration => "declaration",
            Self::Module => "module",
        }
    }
}

/// A run of source lines: one declaration, or the loose lines between declarations.
struct CodeBlock<'t> {
    kind: BlockKind,
    first_line: usize,
    lines: Vec<&'t str>,
}

impl CodeBlock<'_> {
    /// Build a piece covering `lines[from..to]` of this block.
    fn piece(&self, content: String, from: usize, to: usize) -> Piece {
        let mut piece = Piece::new(content);
        piece.structure.push((BLOCK_KIND_KEY, self.kind.as_str().to_string()));
        piece.structure.push((START_LINE_KEY, (self.first_line + from).to_string()));
        piece.structure.push((END_LINE_KEY, (self.first_line + to.max(from + 1) - 1).to_string()));
        piece
    }
}

/// Scan line by line, tracking brace depth, and cut the text into blocks.
///
/// A declaration block starts at a recognized declaration keyword and ends
/// when brace depth returns to zero. A declaration that never opens a brace
/// (Python, one-line signatures) ends at the next blank line or declaration.
fn detect_code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current = CodeBlock { kind: BlockKind::Module, first_line: 1, lines: Vec::new() };
    let mut depth: i64 = 0;
    let mut opened = false;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let in_declaration = current.kind == BlockKind::Declaration;

        if in_declaration && !opened && (line.trim().is_empty() || is_declaration(line)) {
            let kind =
                if is_declaration(line) { BlockKind::Declaration } else { BlockKind::Module };
            let next = CodeBlock { kind, first_line: line_no, lines: Vec::new() };
            flush(&mut blocks, std::mem::replace(&mut current, next));
            depth = 0;
        } else if !in_declaration && is_declaration(line) {
            let next =
                CodeBlock { kind: BlockKind::Declaration, first_line: line_no, lines: Vec::new() };
            flush(&mut blocks, std::mem::replace(&mut current, next));
            depth = 0;
            opened = false;
        }

        current.lines.push(line);

        if current.kind == BlockKind::Declaration {
            let (delta, has_open) = brace_delta(line);
            depth += delta;
            opened |= has_open;
            if opened && depth <= 0 {
                let next = CodeBlock {
                    kind: BlockKind::Module,
                    first_line: line_no + 1,
                    lines: Vec::new(),
                };
                flush(&mut blocks, std::mem::replace(&mut current, next));
                depth = 0;
                opened = false;
            }
        }
    }
    flush(&mut blocks, current);
    blocks
}

fn flush<'t>(blocks: &mut Vec<CodeBlock<'t>>, block: CodeBlock<'t>) {
    if !block.lines.is_empty() {
        blocks.push(block);
    }
}
