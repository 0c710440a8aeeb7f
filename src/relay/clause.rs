//! Clause aggregation for incremental display
//!
//! The interpreter streams output a few characters at a time. Sending every
//! fragment to the client would make the display flicker, and waiting for the
//! whole turn would lose interactivity, so fragments are regrouped into
//! clauses: runs of same-type text cut at sentence ends and line breaks.
//!
//! # State Machine
//!
//! ```text
//!  chunk ──► excluded type? ──yes──► drop
//!               │ no
//!               ▼
//!        type changed, or buffer long enough and ends a sentence/line?
//!               │ yes                         │ no
//!               ▼                             │
//!        flush buffer:                        │
//!          contains ``` → toggle code mode    │
//!          otherwise    → emit clause         │
//!               │                             │
//!               └──────────► append chunk text ◄┘
//! ```
//!
//! Code fences never reach the client. They only switch following clauses to
//! the `code` type until the closing fence.

use serde::{Deserialize, Serialize};

use crate::interpreter::{Chunk, ChunkKind};

/// Marker that opens and closes a code block in message text.
pub const CODE_FENCE: &str = "```";

/// Default minimum clause length before punctuation can cut it.
pub const DEFAULT_MIN_CLAUSE_LEN: usize = 15;

/// Default sentence-terminal characters (full-width and half-width).
pub const DEFAULT_TERMINATORS: &[char] = &[
    '、', '。', '！', '？', '；', '…', '：', '.', '!', '?', ';', ':',
];

/// Display type of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    Message,
    Code,
    Output,
    Executing,
    /// Messages originating from the relay itself (acknowledgements)
    Assistant,
}

impl ClauseKind {
    /// Clause type for a chunk type, None for types that are never displayed
    pub fn from_chunk(kind: ChunkKind) -> Option<Self> {
        match kind {
            ChunkKind::Message => Some(ClauseKind::Message),
            ChunkKind::Code => Some(ClauseKind::Code),
            ChunkKind::Output => Some(ClauseKind::Output),
            ChunkKind::Executing => Some(ClauseKind::Executing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseKind::Message => "message",
            ClauseKind::Code => "code",
            ClauseKind::Output => "output",
            ClauseKind::Executing => "executing",
            ClauseKind::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A display-ready run of text, sent to the client as `{"type", "content"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(rename = "type")]
    pub kind: ClauseKind,
    pub content: String,
}

impl Clause {
    pub fn new(kind: ClauseKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ClauseKind::Assistant, content)
    }
}

/// When an accumulating clause may be cut short of a type change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Characters the buffer must exceed before punctuation cuts it
    pub min_len: usize,
    /// Characters that end a sentence
    pub terminators: Vec<char>,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_CLAUSE_LEN,
            terminators: DEFAULT_TERMINATORS.to_vec(),
        }
    }
}

impl FlushPolicy {
    pub fn with_min_len(min_len: usize) -> Self {
        Self {
            min_len,
            ..Self::default()
        }
    }

    /// Whether `buffer` is complete enough to send before its type changes.
    ///
    /// A trailing line break always qualifies. A trailing terminator only
    /// qualifies once the buffer is longer than `min_len` characters.
    pub fn should_flush(&self, buffer: &str) -> bool {
        match buffer.chars().last() {
            Some('\n') => true,
            Some(last) => {
                self.terminators.contains(&last) && buffer.chars().count() > self.min_len
            }
            None => false,
        }
    }
}

/// Regroups a turn's chunks into clauses.
///
/// One aggregator covers one chat turn; code-block mode starts off for every turn.
#[derive(Debug)]
pub struct ClauseAggregator {
    policy: FlushPolicy,
    buffer: String,
    current: Option<ClauseKind>,
    in_code_block: bool,
}

impl Default for ClauseAggregator {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}

impl ClauseAggregator {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            buffer: String::new(),
            current: None,
            in_code_block: false,
        }
    }

    /// Whether an opening code fence has been seen without its closing fence
    pub fn in_code_block(&self) -> bool {
        self.in_code_block
    }

    /// Feed one chunk, returning the clause it completed (if any)
    pub fn push(&mut self, chunk: &Chunk) -> Option<Clause> {
        let kind = ClauseKind::from_chunk(chunk.kind())?;
        let text = chunk.display_text()?;

        let boundary = self.current != Some(kind) || self.policy.should_flush(&self.buffer);
        let completed = if boundary { self.flush() } else { None };

        self.buffer.push_str(&text);
        self.current = Some(kind);
        completed
    }

    /// End of turn: flush whatever is still buffered
    pub fn finish(&mut self) -> Option<Clause> {
        self.flush()
    }

    fn flush(&mut self) -> Option<Clause> {
        let content = std::mem::take(&mut self.buffer);
        if content.is_empty() {
            return None;
        }

        if content.contains(CODE_FENCE) {
            self.in_code_block = !self.in_code_block;
            return None;
        }

        let kind = if self.in_code_block {
            ClauseKind::Code
        } else {
            self.current?
        };
        Some(Clause::new(kind, content))
    }
}
