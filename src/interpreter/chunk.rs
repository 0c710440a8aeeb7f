//! Typed chunks from the interpreter's streaming output
//!
//! The interpreter streams one JSON object per chunk, each carrying exactly one
//! key that names the chunk type:
//!
//! ```text
//! {"start_of_message": true}
//! {"message": "Let me check"}
//! {"message": " that."}
//! {"end_of_message": true}
//! {"language": "python"}
//! {"code": "print(1)"}
//! {"executing": {"code": "print(1)", "language": "python"}}
//! {"active_line": 1}
//! {"output": "1\n"}
//! {"end_of_execution": true}
//! ```
//!
//! Decoding turns that stringly-typed shape into the `Chunk` enum up front, so
//! the rest of the relay pattern matches instead of comparing key names.

use serde_json::Value;

/// Text inserted in place of an `executing` chunk's raw payload.
const EXECUTING_SEPARATOR: &str = "\n\n========================\nrunning...\n========================";

/// A single unit of streamed interpreter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Natural-language text from the assistant
    Message(String),
    /// A fragment of source code the assistant is writing
    Code(String),
    /// Console output produced by running code
    Output(String),
    /// The interpreter is about to run `code`
    Executing { code: String, language: String },
    /// Language of the code block that follows
    Language(String),
    /// Line currently executing (None once execution leaves the block)
    ActiveLine(Option<u64>),
    StartOfMessage,
    EndOfMessage,
    StartOfCode,
    EndOfCode,
    EndOfExecution,
}

/// The type tag of a chunk, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Message,
    Code,
    Output,
    Executing,
    Language,
    ActiveLine,
    StartOfMessage,
    EndOfMessage,
    StartOfCode,
    EndOfCode,
    EndOfExecution,
}

impl ChunkKind {
    /// Wire name of this chunk type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Message => "message",
            ChunkKind::Code => "code",
            ChunkKind::Output => "output",
            ChunkKind::Executing => "executing",
            ChunkKind::Language => "language",
            ChunkKind::ActiveLine => "active_line",
            ChunkKind::StartOfMessage => "start_of_message",
            ChunkKind::EndOfMessage => "end_of_message",
            ChunkKind::StartOfCode => "start_of_code",
            ChunkKind::EndOfCode => "end_of_code",
            ChunkKind::EndOfExecution => "end_of_execution",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        let kind = match key {
            "message" => ChunkKind::Message,
            "code" => ChunkKind::Code,
            "output" => ChunkKind::Output,
            "executing" => ChunkKind::Executing,
            "language" => ChunkKind::Language,
            "active_line" => ChunkKind::ActiveLine,
            "start_of_message" => ChunkKind::StartOfMessage,
            "end_of_message" => ChunkKind::EndOfMessage,
            "start_of_code" => ChunkKind::StartOfCode,
            "end_of_code" => ChunkKind::EndOfCode,
            "end_of_execution" => ChunkKind::EndOfExecution,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether chunks of this type carry text meant for display.
    ///
    /// Framing markers and execution metadata are dropped before clause
    /// aggregation and never change the aggregator's state.
    pub fn is_display(&self) -> bool {
        matches!(
            self,
            ChunkKind::Message | ChunkKind::Code | ChunkKind::Output | ChunkKind::Executing
        )
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error decoding a chunk object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// The chunk was not a JSON object
    NotAnObject,
    /// The chunk object had no keys
    Empty,
    /// The chunk's key is not a known chunk type
    UnknownType(String),
    /// The payload did not have the shape expected for its type
    InvalidPayload { kind: &'static str, reason: String },
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::NotAnObject => write!(f, "chunk is not a JSON object"),
            ChunkError::Empty => write!(f, "chunk object has no type key"),
            ChunkError::UnknownType(key) => write!(f, "unknown chunk type: {}", key),
            ChunkError::InvalidPayload { kind, reason } => {
                write!(f, "invalid '{}' chunk: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for ChunkError {}

impl Chunk {
    /// Decode a chunk from its one-key JSON object form.
    ///
    /// If the object carries several keys, the first one on the wire decides the type.
    pub fn from_json(value: &Value) -> Result<Self, ChunkError> {
        let object = value.as_object().ok_or(ChunkError::NotAnObject)?;
        let (key, payload) = object.iter().next().ok_or(ChunkError::Empty)?;
        let kind = ChunkKind::from_key(key).ok_or_else(|| ChunkError::UnknownType(key.clone()))?;

        let chunk = match kind {
            ChunkKind::Message => Chunk::Message(text_payload(kind, payload)?),
            ChunkKind::Code => Chunk::Code(text_payload(kind, payload)?),
            ChunkKind::Output => Chunk::Output(text_payload(kind, payload)?),
            ChunkKind::Language => Chunk::Language(text_payload(kind, payload)?),
            ChunkKind::Executing => {
                let code = payload
                    .get("code")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChunkError::InvalidPayload {
                        kind: kind.as_str(),
                        reason: "missing 'code' string".to_string(),
                    })?;
                let language = payload
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Chunk::Executing {
                    code: code.to_string(),
                    language: language.to_string(),
                }
            }
            ChunkKind::ActiveLine => match payload {
                Value::Null => Chunk::ActiveLine(None),
                other => Chunk::ActiveLine(Some(other.as_u64().ok_or_else(|| {
                    ChunkError::InvalidPayload {
                        kind: kind.as_str(),
                        reason: format!("expected line number, got {}", other),
                    }
                })?)),
            },
            ChunkKind::StartOfMessage => Chunk::StartOfMessage,
            ChunkKind::EndOfMessage => Chunk::EndOfMessage,
            ChunkKind::StartOfCode => Chunk::StartOfCode,
            ChunkKind::EndOfCode => Chunk::EndOfCode,
            ChunkKind::EndOfExecution => Chunk::EndOfExecution,
        };

        Ok(chunk)
    }

    /// Decode a chunk from one line of newline-delimited JSON.
    pub fn from_line(line: &str) -> Result<Self, ChunkError> {
        let value: Value = serde_json::from_str(line).map_err(|e| ChunkError::InvalidPayload {
            kind: "line",
            reason: e.to_string(),
        })?;
        Self::from_json(&value)
    }

    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Message(_) => ChunkKind::Message,
            Chunk::Code(_) => ChunkKind::Code,
            Chunk::Output(_) => ChunkKind::Output,
            Chunk::Executing { .. } => ChunkKind::Executing,
            Chunk::Language(_) => ChunkKind::Language,
            Chunk::ActiveLine(_) => ChunkKind::ActiveLine,
            Chunk::StartOfMessage => ChunkKind::StartOfMessage,
            Chunk::EndOfMessage => ChunkKind::EndOfMessage,
            Chunk::StartOfCode => ChunkKind::StartOfCode,
            Chunk::EndOfCode => ChunkKind::EndOfCode,
            Chunk::EndOfExecution => ChunkKind::EndOfExecution,
        }
    }

    /// Text this chunk contributes to a clause, or None for excluded types.
    ///
    /// `Executing` contributes a banner built from its code instead of raw text.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Chunk::Message(text) | Chunk::Code(text) | Chunk::Output(text) => Some(text.clone()),
            Chunk::Executing { code, .. } => Some(format!("{}{}", code, EXECUTING_SEPARATOR)),
            _ => None,
        }
    }
}

fn text_payload(kind: ChunkKind, payload: &Value) -> Result<String, ChunkError> {
    payload
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ChunkError::InvalidPayload {
            kind: kind.as_str(),
            reason: format!("expected string, got {}", payload),
        })
}
