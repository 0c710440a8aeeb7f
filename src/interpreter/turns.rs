//! Conversation turns as recorded in the transcript
//!
//! A turn follows the interpreter's own message schema: a role, a type, an
//! optional format and the content. Attributes this crate doesn't know about
//! are kept in `extra` so transcripts written by the interpreter survive a
//! load/save cycle unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chunk::Chunk;

/// One recorded exchange in the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String, // "user", "assistant", "computer"
    #[serde(rename = "type")]
    pub kind: String, // "message", "code", "console"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Turn {
    fn new(role: &str, kind: &str, format: Option<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            kind: kind.to_string(),
            format,
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", "message", None, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", "message", None, content)
    }

    pub fn code(language: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new("assistant", "code", Some(language.into()), content)
    }

    pub fn console(content: impl Into<String>) -> Self {
        Self::new("computer", "console", Some("output".to_string()), content)
    }

    fn same_slot(&self, other: &Turn) -> bool {
        self.role == other.role && self.kind == other.kind && self.format == other.format
    }
}

/// Folds a turn's chunk stream into transcript turns.
///
/// Consecutive chunks of the same kind extend the last turn; a change of kind
/// starts a new one. Framing markers only update the remembered code language.
#[derive(Debug, Default)]
pub struct TurnRecorder {
    turns: Vec<Turn>,
    language: Option<String>,
}

impl TurnRecorder {
    /// Start recording a turn that began with the given user prompt
    pub fn new(prompt: &str) -> Self {
        Self {
            turns: vec![Turn::user(prompt)],
            language: None,
        }
    }

    pub fn record(&mut self, chunk: &Chunk) {
        let next = match chunk {
            Chunk::Message(text) => Turn::assistant(text.as_str()),
            Chunk::Code(text) => {
                let language = self.language.clone().unwrap_or_default();
                Turn::code(language, text.as_str())
            }
            Chunk::Output(text) => Turn::console(text.as_str()),
            Chunk::Language(language) => {
                self.language = Some(language.clone());
                return;
            }
            Chunk::Executing { language, .. } if !language.is_empty() => {
                self.language = Some(language.clone());
                return;
            }
            _ => return,
        };

        match self.turns.last_mut() {
            Some(last) if last.role != "user" && last.same_slot(&next) => {
                last.content.push_str(&next.content);
            }
            _ => self.turns.push(next),
        }
    }

    pub fn finish(self) -> Vec<Turn> {
        self.turns
    }
}
