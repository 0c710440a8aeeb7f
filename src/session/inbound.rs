//! Inbound wire protocol
//!
//! Clients send one JSON object per WebSocket text message:
//!
//! ```text
//! {"type": "chat", "content": "Hello"}
//! {"type": "file", "fileName": "sample.txt", "fileData": "data:;base64,SGVsbG8sIHdvcmxkIQ=="}
//! ```
//!
//! Anything that isn't JSON, or a known type with its fields missing, is a
//! protocol error and ends the session. A well-formed object with an unknown
//! type, or a chat with empty content, is merely invalid and gets an in-band
//! reply.

use serde_json::Value;

/// A parsed client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A chat prompt for the interpreter (never empty)
    Chat { content: String },
    /// A file to save into the workspace
    File { file_name: String, file_data: String },
    /// Well-formed but unusable; `kind` is the offending `type` value, if any
    Invalid { kind: Option<String> },
}

/// Error type for unparseable client messages
#[derive(Debug)]
pub enum ProtocolError {
    /// The message is not valid JSON
    Json(serde_json::Error),
    /// The message is JSON but not an object
    NotAnObject,
    /// A field required by the message type is missing or not a string
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "malformed JSON message: {}", e),
            ProtocolError::NotAnObject => write!(f, "message is not a JSON object"),
            ProtocolError::MissingField { kind, field } => {
                write!(f, "'{}' message is missing '{}'", kind, field)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e)
    }
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        let field = |kind: &'static str, name: &'static str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(ProtocolError::MissingField { kind, field: name })
        };

        let message = match object.get("type").and_then(Value::as_str) {
            Some("chat") => {
                let content = field("chat", "content")?;
                if content.is_empty() {
                    InboundMessage::Invalid {
                        kind: Some("chat".to_string()),
                    }
                } else {
                    InboundMessage::Chat { content }
                }
            }
            Some("file") => InboundMessage::File {
                file_name: field("file", "fileName")?,
                file_data: field("file", "fileData")?,
            },
            other => InboundMessage::Invalid {
                kind: other.map(str::to_string),
            },
        };

        Ok(message)
    }

    /// Label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            InboundMessage::Chat { .. } => "chat",
            InboundMessage::File { .. } => "file",
            InboundMessage::Invalid { .. } => "invalid",
        }
    }
}
