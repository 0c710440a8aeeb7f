//! Streaming client for the code-executing interpreter
//!
//! The interpreter itself (language model, code generation, sandboxed
//! execution) runs as a separate HTTP service. This module only speaks its
//! streaming chat protocol: one POST per user prompt, answered with a body of
//! newline-delimited JSON chunks.
//!
//! Everything an interpreter needs for a conversation travels in its
//! `InterpreterConfig`, which is built per session. Nothing is shared between
//! sessions except the transcript files on disk.

use std::path::PathBuf;
use std::pin::Pin;

use async_stream::stream;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::chunk::{Chunk, ChunkError};
use super::turns::{Turn, TurnRecorder};
use crate::relay::TranscriptStore;

/// Instructions appended to the interpreter's own system message.
pub const DEFAULT_SYSTEM_MESSAGE: &str = r#"
You can use the following libraries without installing:
- pandas
- numpy
- matplotlib
- seaborn
- scikit-learn
- pandas-datareader
- mplfinance
- yfinance
- requests
- scrapy
- beautifulsoup4
- opencv-python
- ffmpeg-python
- PyMuPDF
- pytube
- pyocr
- easyocr
- pydub
- pdfkit
- weasyprint
Your workspace is `./workspace` folder. If you make an output file, please put it in `./workspace/output`.
"#;

/// A lazy, ordered stream of chunks for one chat turn.
///
/// The stream borrows the interpreter mutably, so the turn must be drained
/// (or dropped) before the next `chat` call.
pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<Chunk, InterpreterError>> + Send + 'a>>;

/// Error type for interpreter operations
#[derive(Debug)]
pub enum InterpreterError {
    /// HTTP transport failure
    Request(reqwest::Error),
    /// The interpreter answered with a non-success status
    Status { status: u16, body: String },
    /// A streamed chunk could not be decoded
    Chunk(ChunkError),
    /// The conversation transcript could not be persisted
    Transcript(std::io::Error),
}

impl std::fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpreterError::Request(e) => write!(f, "Request error: {}", e),
            InterpreterError::Status { status, body } => {
                write!(f, "Interpreter returned HTTP {}: {}", status, body)
            }
            InterpreterError::Chunk(e) => write!(f, "Malformed chunk: {}", e),
            InterpreterError::Transcript(e) => write!(f, "Transcript error: {}", e),
        }
    }
}

impl std::error::Error for InterpreterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InterpreterError::Request(e) => Some(e),
            InterpreterError::Chunk(e) => Some(e),
            InterpreterError::Transcript(e) => Some(e),
            InterpreterError::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for InterpreterError {
    fn from(e: reqwest::Error) -> Self {
        InterpreterError::Request(e)
    }
}

impl From<ChunkError> for InterpreterError {
    fn from(e: ChunkError) -> Self {
        InterpreterError::Chunk(e)
    }
}

impl From<std::io::Error> for InterpreterError {
    fn from(e: std::io::Error) -> Self {
        InterpreterError::Transcript(e)
    }
}

/// The conversational agent a session drives.
///
/// Implementors own the prior turns of the conversation and the instruction
/// preamble, and turn a prompt into a stream of typed chunks.
#[async_trait::async_trait]
pub trait Interpreter: Send {
    /// Prior turns the next chat call will see
    fn messages(&self) -> &[Turn];

    /// Replace the prior turns
    fn set_messages(&mut self, messages: Vec<Turn>);

    /// Instruction preamble sent along with every chat call
    fn system_message(&self) -> &str;

    /// Start a chat turn for `prompt`
    async fn chat<'a>(&'a mut self, prompt: &str) -> Result<ChunkStream<'a>, InterpreterError>;
}

/// Where an interpreter persists its conversation after each turn
#[derive(Debug, Clone)]
pub struct TranscriptTarget {
    pub store: TranscriptStore,
    pub path: PathBuf,
}

/// Per-session interpreter configuration
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Base URL of the interpreter service (e.g., "http://localhost:8001")
    pub base_url: String,
    /// Instructions appended to the interpreter's base system message
    pub system_message: String,
    /// Run generated code without asking for confirmation
    pub auto_run: bool,
    /// Prior conversation turns
    pub messages: Vec<Turn>,
    /// Transcript to save after each turn (None keeps memory in-process only)
    pub transcript: Option<TranscriptTarget>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            auto_run: true,
            messages: Vec::new(),
            transcript: None,
        }
    }
}

/// Request body for the interpreter's streaming chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    messages: &'a [Turn],
    system_message: &'a str,
    auto_run: bool,
    stream: bool,
}

/// HTTP client for an interpreter service
pub struct InterpreterClient {
    config: InterpreterConfig,
    client: reqwest::Client,
}

impl InterpreterClient {
    /// Create a new interpreter client for one session
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(target) = &self.config.transcript {
            target.store.save(&target.path, &self.config.messages)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Interpreter for InterpreterClient {
    fn messages(&self) -> &[Turn] {
        &self.config.messages
    }

    fn set_messages(&mut self, messages: Vec<Turn>) {
        self.config.messages = messages;
    }

    fn system_message(&self) -> &str {
        &self.config.system_message
    }

    async fn chat<'a>(&'a mut self, prompt: &str) -> Result<ChunkStream<'a>, InterpreterError> {
        let endpoint = format!("{}/chat", self.config.base_url);
        let body = ChatRequest {
            message: prompt,
            messages: &self.config.messages,
            system_message: &self.config.system_message,
            auto_run: self.config.auto_run,
            stream: true,
        };

        debug!(endpoint = %endpoint, prior_turns = self.config.messages.len(), "Starting interpreter chat");
        let response = self.client.post(&endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Interpreter rejected chat request");
            return Err(InterpreterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes_stream = response.bytes_stream();
        let mut recorder = TurnRecorder::new(prompt);

        let stream = stream! {
            let mut lines = LineBuffer::default();
            let mut finished = false;

            while !finished {
                let batch = match bytes_stream.next().await {
                    Some(Ok(bytes)) => lines.push(&bytes),
                    Some(Err(e)) => {
                        yield Err(InterpreterError::from(e));
                        return;
                    }
                    None => {
                        finished = true;
                        lines.finish().into_iter().collect()
                    }
                };

                for line in batch {
                    match line.and_then(|line| Chunk::from_line(&line)) {
                        Ok(chunk) => {
                            recorder.record(&chunk);
                            yield Ok(chunk);
                        }
                        Err(e) => {
                            yield Err(InterpreterError::from(e));
                            return;
                        }
                    }
                }
            }

            self.config.messages.extend(recorder.finish());
            if let Err(e) = self.persist() {
                yield Err(InterpreterError::from(e));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Splits a byte stream into newline-delimited lines.
///
/// Network frames don't respect line boundaries, so partial lines are held
/// until their terminating newline (or the end of the stream) arrives.
/// A line that isn't valid UTF-8 comes back as an error in its place.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed bytes, returning every complete non-blank line
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, ChunkError>> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.extend(decode_line(line));
        }
        lines
    }

    /// Take whatever is left once the stream has ended
    fn finish(&mut self) -> Option<Result<String, ChunkError>> {
        decode_line(std::mem::take(&mut self.pending))
    }
}

/// Trimmed text of one line, None when blank
fn decode_line(line: Vec<u8>) -> Option<Result<String, ChunkError>> {
    match String::from_utf8(line) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| Ok(text.to_string()))
        }
        Err(e) => Some(Err(ChunkError::InvalidPayload {
            kind: "line",
            reason: e.to_string(),
        })),
    }
}
