//! Session loop - one per connected client
//!
//! ```text
//! recv ──► parse ──┬─ chat ──► interpreter.chat ──► aggregator ──► send clauses
//!   ▲              ├─ file ──► UploadStore.save ──► pending notice + ack
//!   │              └─ invalid ──► "An invalid message was sent."
//!   └──────────────────────────────────────┘
//! ```
//!
//! Processing is strictly sequential: a chat turn is fully streamed to the
//! client, including its last residual clause, before the next message is
//! read. Any error other than an invalid message ends the session and closes
//! the connection; recovery is left to the client reconnecting.

use std::time::Instant;

use futures_util::StreamExt;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::inbound::{InboundMessage, ProtocolError};
use super::transport::{Transport, TransportError};
use crate::interpreter::{Interpreter, InterpreterError};
use crate::metrics::{
    CHAT_TURN_DURATION, CLAUSES_SENT, INBOUND_MESSAGES, SESSION_ERRORS, UPLOADS_TOTAL,
    UPLOAD_BYTES,
};
use crate::relay::{Clause, ClauseAggregator, FlushPolicy, UploadError, UploadStore};

/// Acknowledgement sent after an upload is saved
pub const SAVED_FILE_MESSAGE: &str = "Saved file.";

/// Reply to a message with an unknown type or empty chat content
pub const INVALID_MESSAGE: &str = "An invalid message was sent.";

/// Error type for fatal session failures
#[derive(Debug)]
pub enum SessionError {
    /// The client sent something that isn't a protocol message
    Protocol(ProtocolError),
    /// The interpreter failed to start or stream a turn
    Interpreter(InterpreterError),
    /// An upload could not be decoded or saved
    Upload(UploadError),
    /// The connection to the client failed
    Transport(TransportError),
}

impl SessionError {
    /// Error category used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Protocol(_) => "protocol",
            SessionError::Interpreter(InterpreterError::Transcript(_)) => "transcript",
            SessionError::Interpreter(_) => "interpreter",
            SessionError::Upload(_) => "upload",
            SessionError::Transport(_) => "transport",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Protocol(e) => write!(f, "Protocol error: {}", e),
            SessionError::Interpreter(e) => write!(f, "Interpreter error: {}", e),
            SessionError::Upload(e) => write!(f, "Upload error: {}", e),
            SessionError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Protocol(e) => Some(e),
            SessionError::Interpreter(e) => Some(e),
            SessionError::Upload(e) => Some(e),
            SessionError::Transport(e) => Some(e),
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        SessionError::Protocol(e)
    }
}

impl From<InterpreterError> for SessionError {
    fn from(e: InterpreterError) -> Self {
        SessionError::Interpreter(e)
    }
}

impl From<UploadError> for SessionError {
    fn from(e: UploadError) -> Self {
        SessionError::Upload(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

/// One client's conversation with the interpreter
pub struct Session<T, I> {
    id: String,
    transport: T,
    interpreter: I,
    uploads: UploadStore,
    policy: FlushPolicy,
    /// Notice about the last saved upload, prefixed to the next chat message
    pending_upload: Option<String>,
}

impl<T: Transport, I: Interpreter> Session<T, I> {
    pub fn new(transport: T, interpreter: I, uploads: UploadStore, policy: FlushPolicy) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            transport,
            interpreter,
            uploads,
            policy,
            pending_upload: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serve the client until it disconnects or a fatal error occurs.
    ///
    /// The connection is closed in both cases. A clean disconnect returns Ok.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let span = info_span!("session", session_id = %self.id, otel.name = "session");

        async move {
            info!("Session started");
            let result = self.serve().await;

            match &result {
                Ok(()) => info!("Session ended"),
                Err(e) => {
                    SESSION_ERRORS.with_label_values(&[e.kind()]).inc();
                    error!(
                        kind = e.kind(),
                        error = %e,
                        cause = ?std::error::Error::source(e),
                        "Session failed, closing connection"
                    );
                }
            }

            self.transport.close().await;
            result
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            debug!("Waiting for user message");
            let text = match self.transport.recv().await {
                Some(text) => text?,
                None => {
                    info!("Client disconnected");
                    return Ok(());
                }
            };

            let message = InboundMessage::parse(&text)?;
            INBOUND_MESSAGES.with_label_values(&[message.label()]).inc();
            debug!(kind = message.label(), len = text.len(), "Received user message");

            match message {
                InboundMessage::Chat { content } => self.handle_chat(content).await?,
                InboundMessage::File {
                    file_name,
                    file_data,
                } => self.handle_file(&file_name, &file_data).await?,
                InboundMessage::Invalid { kind } => {
                    warn!(kind = ?kind, "Invalid message");
                    deliver(&mut self.transport, &Clause::assistant(INVALID_MESSAGE)).await?;
                }
            }
        }
    }

    /// Stream one chat turn to the client, clause by clause
    async fn handle_chat(&mut self, content: String) -> Result<(), SessionError> {
        let prompt = match self.pending_upload.take() {
            Some(notice) => format!("{} {}", notice, content),
            None => content,
        };

        let start = Instant::now();
        let mut aggregator = ClauseAggregator::new(self.policy.clone());
        let mut chunks = self.interpreter.chat(&prompt).await?;
        let mut sent = 0usize;

        while let Some(chunk) = chunks.next().await {
            if let Some(clause) = aggregator.push(&chunk?) {
                deliver(&mut self.transport, &clause).await?;
                sent += 1;
            }
        }
        drop(chunks);

        // A residual that is only a line break carries nothing worth showing
        if let Some(clause) = aggregator.finish().filter(|c| c.content != "\n") {
            deliver(&mut self.transport, &clause).await?;
            sent += 1;
        }

        let elapsed = start.elapsed();
        CHAT_TURN_DURATION.observe(elapsed.as_secs_f64());
        info!(
            clauses = sent,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Chat turn completed"
        );
        Ok(())
    }

    /// Save an upload and remember it for the next chat message
    async fn handle_file(&mut self, file_name: &str, file_data: &str) -> Result<(), SessionError> {
        let saved = self.uploads.save(file_name, file_data)?;
        UPLOADS_TOTAL.inc();
        UPLOAD_BYTES.inc_by(saved.size as f64);

        if self.pending_upload.is_some() {
            debug!("Replacing unsent upload notice");
        }
        self.pending_upload = Some(saved.notice());

        deliver(&mut self.transport, &Clause::assistant(SAVED_FILE_MESSAGE)).await
    }
}

async fn deliver<T: Transport>(transport: &mut T, clause: &Clause) -> Result<(), SessionError> {
    transport.send(clause).await?;
    CLAUSES_SENT.with_label_values(&[clause.kind.as_str()]).inc();
    Ok(())
}
