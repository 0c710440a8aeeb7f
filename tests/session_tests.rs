//! Integration tests for the session loop
//!
//! Sessions run against an in-memory transport and a scripted interpreter, so
//! the whole dispatch/aggregation/upload flow is exercised without a network.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use interpreter_relay::interpreter::{
    Chunk, ChunkError, ChunkStream, Interpreter, InterpreterError, Turn,
};
use interpreter_relay::relay::{Clause, ClauseKind, FlushPolicy, UploadStore};
use interpreter_relay::session::{
    Session, SessionError, Transport, TransportError, INVALID_MESSAGE, SAVED_FILE_MESSAGE,
};

/// Transport fed from a fixed list of inbound messages; disconnects when it runs out
struct MemoryTransport {
    inbound: VecDeque<String>,
    outbound: Arc<Mutex<Vec<Clause>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.pop_front().map(Ok)
    }

    async fn send(&mut self, clause: &Clause) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound.lock().unwrap().push(clause.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Interpreter that replays one scripted chunk list per chat call
struct ScriptedInterpreter {
    turns: VecDeque<Vec<Result<Chunk, InterpreterError>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    messages: Vec<Turn>,
}

#[async_trait::async_trait]
impl Interpreter for ScriptedInterpreter {
    fn messages(&self) -> &[Turn] {
        &self.messages
    }

    fn set_messages(&mut self, messages: Vec<Turn>) {
        self.messages = messages;
    }

    fn system_message(&self) -> &str {
        "scripted"
    }

    async fn chat<'a>(&'a mut self, prompt: &str) -> Result<ChunkStream<'a>, InterpreterError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self.turns.pop_front().unwrap_or_default();
        Ok(Box::pin(futures_util::stream::iter(script)))
    }
}

struct Harness {
    outbound: Arc<Mutex<Vec<Clause>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Harness {
    fn sent(&self) -> Vec<Clause> {
        self.outbound.lock().unwrap().clone()
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn run_session(
    inbound: Vec<String>,
    turns: Vec<Vec<Result<Chunk, InterpreterError>>>,
    upload_root: &Path,
) -> (Result<(), SessionError>, Harness) {
    let harness = Harness {
        outbound: Arc::new(Mutex::new(Vec::new())),
        prompts: Arc::new(Mutex::new(Vec::new())),
        closed: Arc::new(AtomicBool::new(false)),
    };

    let transport = MemoryTransport {
        inbound: inbound.into(),
        outbound: Arc::clone(&harness.outbound),
        closed: Arc::clone(&harness.closed),
    };
    let interpreter = ScriptedInterpreter {
        turns: turns.into(),
        prompts: Arc::clone(&harness.prompts),
        messages: Vec::new(),
    };

    let session = Session::new(
        transport,
        interpreter,
        UploadStore::new(upload_root),
        FlushPolicy::default(),
    );
    let result = session.run().await;
    (result, harness)
}

fn chat(content: &str) -> String {
    serde_json::json!({"type": "chat", "content": content}).to_string()
}

fn file(name: &str, data_url: &str) -> String {
    serde_json::json!({"type": "file", "fileName": name, "fileData": data_url}).to_string()
}

fn ok(chunks: Vec<Chunk>) -> Vec<Result<Chunk, InterpreterError>> {
    chunks.into_iter().map(Ok).collect()
}

#[tokio::test]
async fn test_chat_streams_clauses() {
    let dir = tempfile::tempdir().unwrap();
    let (result, harness) = run_session(
        vec![chat("Hello")],
        vec![ok(vec![
            Chunk::StartOfMessage,
            Chunk::Message("Hi".into()),
            Chunk::Message(" there.".into()),
            Chunk::EndOfMessage,
        ])],
        dir.path(),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(harness.prompts(), vec!["Hello".to_string()]);
    assert_eq!(
        harness.sent(),
        vec![Clause::new(ClauseKind::Message, "Hi there.")]
    );
    assert!(harness.closed());
}

#[tokio::test]
async fn test_type_change_flushes_before_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let (_, harness) = run_session(
        vec![chat("run it")],
        vec![ok(vec![
            Chunk::Code("print(1)".into()),
            Chunk::Message("done".into()),
        ])],
        dir.path(),
    )
    .await;

    assert_eq!(
        harness.sent(),
        vec![
            Clause::new(ClauseKind::Code, "print(1)"),
            Clause::new(ClauseKind::Message, "done"),
        ]
    );
}

#[tokio::test]
async fn test_fenced_code_in_messages() {
    let dir = tempfile::tempdir().unwrap();
    let (_, harness) = run_session(
        vec![chat("show code")],
        vec![ok(vec![
            Chunk::Message("```python\n".into()),
            Chunk::Message("x = 1\n".into()),
            Chunk::Message("```\n".into()),
        ])],
        dir.path(),
    )
    .await;

    assert_eq!(harness.sent(), vec![Clause::new(ClauseKind::Code, "x = 1\n")]);
}

#[tokio::test]
async fn test_line_break_residual_is_not_sent() {
    let dir = tempfile::tempdir().unwrap();
    let (_, harness) = run_session(
        vec![chat("hi")],
        vec![ok(vec![
            Chunk::Message("a".into()),
            Chunk::Output("\n".into()),
        ])],
        dir.path(),
    )
    .await;

    assert_eq!(harness.sent(), vec![Clause::new(ClauseKind::Message, "a")]);
}

#[tokio::test]
async fn test_turns_do_not_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let (_, harness) = run_session(
        vec![chat("first"), chat("second")],
        vec![
            ok(vec![Chunk::Message("```\n".into()), Chunk::Message("open".into())]),
            ok(vec![Chunk::Message("plain".into())]),
        ],
        dir.path(),
    )
    .await;

    // The first turn ends inside a code block; the second starts fresh
    assert_eq!(
        harness.sent(),
        vec![
            Clause::new(ClauseKind::Code, "open"),
            Clause::new(ClauseKind::Message, "plain"),
        ]
    );
}

#[tokio::test]
async fn test_upload_then_chat() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("workspace");
    let (result, harness) = run_session(
        vec![
            file("sample.txt", "data:;base64,SGVsbG8sIHdvcmxkIQ=="),
            chat("summarize it"),
            chat("again"),
        ],
        vec![
            ok(vec![Chunk::Message("It says hello.".into())]),
            ok(vec![Chunk::Message("Still hello.".into())]),
        ],
        &root,
    )
    .await;

    assert!(result.is_ok());

    let saved = root.join("sample.txt");
    assert_eq!(std::fs::read(&saved).unwrap(), b"Hello, world!");
    assert_eq!(std::fs::read_dir(&root).unwrap().count(), 1);

    let prompts = harness.prompts();
    assert_eq!(
        prompts[0],
        format!("Saved file to {}. summarize it", saved.display())
    );
    assert_eq!(prompts[1], "again");

    assert_eq!(
        harness.sent(),
        vec![
            Clause::assistant(SAVED_FILE_MESSAGE),
            Clause::new(ClauseKind::Message, "It says hello."),
            Clause::new(ClauseKind::Message, "Still hello."),
        ]
    );
}

#[tokio::test]
async fn test_second_upload_replaces_pending_notice() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("workspace");
    let (result, harness) = run_session(
        vec![
            file("a.txt", "data:;base64,YQ=="),
            file("b.txt", "data:;base64,Yg=="),
            chat("x"),
            chat("y"),
        ],
        vec![
            ok(vec![Chunk::Message("one".into())]),
            ok(vec![Chunk::Message("two".into())]),
        ],
        &root,
    )
    .await;

    assert!(result.is_ok());
    // Both files are saved; only the latest notice reaches the interpreter
    assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"a");
    assert_eq!(std::fs::read(root.join("b.txt")).unwrap(), b"b");
    assert_eq!(
        harness.prompts(),
        vec![
            format!("Saved file to {}. x", root.join("b.txt").display()),
            "y".to_string(),
        ]
    );
    assert_eq!(
        harness.sent()[..2],
        [
            Clause::assistant(SAVED_FILE_MESSAGE),
            Clause::assistant(SAVED_FILE_MESSAGE),
        ]
    );
}

#[tokio::test]
async fn test_invalid_messages_are_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let (result, harness) = run_session(
        vec![
            serde_json::json!({"type": "ping"}).to_string(),
            chat(""),
        ],
        vec![],
        dir.path(),
    )
    .await;

    assert!(result.is_ok());
    assert!(harness.prompts().is_empty());
    assert_eq!(
        harness.sent(),
        vec![
            Clause::assistant(INVALID_MESSAGE),
            Clause::assistant(INVALID_MESSAGE),
        ]
    );
}

#[tokio::test]
async fn test_malformed_json_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let (result, harness) = run_session(
        vec![
            chat("one"),
            "{not json".to_string(),
            chat("never processed"),
        ],
        vec![ok(vec![Chunk::Message("reply".into())]), ok(vec![])],
        dir.path(),
    )
    .await;

    assert!(matches!(result, Err(SessionError::Protocol(_))));
    assert_eq!(harness.prompts(), vec!["one".to_string()]);
    assert_eq!(harness.sent(), vec![Clause::new(ClauseKind::Message, "reply")]);
    assert!(harness.closed());
}

#[tokio::test]
async fn test_malformed_chunk_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let (result, harness) = run_session(
        vec![chat("go"), chat("never processed")],
        vec![vec![
            Ok(Chunk::Code("x = 1".into())),
            Ok(Chunk::Message("first".into())),
            Err(InterpreterError::Chunk(ChunkError::Empty)),
            Ok(Chunk::Message("never seen".into())),
        ]],
        dir.path(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Interpreter(InterpreterError::Chunk(_))));
    assert_eq!(err.kind(), "interpreter");
    // Clauses completed before the error were delivered; the residual was not
    assert_eq!(harness.sent(), vec![Clause::new(ClauseKind::Code, "x = 1")]);
    assert_eq!(harness.prompts().len(), 1);
    assert!(harness.closed());
}

#[tokio::test]
async fn test_bad_upload_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("workspace");
    let (result, harness) = run_session(
        vec![file("sample.txt", "data:;base64,@@@")],
        vec![],
        &root,
    )
    .await;

    assert!(matches!(result, Err(SessionError::Upload(_))));
    assert!(harness.sent().is_empty());
    assert!(!root.join("sample.txt").exists());
}
