//! Interpreter integration module
//!
//! This module provides the collaborator contract for the external
//! code-executing agent, a streaming HTTP client implementing it, and the
//! typed chunk and transcript turn representations it produces.

pub mod chunk;
pub mod client;
pub mod turns;

// Re-export public types so callers can `use crate::interpreter::Chunk`
pub use chunk::{Chunk, ChunkError, ChunkKind};
pub use client::{
    ChunkStream, Interpreter, InterpreterClient, InterpreterConfig, InterpreterError,
    TranscriptTarget, DEFAULT_SYSTEM_MESSAGE,
};
pub use turns::{Turn, TurnRecorder};
