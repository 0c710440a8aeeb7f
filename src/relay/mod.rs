//! Relay building blocks shared by every session
//!
//! - `clause` - regroups streamed chunks into display-ready clauses
//! - `transcript` - date-partitioned conversation history on disk
//! - `upload` - data-URL file uploads into the interpreter workspace

pub mod clause;
pub mod transcript;
pub mod upload;

pub use clause::{Clause, ClauseAggregator, ClauseKind, FlushPolicy};
pub use transcript::TranscriptStore;
pub use upload::{SavedUpload, UploadError, UploadStore};
