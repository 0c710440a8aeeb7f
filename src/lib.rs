//! Interpreter Relay - WebSocket front end for a code-executing chat agent
//!
//! This library relays chat messages and file uploads from WebSocket clients
//! to an external interpreter service, and streams the interpreter's output
//! back as display-ready clauses tagged by type (message, code, output,
//! executing).
//!
//! # Modules
//!
//! - `interpreter` - collaborator contract, streaming HTTP client, chunk model
//! - `relay` - clause aggregation, daily transcripts, uploads
//! - `session` - the per-connection loop and its transport seam
//! - `server` - axum routes (`/ws`, `/health`, `/metrics`)
//! - `config` - environment-driven configuration
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - console logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use interpreter_relay::{server, RelayConfig};
//!
//! let config = RelayConfig::from_env();
//! server::serve(config, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod config;
pub mod interpreter;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod session;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use config::RelayConfig;
pub use interpreter::{Chunk, Interpreter, InterpreterClient, InterpreterConfig};
pub use relay::{Clause, ClauseAggregator, ClauseKind, FlushPolicy};
pub use session::Session;
