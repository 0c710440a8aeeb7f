//! Client sessions
//!
//! This module provides the per-connection loop that relays chat messages to
//! the interpreter and streams clauses back:
//! - `inbound` - parsing of client messages
//! - `transport` - the client connection seam (WebSocket in production)
//! - `runner` - the session loop itself

pub mod inbound;
pub mod runner;
pub mod transport;

pub use inbound::{InboundMessage, ProtocolError};
pub use runner::{Session, SessionError, INVALID_MESSAGE, SAVED_FILE_MESSAGE};
pub use transport::{Transport, TransportError, WebSocketTransport};
