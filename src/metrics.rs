//! Prometheus metrics for relay observability
//!
//! All metrics live in the default registry and are exported by the server's
//! `/metrics` route.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Session Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// WebSocket sessions accepted since startup.
    pub static ref SESSIONS_TOTAL: Counter = register_counter!(
        "relay_sessions_total",
        "Total WebSocket sessions accepted"
    ).expect("failed to register SESSIONS_TOTAL metric");

    /// Sessions currently running.
    pub static ref SESSIONS_ACTIVE: Gauge = register_gauge!(
        "relay_sessions_active",
        "WebSocket sessions currently connected"
    ).expect("failed to register SESSIONS_ACTIVE metric");

    /// Sessions torn down by a fatal error.
    ///
    /// Labels:
    /// - kind: "protocol", "interpreter", "upload", "transcript" or "transport"
    pub static ref SESSION_ERRORS: CounterVec = register_counter_vec!(
        "relay_session_errors_total",
        "Sessions closed by a fatal error, by error category",
        &["kind"]
    ).expect("failed to register SESSION_ERRORS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Message Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inbound client messages.
    ///
    /// Labels:
    /// - type: "chat", "file" or "invalid"
    pub static ref INBOUND_MESSAGES: CounterVec = register_counter_vec!(
        "relay_inbound_messages_total",
        "Inbound client messages by type",
        &["type"]
    ).expect("failed to register INBOUND_MESSAGES metric");

    /// Clauses sent to clients.
    ///
    /// Labels:
    /// - type: the clause type ("message", "code", "output", "executing", "assistant")
    pub static ref CLAUSES_SENT: CounterVec = register_counter_vec!(
        "relay_clauses_sent_total",
        "Clauses sent to clients by clause type",
        &["type"]
    ).expect("failed to register CLAUSES_SENT metric");

    /// Wall-clock duration of a chat turn, from prompt to last clause.
    pub static ref CHAT_TURN_DURATION: Histogram = register_histogram!(
        "relay_chat_turn_duration_seconds",
        "Duration of interpreter chat turns",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).expect("failed to register CHAT_TURN_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Upload Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    pub static ref UPLOADS_TOTAL: Counter = register_counter!(
        "relay_uploads_total",
        "Files saved from client uploads"
    ).expect("failed to register UPLOADS_TOTAL metric");

    pub static ref UPLOAD_BYTES: Counter = register_counter!(
        "relay_upload_bytes_total",
        "Decoded bytes written from client uploads"
    ).expect("failed to register UPLOAD_BYTES metric");
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
