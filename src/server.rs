//! HTTP/WebSocket server
//!
//! Routes:
//! - `GET /ws` - upgrade to a WebSocket and run one session on it
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus metrics

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::RelayConfig;
use crate::interpreter::{InterpreterClient, TranscriptTarget};
use crate::metrics::{self, SESSIONS_ACTIVE, SESSIONS_TOTAL, SESSION_ERRORS};
use crate::relay::{TranscriptStore, UploadStore};
use crate::session::{Session, Transport, WebSocketTransport};

/// Server application state, shared by every connection
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub transcripts: TranscriptStore,
    pub uploads: UploadStore,
}

impl AppState {
    /// Build state from config, creating the history directory
    pub fn new(config: RelayConfig) -> std::io::Result<Self> {
        let transcripts = TranscriptStore::new(&config.history_dir)?;
        let uploads = UploadStore::new(&config.upload_dir);
        Ok(Self {
            config: Arc::new(config),
            transcripts,
            uploads,
        })
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// Create the relay router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until `shutdown` resolves
pub async fn serve(
    config: RelayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let bind_addr = config.bind_addr;
    let state = AppState::new(config)?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!(addr = %listener.local_addr()?, "Relay listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn prometheus_metrics() -> impl IntoResponse {
    match metrics::gather_text() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection task: load today's transcript, then run the session loop
async fn handle_socket(socket: WebSocket, state: AppState) {
    SESSIONS_TOTAL.inc();
    SESSIONS_ACTIVE.inc();

    let mut transport = WebSocketTransport::new(socket);
    let path = state.transcripts.today_path();

    match state.transcripts.load_or_create(&path) {
        Ok(messages) => {
            let mut interpreter_config = state.config.interpreter_config();
            interpreter_config.messages = messages;
            interpreter_config.transcript = Some(TranscriptTarget {
                store: state.transcripts.clone(),
                path,
            });

            let session = Session::new(
                transport,
                InterpreterClient::new(interpreter_config),
                state.uploads.clone(),
                state.config.flush_policy(),
            );
            let session_id = session.id().to_string();
            // Failures are logged and counted by the session itself
            if let Err(e) = session.run().await {
                debug!(session_id = %session_id, kind = e.kind(), "Session closed after error");
            }
        }
        Err(e) => {
            SESSION_ERRORS.with_label_values(&["transcript"]).inc();
            error!(path = %path.display(), error = %e, "Failed to load conversation history");
            transport.close().await;
        }
    }

    SESSIONS_ACTIVE.dec();
}
