//! Relay configuration
//!
//! Every setting has a default and can be overridden from the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `RELAY_BIND_ADDR` | `0.0.0.0:8000` |
//! | `RELAY_INTERPRETER_URL` | `http://localhost:8001` |
//! | `RELAY_HISTORY_DIR` | `./conversation_histories` |
//! | `RELAY_UPLOAD_DIR` | `./workspace` |
//! | `RELAY_SYSTEM_MESSAGE` | library/workspace preamble |
//! | `RELAY_AUTO_RUN` | `true` |
//! | `RELAY_FLUSH_MIN_LEN` | `15` |
//! | `RELAY_OTLP_ENDPOINT` | unset (no trace export) |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::interpreter::{InterpreterConfig, DEFAULT_SYSTEM_MESSAGE};
use crate::relay::clause::{FlushPolicy, DEFAULT_MIN_CLAUSE_LEN};

/// Configuration for the relay server
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the WebSocket server listens on
    pub bind_addr: SocketAddr,
    /// Base URL of the interpreter service
    pub interpreter_url: String,
    /// Directory holding the daily transcripts
    pub history_dir: PathBuf,
    /// Directory uploads are written to
    pub upload_dir: PathBuf,
    /// Instructions appended to the interpreter's system message
    pub system_message: String,
    /// Let the interpreter run code without confirmation
    pub auto_run: bool,
    /// Minimum clause length before punctuation cuts it
    pub flush_min_len: usize,
    /// OTLP collector endpoint; traces are only exported when set
    pub otlp_endpoint: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            interpreter_url: "http://localhost:8001".to_string(),
            history_dir: PathBuf::from("./conversation_histories"),
            upload_dir: PathBuf::from("./workspace"),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            auto_run: true,
            flush_min_len: DEFAULT_MIN_CLAUSE_LEN,
            otlp_endpoint: None,
        }
    }
}

impl RelayConfig {
    /// Build a config from `RELAY_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Values that fail to parse keep their default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: parse_or(var("RELAY_BIND_ADDR"), "RELAY_BIND_ADDR", defaults.bind_addr),
            interpreter_url: var("RELAY_INTERPRETER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.interpreter_url),
            history_dir: var("RELAY_HISTORY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_dir),
            upload_dir: var("RELAY_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            system_message: var("RELAY_SYSTEM_MESSAGE").unwrap_or(defaults.system_message),
            auto_run: parse_or(var("RELAY_AUTO_RUN"), "RELAY_AUTO_RUN", defaults.auto_run),
            flush_min_len: parse_or(
                var("RELAY_FLUSH_MIN_LEN"),
                "RELAY_FLUSH_MIN_LEN",
                defaults.flush_min_len,
            ),
            otlp_endpoint: var("RELAY_OTLP_ENDPOINT"),
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::with_min_len(self.flush_min_len)
    }

    /// Interpreter settings for a new session (no history or transcript yet)
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            base_url: self.interpreter_url.clone(),
            system_message: self.system_message.clone(),
            auto_run: self.auto_run,
            ..InterpreterConfig::default()
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable setting, using default");
                default
            }
        },
        None => default,
    }
}
