//! Error types for mastra-chat

use std::time::Duration;

use thiserror::Error;

/// Result type alias for mastra-chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to an agent server
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network, DNS or connection failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single attempt did not settle within the configured timeout.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Non-2xx response. `body` is the full response text.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 2xx response whose body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Every allowed attempt failed; `source` is the last failure.
    #[error("Request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled before the request settled.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The failure behind an [`Error::Exhausted`], or `self` otherwise.
    pub fn last_failure(&self) -> &Error {
        match self {
            Error::Exhausted { source, .. } => source.last_failure(),
            other => other,
        }
    }

    /// Whether the executor retries this failure. Anything else ends the
    /// attempt loop at once.
    ///
    /// All statuses are retried alike, client errors included.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::HttpStatus { .. } | Error::Parse(_)
        )
    }
}
