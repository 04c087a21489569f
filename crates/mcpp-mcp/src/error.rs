//! Protocol client errors.

use mcpp_core::ErrorKind;
use thiserror::Error;

use crate::session::SessionState;

/// Errors that can occur during protocol client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to spawn server process: {0}")]
    Spawn(String),

    #[error("Failed to communicate with server: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Stdout closed before a matching response arrived.
    #[error("Server process exited before responding to {method}")]
    ProcessExited { method: String },

    #[error("Timed out after {millis}ms waiting for {method}")]
    Timeout { method: String, millis: u128 },

    /// The HTTP endpoint answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Could not reach the HTTP endpoint at all.
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// The server answered with a JSON-RPC `error`.
    #[error("Server returned error {code}: {message}")]
    Server { code: i64, message: String },

    /// The `initialize` exchange failed.
    #[error("Handshake failed: {0}")]
    Handshake(Box<Self>),

    #[error("Operation not allowed in state {state}: {operation}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    #[error("No connection with id {0}")]
    UnknownConnection(String),
}

impl ClientError {
    /// Wrap a failure of the `initialize` step. Timeouts stay timeouts.
    pub(crate) fn handshake(err: Self) -> Self {
        match err {
            Self::Timeout { .. } | Self::Handshake(_) => err,
            other => Self::Handshake(Box::new(other)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Handshake(_) => ErrorKind::HandshakeFailed,
            Self::Protocol(_)
            | Self::Json(_)
            | Self::Server { .. }
            | Self::Http { .. }
            | Self::ProcessExited { .. } => ErrorKind::ProtocolError,
            Self::Spawn(_)
            | Self::Io(_)
            | Self::Connect { .. }
            | Self::InvalidState { .. }
            | Self::UnknownConnection(_) => ErrorKind::RuntimeError,
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
