//! Port definitions (trait abstractions) for execution backends.
//!
//! Ports define the interfaces that the core domain expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No process or CLI types in any signature
//! - Backends are the ground truth for deployment state; nothing is cached here
//! - Every error maps onto one [`ErrorKind`]

pub mod backend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use backend::{DeploymentBackend, DeploymentRequest, LaunchCommand};

use crate::config::ConfigError;
use crate::settings::SettingsError;

/// Externally visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationError,
    BackendUnavailable,
    DeploymentNotFound,
    HandshakeFailed,
    ProtocolError,
    Timeout,
    PartialFailure,
    RuntimeError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::BackendUnavailable => "backend_unavailable",
            Self::DeploymentNotFound => "deployment_not_found",
            Self::HandshakeFailed => "handshake_failed",
            Self::ProtocolError => "protocol_error",
            Self::Timeout => "timeout",
            Self::PartialFailure => "partial_failure",
            Self::RuntimeError => "runtime_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific errors for backend operations.
///
/// Runtime messages are carried verbatim so callers can surface them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The runtime is missing or not responding.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// No managed deployment with this id.
    #[error("Deployment not found: {0}")]
    NotFound(String),

    /// A runtime command exited unsuccessfully.
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// A runtime command did not finish in time.
    #[error("{command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// The operation failed and the rollback of its partial work failed too.
    #[error("{original} (rollback failed: {rollback})")]
    PartialFailure {
        original: Box<Self>,
        rollback: String,
    },

    /// Runtime output could not be understood.
    #[error("Failed to parse runtime output: {0}")]
    Parse(String),

    /// The backend cannot perform this operation for this input.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl BackendError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::BackendUnavailable,
            Self::NotFound(_) => ErrorKind::DeploymentNotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
            Self::CommandFailed { .. } | Self::Parse(_) | Self::Unsupported(_) => {
                ErrorKind::RuntimeError
            }
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Core error type for semantic domain errors.
///
/// Adapters map this to their own surfaces (CLI exit codes, JSON bodies).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend operation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Platform settings are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl CoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Settings(_) => ErrorKind::ConfigurationError,
            Self::Backend(e) => e.kind(),
        }
    }
}
