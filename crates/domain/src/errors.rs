//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Meshport
///
/// Every component-level operation returns this error (or a local error that
/// converts into it). The workflow session is the only place that turns it
/// into a user-visible state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MeshportError {
    /// Bad redirect URI, missing client id, unparsable endpoint. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout or connection failure. The caller may re-run the whole step.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or a body we could not understand.
    #[error("Protocol error (status {status:?}): {body}")]
    Protocol { status: Option<u16>, body: String },

    /// Identity provider refused the login, or the CSRF state did not match.
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Remote export job failed, was cancelled, or finished without a handle.
    #[error("Export job error: {0}")]
    Job(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeshportError {
    /// Build a protocol error from an HTTP status and raw body.
    pub fn protocol(status: u16, body: impl Into<String>) -> Self {
        Self::Protocol { status: Some(status), body: body.into() }
    }

    /// Build a protocol error for a payload that could not be parsed.
    pub fn malformed(body: impl Into<String>) -> Self {
        Self::Protocol { status: None, body: body.into() }
    }

    /// Stable label suitable for structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Protocol { .. } => "protocol",
            Self::Authorization(_) => "authorization",
            Self::Job(_) => "job",
            Self::Cancelled => "cancelled",
            Self::Storage(_) => "storage",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for Meshport operations
pub type Result<T> = std::result::Result<T, MeshportError>;
