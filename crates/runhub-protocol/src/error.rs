//! Error types for protocol operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding protocol values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A frame could not be decoded as a client message.
    #[error("{message}")]
    Malformed { message: String },

    /// A signal name outside the supported set.
    #[error("Unknown signal: {name}")]
    UnknownSignal { name: String },
}

impl ProtocolError {
    /// Create a new malformed-frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// The `{message}` body returned for every rejected HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
