//! Error types for job resolution, execution and registry loading.
//!
//! Validation errors describe bad requests and are never faults. Backend
//! errors are system conditions: clients see them the same way as validation
//! errors, but they are logged separately.

use thiserror::Error;

/// A request was rejected; `message` is returned to the client verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to prime job: {0}")]
    Prime(String),
    #[error("Execution failed: {0}")]
    Execution(String),
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
    #[error("I/O error during execution: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn prime(message: impl Into<String>) -> Self {
        Self::Prime(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// Errors raised while loading a runtime registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse registry: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid runtime entry #{index} ({language}): {message}")]
    InvalidEntry {
        index: usize,
        language: String,
        message: String,
    },
}

/// Anything that can end a job before it produced a result.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl JobError {
    pub fn is_validation(&self) -> bool {
        matches!(self, JobError::Validation(_))
    }
}
