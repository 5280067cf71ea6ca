//! Error types for the veridoc pipeline.

use thiserror::Error;

use crate::models::{VerificationEvent, VerificationStatus};

/// Result type alias using veridoc's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for veridoc operations.
///
/// The pipeline's retry logic treats [`Error::Ocr`], [`Error::Request`],
/// and [`Error::Storage`] as transient; everything else is surfaced to the
/// caller unchanged.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// OCR engine failed or was unreachable
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Document classification failed
    #[error("Classification error: {0}")]
    Classification(String),

    /// Blob storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Illegal verification state transition
    #[error("Invalid transition: {from:?} does not accept {event:?}")]
    InvalidTransition {
        from: VerificationStatus,
        event: VerificationEvent,
    },

    /// Field or request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the pipeline should retry the document after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Ocr(_) | Error::Request(_) | Error::Storage(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
