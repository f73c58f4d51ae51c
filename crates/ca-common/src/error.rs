//! Error types for CSV Append.

use thiserror::Error;

/// Result type alias for CSV Append operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for CSV Append.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid settings blob: {0}")]
    InvalidSettings(String),

    #[error("settings validation failed: {0}")]
    Validation(String),

    // Schema and record errors (20-29)
    #[error("invalid field definition: {0}")]
    InvalidField(String),

    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("invalid record: {0}")]
    Record(String),

    // Write errors (30-39)
    #[error("flush failed: {0}")]
    Flush(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    // Lifecycle errors (50-59)
    #[error("invalid lifecycle transition: cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidSettings(_) => 11,
            Error::Validation(_) => 12,
            Error::InvalidField(_) => 20,
            Error::UnknownFieldType(_) => 21,
            Error::Record(_) => 22,
            Error::Flush(_) => 30,
            Error::Encoding(_) => 31,
            Error::InvalidState { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}
