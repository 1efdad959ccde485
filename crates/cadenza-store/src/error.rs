use cadenza_core::RecordId;
use thiserror::Error;

/// Errors that can occur during schedule store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No schedule row with this id.
    #[error("schedule not found: {id}")]
    NotFound { id: RecordId },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The input cannot be stored, e.g. a required field is blank.
    #[error("invalid schedule: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Invalid(_) => "INVALID_REQUEST",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
