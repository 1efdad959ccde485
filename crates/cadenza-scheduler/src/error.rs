use cadenza_core::{RecordError, RecordId};
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The record cannot be turned into triggers; none were installed for it.
    #[error("Invalid schedule record {id}: {source}")]
    InvalidRecord {
        id: RecordId,
        #[source]
        source: RecordError,
    },
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidRecord { .. } => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
