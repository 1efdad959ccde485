use thiserror::Error;

/// Application-level failures outside a single schedule record.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// A schedule record that cannot be turned into triggers.
///
/// Reported at reconciliation time; the record's triggers are simply not
/// installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("media source is empty")]
    EmptyMediaSource,

    #[error("malformed {field} {value:?}: not a valid time of day")]
    BadTime { field: &'static str, value: String },

    #[error("no valid weekday in {given:?}")]
    NoValidWeekdays { given: Vec<String> },
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        "CONFIG_ERROR"
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
