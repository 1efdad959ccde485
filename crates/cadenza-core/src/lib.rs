//! `cadenza-core`: shared record types, validation and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::CadenzaConfig;
pub use error::{CoreError, RecordError};
pub use types::{parse_time_of_day, RecordId, ScheduleRecord, ScheduleWindow, WeekdaySet};
