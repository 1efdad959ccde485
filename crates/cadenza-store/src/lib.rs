//! `cadenza-store`: SQLite persistence for schedule records.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, StoreError};
pub use manager::ScheduleStore;
pub use types::{NewSchedule, Schedule};
