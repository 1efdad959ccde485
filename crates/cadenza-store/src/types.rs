use cadenza_core::{RecordId, ScheduleRecord};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Fields a caller supplies to create or replace a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub media_source: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub days_of_week: Vec<String>,
}

impl NewSchedule {
    /// Only presence is checked here; time and weekday formats are validated
    /// when the record is turned into triggers.
    pub fn check(&self) -> Result<()> {
        if self.media_source.trim().is_empty() {
            return Err(StoreError::Invalid("media_source is required".into()));
        }
        if self.start_time.trim().is_empty() {
            return Err(StoreError::Invalid("start_time is required".into()));
        }
        Ok(())
    }

    /// Blank end times are stored as NULL.
    pub(crate) fn end_time(&self) -> Option<&str> {
        self.end_time
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn days_column(&self) -> String {
        join_days(&self.days_of_week)
    }
}

/// A persisted schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    #[serde(flatten)]
    pub record: ScheduleRecord,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last update.
    pub updated_at: String,
}

impl Schedule {
    pub fn id(&self) -> RecordId {
        self.record.id
    }
}

pub(crate) fn join_days(days: &[String]) -> String {
    days.iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn split_days(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}

/// `07:30:00.000000` -> `07:30:00`.
pub(crate) fn strip_fraction(time: String) -> String {
    match time.split_once('.') {
        Some((whole, _)) => whole.to_string(),
        None => time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new(media: &str, start: &str) -> NewSchedule {
        NewSchedule {
            media_source: media.into(),
            start_time: start.into(),
            end_time: None,
            days_of_week: vec![],
        }
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        let err = new("  ", "07:00").check().unwrap_err();
        assert_eq!(err.to_string(), "invalid schedule: media_source is required");
        let err = new("/music", "").check().unwrap_err();
        assert_eq!(err.to_string(), "invalid schedule: start_time is required");
        assert!(new("/music", "not-a-time").check().is_ok());
    }

    #[test]
    fn days_column_roundtrip_drops_blanks() {
        let days = vec!["Monday".to_string(), " ".to_string(), " Friday".to_string()];
        let column = join_days(&days);
        assert_eq!(column, "Monday,Friday");
        assert_eq!(split_days(&column), vec!["Monday", "Friday"]);
        assert!(split_days("").is_empty());
    }

    #[test]
    fn fractional_seconds_are_stripped() {
        assert_eq!(strip_fraction("07:30:00.000000".into()), "07:30:00");
        assert_eq!(strip_fraction("07:30".into()), "07:30");
    }

    #[test]
    fn new_schedule_accepts_missing_optional_fields() {
        let parsed: NewSchedule =
            serde_json::from_str(r#"{"media_source":"/music/a","start_time":"07:00"}"#).unwrap();
        assert_eq!(parsed.end_time, None);
        assert!(parsed.days_of_week.is_empty());
    }
}
