use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::RecordError;

/// Identifier assigned to a schedule record by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A persisted "play `media_source` on `days_of_week` from `start_time`
/// until `end_time`" definition, exactly as the store returns it.
///
/// Times and weekday names are kept as strings; [`ScheduleRecord::window`]
/// validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: RecordId,
    pub media_source: String,
    /// `HH:MM`.
    pub start_time: String,
    /// `HH:MM` or `HH:MM:SS`.
    pub end_time: Option<String>,
    /// Weekday names, e.g. `["Monday", "Friday"]`.
    pub days_of_week: Vec<String>,
}

/// The validated form of a [`ScheduleRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub media_source: String,
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
    pub days: WeekdaySet,
    /// Entries of `days_of_week` that did not name a weekday.
    pub ignored_days: Vec<String>,
}

impl ScheduleWindow {
    /// `true` when the stop time is earlier in the day than the start time.
    ///
    /// Stop triggers compare time of day only, so such a window stops on the
    /// same listed weekday rather than after midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.end.is_some_and(|end| end < self.start)
    }
}

impl ScheduleRecord {
    pub fn window(&self) -> Result<ScheduleWindow, RecordError> {
        let media_source = self.media_source.trim();
        if media_source.is_empty() {
            return Err(RecordError::EmptyMediaSource);
        }

        let start = parse_time_of_day(&self.start_time, false).ok_or_else(|| {
            RecordError::BadTime {
                field: "start_time",
                value: self.start_time.clone(),
            }
        })?;

        let end = match self.end_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_time_of_day(raw, true).ok_or_else(|| {
                RecordError::BadTime {
                    field: "end_time",
                    value: raw.to_string(),
                }
            })?),
        };

        let (days, ignored_days) = WeekdaySet::from_names(&self.days_of_week);
        if days.is_empty() {
            return Err(RecordError::NoValidWeekdays {
                given: self.days_of_week.clone(),
            });
        }

        Ok(ScheduleWindow {
            media_source: media_source.to_string(),
            start,
            end,
            days,
            ignored_days,
        })
    }
}

/// Parse a time of day. A fractional-seconds suffix (`07:30:00.000000`) is
/// dropped first; seconds are only accepted when `allow_seconds` is set.
pub fn parse_time_of_day(raw: &str, allow_seconds: bool) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    let value = trimmed.split('.').next().unwrap_or(trimmed);
    if let Ok(t) = NaiveTime::parse_from_str(value, "%H:%M") {
        return Some(t);
    }
    if allow_seconds {
        return NaiveTime::parse_from_str(value, "%H:%M:%S").ok();
    }
    None
}

// ---------------------------------------------------------------------------
// WeekdaySet
// ---------------------------------------------------------------------------

/// A set of weekdays stored as a 7-bit mask (bit 0 = Monday).
///
/// Iteration and display are always Monday-first, so two sets built from the
/// same days in any order compare, hash and print identically.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekdaySet(u8);

const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeekdaySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        ALL_DAYS.into_iter().filter(|d| self.contains(*d))
    }

    /// Build a set from weekday names, returning the names that were not
    /// recognised alongside it.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> (Self, Vec<String>) {
        let mut set = Self::empty();
        let mut ignored = Vec::new();
        for name in names {
            match name.as_ref().trim().parse::<Weekday>() {
                Ok(day) => set.insert(day),
                Err(_) => ignored.push(name.as_ref().to_string()),
            }
        }
        (set, ignored)
    }

    /// Full English names, Monday-first.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(full_name).collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: Vec<String> = self
            .iter()
            .map(|d| d.to_string().to_lowercase())
            .collect();
        write!(f, "{}", short.join(","))
    }
}

impl fmt::Debug for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

fn full_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: &str, end: Option<&str>, days: &[&str]) -> ScheduleRecord {
        ScheduleRecord {
            id: RecordId(1),
            media_source: "/music/A".to_string(),
            start_time: start.to_string(),
            end_time: end.map(str::to_string),
            days_of_week: days.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn window_parses_valid_record() {
        let w = record("07:00", Some("07:30"), &["Monday", "Friday"])
            .window()
            .expect("valid");
        assert_eq!(w.start, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(w.end, NaiveTime::from_hms_opt(7, 30, 0));
        assert!(w.days.contains(Weekday::Mon));
        assert!(w.days.contains(Weekday::Fri));
        assert_eq!(w.days.len(), 2);
        assert!(w.ignored_days.is_empty());
    }

    #[test]
    fn end_time_accepts_seconds_and_fraction() {
        let w = record("07:00", Some("07:30:15.000000"), &["Monday"])
            .window()
            .expect("valid");
        assert_eq!(w.end, NaiveTime::from_hms_opt(7, 30, 15));
    }

    #[test]
    fn empty_end_time_means_no_end() {
        let w = record("07:00", Some(""), &["Monday"]).window().expect("valid");
        assert_eq!(w.end, None);
    }

    #[test]
    fn malformed_end_time_is_rejected_not_dropped() {
        let err = record("07:00", Some("7h30"), &["Monday"]).window().unwrap_err();
        assert_eq!(
            err,
            RecordError::BadTime {
                field: "end_time",
                value: "7h30".to_string()
            }
        );
    }

    #[test]
    fn start_time_with_seconds_is_rejected() {
        let err = record("07:00:00", None, &["Monday"]).window().unwrap_err();
        assert!(matches!(err, RecordError::BadTime { field: "start_time", .. }));
    }

    #[test]
    fn unknown_day_names_are_ignored_but_reported() {
        let w = record("07:00", None, &["Monday", "Funday"]).window().expect("valid");
        assert_eq!(w.days.len(), 1);
        assert_eq!(w.ignored_days, vec!["Funday".to_string()]);
    }

    #[test]
    fn no_valid_weekday_is_rejected() {
        let err = record("07:00", None, &["Funday", ""]).window().unwrap_err();
        assert!(matches!(err, RecordError::NoValidWeekdays { .. }));
    }

    #[test]
    fn empty_media_source_is_rejected() {
        let mut r = record("07:00", None, &["Monday"]);
        r.media_source = "  ".to_string();
        assert_eq!(r.window().unwrap_err(), RecordError::EmptyMediaSource);
    }

    #[test]
    fn weekday_set_is_order_independent() {
        let (a, _) = WeekdaySet::from_names(&["Friday", "Monday"]);
        let (b, _) = WeekdaySet::from_names(&["monday", "FRIDAY"]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "mon,fri");
        assert_eq!(a.names(), vec!["Monday", "Friday"]);
    }

    #[test]
    fn crosses_midnight_detects_reversed_window() {
        let w = record("23:00", Some("01:00"), &["Monday"]).window().expect("valid");
        assert!(w.crosses_midnight());
        let w = record("07:00", Some("07:30"), &["Monday"]).window().expect("valid");
        assert!(!w.crosses_midnight());
    }
}
