use cadenza_core::{RecordId, WeekdaySet};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;

/// Whether a trigger starts or stops playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Start,
    Stop,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Start => f.write_str("start"),
            TriggerKind::Stop => f.write_str("stop"),
        }
    }
}

/// Recurs on every day in `days` at `hour:minute` local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TriggerSpec {
    pub days: WeekdaySet,
    pub hour: u8,
    pub minute: u8,
}

impl TriggerSpec {
    /// Seconds in `time` are dropped; triggers have minute resolution.
    pub fn at(days: WeekdaySet, time: NaiveTime) -> Self {
        Self {
            days,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// `true` when `at` falls on one of the days, at its time of day.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.days.contains(at.weekday())
            && at.hour() == u32::from(self.hour)
            && at.minute() == u32::from(self.minute)
    }

    /// See [`crate::schedule::next_fire_after`].
    pub fn next_fire_after(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        crate::schedule::next_fire_after(self, from)
    }
}

/// Canonical trigger identity: `"<kind>@<days>@HH:MM"`, e.g.
/// `stop@mon,fri@07:30`.
///
/// Derived only from the trigger's defining fields, so re-deriving it for the
/// same slot always yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TriggerKey(String);

impl TriggerKey {
    pub fn new(kind: TriggerKind, spec: &TriggerSpec) -> Self {
        Self(format!(
            "{kind}@{}@{:02}:{:02}",
            spec.days, spec.hour, spec.minute
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a start trigger needs to begin playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartAction {
    pub record_id: RecordId,
    pub media_source: String,
    pub end_time: Option<NaiveTime>,
    pub days: WeekdaySet,
}

/// The callback bound to a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerAction {
    Start(StartAction),
    Stop,
}

impl TriggerAction {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerAction::Start(_) => TriggerKind::Start,
            TriggerAction::Stop => TriggerKind::Stop,
        }
    }
}

/// A live entry of the trigger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub key: TriggerKey,
    pub spec: TriggerSpec,
    pub action: TriggerAction,
}

/// Passed to the handler when a trigger fires.
#[derive(Debug, Clone)]
pub struct FireContext {
    pub key: TriggerKey,
    /// The wall-clock minute being evaluated.
    pub at: NaiveDateTime,
}
