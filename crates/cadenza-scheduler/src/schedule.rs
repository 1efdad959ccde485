use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::types::TriggerSpec;

/// Compute the next local date-time strictly *after* `from` at which `trigger`
/// matches.
///
/// Returns `None` only when the trigger has no weekdays.
pub fn next_fire_after(spec: &TriggerSpec, from: NaiveDateTime) -> Option<NaiveDateTime> {
    // Today's slot may still be ahead; otherwise the same weekday next week
    // is at most 7 days out.
    (0..=7).find_map(|offset| {
        let day = from.date() + Duration::days(offset);
        if !spec.days.contains(day.weekday()) {
            return None;
        }
        let candidate = day.and_hms_opt(u32::from(spec.hour), u32::from(spec.minute), 0)?;
        (candidate > from).then_some(candidate)
    })
}

/// Truncate to the start of the minute.
pub fn minute_floor(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Minutes in `(cursor, now]` the timer still has to evaluate, keeping only
/// the most recent `max_catch_up` of them.
///
/// Returns the minutes in order plus the number that were dropped.
pub fn minutes_to_evaluate(
    cursor: NaiveDateTime,
    now: NaiveDateTime,
    max_catch_up: u32,
) -> (Vec<NaiveDateTime>, i64) {
    let cursor = minute_floor(cursor);
    let now = minute_floor(now);
    let pending = (now - cursor).num_minutes();
    if pending <= 0 {
        return (Vec::new(), 0);
    }

    let keep = pending.min(i64::from(max_catch_up.max(1)));
    let skipped = pending - keep;
    let minutes = (0..keep)
        .rev()
        .map(|back| now - Duration::minutes(back))
        .collect();
    (minutes, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::WeekdaySet;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn spec(days: &[Weekday], h: u32, m: u32) -> TriggerSpec {
        TriggerSpec::at(
            days.iter().copied().collect(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        )
    }

    #[test]
    fn later_today() {
        // 2024-01-01 is a Monday.
        let s = spec(&[Weekday::Mon], 7, 30);
        assert_eq!(next_fire_after(&s, dt(2024, 1, 1, 7, 0)), Some(dt(2024, 1, 1, 7, 30)));
    }

    #[test]
    fn same_minute_rolls_to_next_week() {
        let s = spec(&[Weekday::Mon], 7, 30);
        assert_eq!(next_fire_after(&s, dt(2024, 1, 1, 7, 30)), Some(dt(2024, 1, 8, 7, 30)));
    }

    #[test]
    fn next_listed_weekday() {
        let s = spec(&[Weekday::Mon, Weekday::Fri], 7, 0);
        // Tuesday -> Friday.
        assert_eq!(next_fire_after(&s, dt(2024, 1, 2, 12, 0)), Some(dt(2024, 1, 5, 7, 0)));
    }

    #[test]
    fn no_days_never_fires() {
        let s = TriggerSpec::at(WeekdaySet::empty(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(next_fire_after(&s, dt(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn evaluates_each_elapsed_minute() {
        let (minutes, skipped) = minutes_to_evaluate(dt(2024, 1, 1, 7, 0), dt(2024, 1, 1, 7, 3), 5);
        assert_eq!(
            minutes,
            vec![dt(2024, 1, 1, 7, 1), dt(2024, 1, 1, 7, 2), dt(2024, 1, 1, 7, 3)]
        );
        assert_eq!(skipped, 0);
    }

    #[test]
    fn long_stall_keeps_only_recent_minutes() {
        let (minutes, skipped) = minutes_to_evaluate(dt(2024, 1, 1, 7, 0), dt(2024, 1, 1, 8, 0), 5);
        assert_eq!(minutes.len(), 5);
        assert_eq!(minutes.first(), Some(&dt(2024, 1, 1, 7, 56)));
        assert_eq!(minutes.last(), Some(&dt(2024, 1, 1, 8, 0)));
        assert_eq!(skipped, 55);
    }

    #[test]
    fn same_minute_or_backwards_is_empty() {
        let (m, _) = minutes_to_evaluate(dt(2024, 1, 1, 7, 0), dt(2024, 1, 1, 7, 0), 5);
        assert!(m.is_empty());
        let (m, _) = minutes_to_evaluate(dt(2024, 1, 1, 7, 5), dt(2024, 1, 1, 7, 0), 5);
        assert!(m.is_empty());
    }
}
