//! Trigger calculator: turns schedule requests into trigger records.
//! Pure functions: "today" is always passed in.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use autopower_core::{DaySet, TriggerRecord};

/// Which half of a stage pair a trigger set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Boot,
    Shutdown,
}

/// Earliest date strictly after `today` that falls on `day`.
///
/// Only seeds the first `StartBoundary` of a weekly trigger; the task store
/// repeats on the weekday from there on.
pub fn next_weekday_on_or_after_tomorrow(today: NaiveDate, day: Weekday) -> NaiveDate {
    let mut date = today + Days::new(1);
    while date.weekday() != day {
        date = date + Days::new(1);
    }
    date
}

/// One weekly trigger per day in `days`, Monday-first.
pub fn build_stage_triggers(
    days: &DaySet,
    at: NaiveTime,
    role: StageRole,
    today: NaiveDate,
) -> Vec<TriggerRecord> {
    let triggers: Vec<TriggerRecord> = days
        .iter()
        .map(|day| TriggerRecord::Weekly {
            day,
            at,
            start: next_weekday_on_or_after_tomorrow(today, day),
        })
        .collect();
    tracing::debug!(
        "🗓️ {:?} stage: {} weekly trigger(s) at {}",
        role,
        triggers.len(),
        at.format("%H:%M")
    );
    triggers
}

/// The single trigger of a boot task: daily repeat or one-shot, never both.
pub fn boot_trigger(at: NaiveDateTime, repeat_daily: bool) -> TriggerRecord {
    if repeat_daily {
        TriggerRecord::Daily { at }
    } else {
        TriggerRecord::OneShot { at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    #[test]
    fn test_next_weekday_is_earliest_future_match() {
        // Every starting weekday against every target weekday.
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        for offset in 0..7 {
            let today = monday + Days::new(offset);
            for day in WEEK {
                let next = next_weekday_on_or_after_tomorrow(today, day);
                assert!(next > today);
                assert_eq!(next.weekday(), day);
                assert!((next - today).num_days() <= 7);
                let mut probe = today + Days::new(1);
                while probe < next {
                    assert_ne!(probe.weekday(), day);
                    probe = probe + Days::new(1);
                }
            }
        }
    }

    #[test]
    fn test_same_weekday_rolls_a_full_week() {
        // 2026-10-18 is a Sunday.
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(
            next_weekday_on_or_after_tomorrow(sunday, Weekday::Sun),
            NaiveDate::from_ymd_opt(2026, 10, 25).unwrap()
        );
        assert_eq!(
            next_weekday_on_or_after_tomorrow(sunday, Weekday::Mon),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }

    #[test]
    fn test_stage_triggers_match_dayset() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let days: DaySet = "fri,mon,wed".parse().unwrap();

        let triggers = build_stage_triggers(&days, at, StageRole::Boot, today);
        assert_eq!(triggers.len(), days.len());

        let seen: HashSet<Weekday> = triggers.iter().filter_map(|t| t.weekday()).collect();
        assert_eq!(seen.len(), triggers.len());
        assert!(seen.iter().all(|d| days.contains(*d)));
        assert_eq!(
            triggers.iter().filter_map(|t| t.weekday()).collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert!(triggers.iter().all(|t| t.start_boundary().time() == at));
    }

    #[test]
    fn test_stage_triggers_every_subset_size() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let at = NaiveTime::from_hms_opt(18, 30, 0).unwrap();
        let mut days = DaySet::new();
        for (i, day) in WEEK.into_iter().enumerate() {
            days.insert(day);
            let triggers = build_stage_triggers(&days, at, StageRole::Shutdown, today);
            assert_eq!(triggers.len(), i + 1);
        }
    }

    #[test]
    fn test_empty_dayset_yields_nothing() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(build_stage_triggers(&DaySet::new(), at, StageRole::Boot, today).is_empty());
    }

    #[test]
    fn test_boot_trigger_kinds() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        assert_eq!(boot_trigger(at, true), TriggerRecord::Daily { at });
        assert_eq!(boot_trigger(at, false), TriggerRecord::OneShot { at });
    }
}
