//! Shape checks for schedules captured from forms or received from the API.
//!
//! Validation runs in two ordered passes. Field-level checks come first and
//! short-circuit; only a schedule whose individual fields are well formed is
//! checked against the rules of its recurrence kind.

use std::collections::HashSet;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::schedule::{
    local_date, resolve_local, ClockTime, RecurrenceKind, Schedule, MAX_DAILY_TIMES,
    MAX_INTERVAL_DAYS,
};
use crate::wire::{parse_instant, WireSchedule};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }

    pub fn violation_for(&self, field: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.field == field)
    }
}

pub fn validate(schedule: &WireSchedule) -> ValidationReport {
    validate_at(schedule, Utc::now())
}

pub fn validate_at(schedule: &WireSchedule, now: DateTime<Utc>) -> ValidationReport {
    let violations = field_violations(schedule, now);
    if !violations.is_empty() {
        return ValidationReport::from_violations(violations);
    }
    ValidationReport::from_violations(kind_violations(schedule))
}

impl Schedule {
    pub fn validate_at(&self, now: DateTime<Utc>) -> ValidationReport {
        validate_at(&WireSchedule::from(self), now)
    }
}

fn field_violations(schedule: &WireSchedule, now: DateTime<Utc>) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut seen_times = HashSet::new();
    for raw in &schedule.notification_times {
        match raw.parse::<ClockTime>() {
            Ok(time) => {
                if !seen_times.insert(time) {
                    violations.push(Violation::new(
                        "notificationTimes",
                        format!("{time} is listed more than once"),
                    ));
                }
            }
            Err(_) => violations.push(Violation::new(
                "notificationTimes",
                format!("`{raw}` must be a 24-hour HH:MM time"),
            )),
        }
    }

    let mut seen_days = HashSet::new();
    for day in schedule.days_of_week.iter().flatten() {
        if !(0..=6).contains(day) {
            violations.push(Violation::new(
                "daysOfWeek",
                format!("{day} is not a weekday index (0-6)"),
            ));
        } else if !seen_days.insert(*day) {
            violations.push(Violation::new(
                "daysOfWeek",
                format!("weekday {day} is listed more than once"),
            ));
        }
    }

    if !(0..=i64::from(MAX_INTERVAL_DAYS)).contains(&schedule.interval_days) {
        violations.push(Violation::new(
            "intervalDays",
            format!("must be between 0 and {MAX_INTERVAL_DAYS}"),
        ));
    }

    let time_zone = match schedule.time_zone.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            violations.push(Violation::new(
                "timeZone",
                format!("`{}` is not an IANA time zone", schedule.time_zone),
            ));
            Tz::UTC
        }
    };

    if let Some(raw) = &schedule.next_take_date {
        if let Err(err) = parse_instant("nextTakeDate", raw) {
            violations.push(Violation::new("nextTakeDate", err.to_string()));
        }
    }

    if let Some(raw) = &schedule.end_date {
        match parse_instant("endDate", raw) {
            Ok(end) => {
                let start_of_today =
                    resolve_local(time_zone, local_date(time_zone, now), NaiveTime::MIN);
                if end < start_of_today {
                    violations.push(Violation::new("endDate", "must not be in the past"));
                }
            }
            Err(err) => violations.push(Violation::new("endDate", err.to_string())),
        }
    }

    violations
}

fn kind_violations(schedule: &WireSchedule) -> Vec<Violation> {
    let mut violations = Vec::new();
    let times = schedule.notification_times.len();
    let interval = schedule.interval_days;
    let has_next = schedule.next_take_date.is_some();

    let expect_times = |violations: &mut Vec<Violation>, expected: &str, ok: bool| {
        if !ok {
            violations.push(Violation::new(
                "notificationTimes",
                format!("{} needs {expected}", schedule.kind),
            ));
        }
    };

    match schedule.kind {
        RecurrenceKind::OnlyAsNeeded => {
            expect_times(&mut violations, "no notification times", times == 0);
            if interval != 0 {
                violations.push(Violation::new("intervalDays", "must be 0 when taken as needed"));
            }
            if has_next {
                violations.push(Violation::new(
                    "nextTakeDate",
                    "must be empty when taken as needed",
                ));
            }
        }
        RecurrenceKind::EveryDay => {
            expect_times(
                &mut violations,
                "between 1 and 12 notification times",
                (1..=MAX_DAILY_TIMES).contains(&times),
            );
            if interval != 1 {
                violations.push(Violation::new("intervalDays", "must be 1 for a daily schedule"));
            }
        }
        RecurrenceKind::EveryOtherDay => {
            expect_times(&mut violations, "exactly one notification time", times == 1);
            if interval != 2 {
                violations.push(Violation::new(
                    "intervalDays",
                    "must be 2 for an every-other-day schedule",
                ));
            }
            if !has_next {
                violations.push(Violation::new("nextTakeDate", "a first dose date is required"));
            }
        }
        RecurrenceKind::EveryXDays => {
            expect_times(&mut violations, "exactly one notification time", times == 1);
            if !(1..=i64::from(MAX_INTERVAL_DAYS)).contains(&interval) {
                violations.push(Violation::new(
                    "intervalDays",
                    format!("must be between 1 and {MAX_INTERVAL_DAYS}"),
                ));
            }
            if !has_next {
                violations.push(Violation::new("nextTakeDate", "a first dose date is required"));
            }
        }
        RecurrenceKind::SpecificWeekDays => {
            expect_times(&mut violations, "exactly one notification time", times == 1);
            if interval != 1 {
                violations.push(Violation::new(
                    "intervalDays",
                    "must be 1 for a weekly schedule",
                ));
            }
            if schedule.days_of_week.as_ref().map_or(true, Vec::is_empty) {
                violations.push(Violation::new("daysOfWeek", "pick at least one weekday"));
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn wire(kind: RecurrenceKind, interval_days: i64, times: &[&str]) -> WireSchedule {
        WireSchedule {
            kind,
            interval_days,
            notification_times: times.iter().map(|t| t.to_string()).collect(),
            time_zone: "UTC".into(),
            next_take_date: None,
            days_of_week: None,
            end_date: None,
        }
    }

    #[test]
    fn accepts_well_formed_schedules() {
        let daily = wire(RecurrenceKind::EveryDay, 1, &["08:00", "20:00"]);
        assert!(validate_at(&daily, now()).valid);

        let mut every_x = wire(RecurrenceKind::EveryXDays, 365, &["09:00"]);
        every_x.next_take_date = Some("2024-01-10T09:00:00.000Z".into());
        assert!(validate_at(&every_x, now()).valid);

        let mut weekly = wire(RecurrenceKind::SpecificWeekDays, 1, &["07:30"]);
        weekly.days_of_week = Some(vec![1, 5]);
        assert!(validate_at(&weekly, now()).valid);

        let as_needed = wire(RecurrenceKind::OnlyAsNeeded, 0, &[]);
        assert!(validate_at(&as_needed, now()).valid);
    }

    #[test]
    fn rejects_every_day_without_times() {
        let report = validate_at(&wire(RecurrenceKind::EveryDay, 1, &[]), now());
        assert!(!report.valid);
        assert!(report.violation_for("notificationTimes").is_some());
    }

    #[test]
    fn rejects_every_day_with_too_many_times() {
        let times: Vec<String> = (0..13).map(|h| format!("{h:02}:00")).collect();
        let refs: Vec<&str> = times.iter().map(String::as_str).collect();
        let report = validate_at(&wire(RecurrenceKind::EveryDay, 1, &refs), now());
        assert!(!report.valid);
    }

    #[test]
    fn rejects_out_of_range_intervals() {
        for interval in [0, 366] {
            let mut schedule = wire(RecurrenceKind::EveryXDays, interval, &["09:00"]);
            schedule.next_take_date = Some("2024-01-10T09:00:00Z".into());
            let report = validate_at(&schedule, now());
            assert!(!report.valid, "interval {interval} accepted");
            assert!(report.violation_for("intervalDays").is_some());
        }
    }

    #[test]
    fn rejects_week_days_without_days() {
        let report = validate_at(&wire(RecurrenceKind::SpecificWeekDays, 1, &["07:30"]), now());
        assert!(!report.valid);
        assert!(report.violation_for("daysOfWeek").is_some());
    }

    #[test]
    fn week_days_require_unit_interval() {
        let mut weekly = wire(RecurrenceKind::SpecificWeekDays, 0, &["07:30"]);
        weekly.days_of_week = Some(vec![1, 3]);
        let report = validate_at(&weekly, now());
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violation_for("intervalDays").map(|v| v.field), Some("intervalDays"));
    }

    #[test]
    fn rejects_malformed_times_before_kind_rules() {
        for bad in ["8:00", "25:00"] {
            let report = validate_at(&wire(RecurrenceKind::EveryDay, 1, &[bad]), now());
            assert!(!report.valid);
            assert_eq!(report.violations.len(), 1);
            assert_eq!(report.violations[0].field, "notificationTimes");
        }
    }

    #[test]
    fn field_pass_short_circuits_kind_pass() {
        // Interval schedule without a next take date would also fail the kind
        // pass, but only the malformed weekday is reported.
        let mut schedule = wire(RecurrenceKind::EveryXDays, 3, &["09:00"]);
        schedule.days_of_week = Some(vec![7]);
        let report = validate_at(&schedule, now());
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].field, "daysOfWeek");
    }

    #[test]
    fn as_needed_must_be_empty() {
        let mut schedule = wire(RecurrenceKind::OnlyAsNeeded, 1, &["08:00"]);
        schedule.next_take_date = Some("2024-01-10T09:00:00Z".into());
        let report = validate_at(&schedule, now());
        let fields: Vec<&str> = report.violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["notificationTimes", "intervalDays", "nextTakeDate"]);
    }

    #[test]
    fn end_date_may_be_today_but_not_earlier() {
        let mut schedule = wire(RecurrenceKind::EveryDay, 1, &["08:00"]);
        schedule.end_date = Some("2024-01-10T00:00:00Z".into());
        assert!(validate_at(&schedule, now()).valid);

        schedule.end_date = Some("2024-01-09T23:59:59Z".into());
        let report = validate_at(&schedule, now());
        assert!(report.violation_for("endDate").is_some());
    }

    #[test]
    fn typed_schedule_validates_through_wire_form() {
        let schedule = Schedule::every_day(Tz::UTC, []);
        assert!(!schedule.validate_at(now()).valid);
    }
}
