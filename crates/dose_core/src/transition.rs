use chrono::{DateTime, Utc, Weekday};

use crate::calculator::{first_daily_slot_after, next_occurrence, ReferencePoint};
use crate::schedule::{ClockTime, RecurrenceKind, Schedule, MAX_INTERVAL_DAYS};

/// Reshape `schedule` for `kind`, keeping whatever the user entered that
/// still makes sense for the new kind.
pub fn retarget(schedule: &Schedule, kind: RecurrenceKind) -> Schedule {
    retarget_at(schedule, kind, Utc::now())
}

/// [`retarget`] with an explicit clock, used for the computed `next_take_date`
/// default.
pub fn retarget_at(schedule: &Schedule, kind: RecurrenceKind, now: DateTime<Utc>) -> Schedule {
    let first_time = schedule
        .notification_times
        .first()
        .copied()
        .unwrap_or_default();

    let mut next = Schedule {
        kind,
        interval_days: 1,
        notification_times: vec![first_time],
        time_zone: schedule.time_zone,
        next_take_date: schedule.next_take_date,
        days_of_week: Vec::new(),
        end_date: schedule.end_date,
    };

    match kind {
        RecurrenceKind::EveryDay => {
            if !schedule.notification_times.is_empty() {
                next.notification_times = schedule.notification_times.clone();
            }
        }
        RecurrenceKind::EveryOtherDay => next.interval_days = 2,
        RecurrenceKind::EveryXDays => {
            next.interval_days = schedule.interval_days.clamp(1, MAX_INTERVAL_DAYS);
        }
        RecurrenceKind::SpecificWeekDays => {
            next.days_of_week = if schedule.days_of_week.is_empty() {
                vec![Weekday::Mon]
            } else {
                schedule.days_of_week.clone()
            };
        }
        RecurrenceKind::OnlyAsNeeded => {
            next.interval_days = 0;
            next.notification_times.clear();
            next.next_take_date = None;
        }
    }

    if next.next_take_date.is_none() && kind != RecurrenceKind::OnlyAsNeeded {
        next.next_take_date = Some(default_next_take_date(&next, now));
    }
    next
}

fn default_next_take_date(schedule: &Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
    match schedule.kind {
        RecurrenceKind::EveryOtherDay | RecurrenceKind::EveryXDays => {
            // Interval kinds only advance from a taken date; seed them with
            // the first upcoming slot of their time of day.
            let mut times: Vec<ClockTime> = schedule.notification_times.clone();
            times.sort();
            first_daily_slot_after(schedule, &times, schedule.local_date(now), now)
        }
        _ => next_occurrence(schedule, ReferencePoint::Now(now))
            .ok()
            .flatten()
            .unwrap_or(now),
    }
}
