//! Next-occurrence computation for every recurrence kind.
//!
//! A [`Schedule`] is lowered into a [`Recurrence`] first. Lowering checks the
//! preconditions of the schedule's kind, so each per-kind function below can
//! work with exactly the data it needs.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};

use crate::error::ScheduleError;
use crate::schedule::{weekday_index, ClockTime, RecurrenceKind, Schedule};

/// Basis instant for the next-occurrence computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePoint {
    /// Compute from the current moment.
    Now(DateTime<Utc>),
    /// An occurrence was completed (or skipped) at this instant.
    Taken(DateTime<Utc>),
}

impl ReferencePoint {
    pub fn now() -> Self {
        ReferencePoint::Now(Utc::now())
    }

    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            ReferencePoint::Now(at) | ReferencePoint::Taken(at) => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    EveryDay {
        times: Vec<ClockTime>,
        next_take_date: Option<DateTime<Utc>>,
    },
    EveryOtherDay {
        time: ClockTime,
        next_take_date: Option<DateTime<Utc>>,
    },
    EveryXDays {
        interval_days: u32,
        time: ClockTime,
        next_take_date: Option<DateTime<Utc>>,
    },
    SpecificWeekDays {
        days: Vec<Weekday>,
        time: ClockTime,
    },
    OnlyAsNeeded,
}

impl Recurrence {
    pub fn lower(schedule: &Schedule) -> Result<Self, ScheduleError> {
        let kind = schedule.kind;
        let recurrence = match kind {
            RecurrenceKind::EveryDay => {
                let mut times = schedule.notification_times.clone();
                if times.is_empty() {
                    return Err(ScheduleError::missing(
                        kind,
                        "notificationTimes",
                        "at least one time of day is required",
                    ));
                }
                times.sort();
                times.dedup();
                Recurrence::EveryDay {
                    times,
                    next_take_date: schedule.next_take_date,
                }
            }
            RecurrenceKind::EveryOtherDay => Recurrence::EveryOtherDay {
                time: single_time(schedule)?,
                next_take_date: schedule.next_take_date,
            },
            RecurrenceKind::EveryXDays => {
                let interval_days = schedule.interval_days;
                if interval_days == 0 {
                    return Err(ScheduleError::missing(
                        kind,
                        "intervalDays",
                        "an interval of at least one day is required",
                    ));
                }
                Recurrence::EveryXDays {
                    interval_days,
                    time: single_time(schedule)?,
                    next_take_date: schedule.next_take_date,
                }
            }
            RecurrenceKind::SpecificWeekDays => {
                let mut days = schedule.days_of_week.clone();
                if days.is_empty() {
                    return Err(ScheduleError::missing(
                        kind,
                        "daysOfWeek",
                        "at least one weekday is required",
                    ));
                }
                days.sort_by_key(|day| weekday_index(*day));
                days.dedup();
                Recurrence::SpecificWeekDays {
                    days,
                    time: single_time(schedule)?,
                }
            }
            RecurrenceKind::OnlyAsNeeded => Recurrence::OnlyAsNeeded,
        };
        Ok(recurrence)
    }
}

fn single_time(schedule: &Schedule) -> Result<ClockTime, ScheduleError> {
    schedule.notification_times.first().copied().ok_or_else(|| {
        ScheduleError::missing(
            schedule.kind,
            "notificationTimes",
            "a time of day is required",
        )
    })
}

/// Next occurrence of `schedule` relative to `reference`.
///
/// Returns `Ok(None)` only for as-needed schedules. A missing field required
/// by the schedule's kind is reported as an error instead of being guessed.
pub fn next_occurrence(
    schedule: &Schedule,
    reference: ReferencePoint,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let next = match Recurrence::lower(schedule)? {
        Recurrence::EveryDay {
            times,
            next_take_date,
        } => Some(every_day(schedule, &times, next_take_date, reference)),
        Recurrence::EveryOtherDay {
            time,
            next_take_date,
        } => Some(every_n_days(schedule, 2, time, next_take_date, reference)?),
        Recurrence::EveryXDays {
            interval_days,
            time,
            next_take_date,
        } => Some(every_n_days(
            schedule,
            interval_days,
            time,
            next_take_date,
            reference,
        )?),
        Recurrence::SpecificWeekDays { days, time } => {
            Some(specific_week_days(schedule, &days, time, reference))
        }
        Recurrence::OnlyAsNeeded => None,
    };
    Ok(next)
}

fn every_day(
    schedule: &Schedule,
    times: &[ClockTime],
    next_take_date: Option<DateTime<Utc>>,
    reference: ReferencePoint,
) -> DateTime<Utc> {
    match reference {
        ReferencePoint::Now(now) => {
            first_daily_slot_after(schedule, times, schedule.local_date(now), now)
        }
        ReferencePoint::Taken(taken) => {
            // The slot search starts on the pending dose's day rather than
            // the taken day; a stale pending day rolls forward to the taken day.
            let anchor = next_take_date
                .map(|pending| schedule.local_date(pending))
                .unwrap_or_else(|| schedule.local_date(taken));
            first_daily_slot_after(schedule, times, anchor, taken)
        }
    }
}

/// First slot strictly after `threshold`, searching from `anchor` onwards.
/// `times` must be sorted and non-empty.
pub(crate) fn first_daily_slot_after(
    schedule: &Schedule,
    times: &[ClockTime],
    anchor: NaiveDate,
    threshold: DateTime<Utc>,
) -> DateTime<Utc> {
    if times.is_empty() {
        return threshold;
    }
    let mut day = anchor.max(schedule.local_date(threshold));
    loop {
        if let Some(slot) = times
            .iter()
            .map(|time| schedule.at(day, *time))
            .find(|slot| *slot > threshold)
        {
            return slot;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return threshold,
        }
    }
}

fn every_n_days(
    schedule: &Schedule,
    interval_days: u32,
    time: ClockTime,
    next_take_date: Option<DateTime<Utc>>,
    reference: ReferencePoint,
) -> Result<DateTime<Utc>, ScheduleError> {
    match reference {
        ReferencePoint::Now(_) => next_take_date.ok_or_else(|| {
            ScheduleError::missing(
                schedule.kind,
                "nextTakeDate",
                "interval schedules only advance from a taken date",
            )
        }),
        ReferencePoint::Taken(taken) => {
            let taken_day = schedule.local_date(taken);
            let day = taken_day
                .checked_add_days(Days::new(u64::from(interval_days)))
                .ok_or_else(|| {
                    ScheduleError::invalid("intervalDays", "next date is out of range")
                })?;
            Ok(schedule.at(day, time))
        }
    }
}

fn specific_week_days(
    schedule: &Schedule,
    days: &[Weekday],
    time: ClockTime,
    reference: ReferencePoint,
) -> DateTime<Utc> {
    let basis = match reference {
        ReferencePoint::Now(now) => now,
        ReferencePoint::Taken(taken) => schedule.at(schedule.local_date(taken), time),
    };
    let basis_day = schedule.local_date(basis);
    let basis_index = i64::from(weekday_index(basis_day.weekday()));
    let slot_in = |offset: i64| {
        let day = basis_day
            .checked_add_days(Days::new(offset.max(0) as u64))
            .unwrap_or(basis_day);
        schedule.at(day, time)
    };

    // Today, only while its slot is still ahead of the basis.
    if days.contains(&basis_day.weekday()) {
        let today = slot_in(0);
        if today > basis {
            return today;
        }
    }

    // A later configured weekday in the same week.
    if let Some(later) = days
        .iter()
        .map(|day| i64::from(weekday_index(*day)))
        .find(|index| *index > basis_index)
    {
        return slot_in(later - basis_index);
    }

    // Wrap to the first configured weekday of the following week.
    let first = days
        .first()
        .map(|day| i64::from(weekday_index(*day)))
        .unwrap_or(basis_index);
    slot_in(7 - basis_index + first)
}
