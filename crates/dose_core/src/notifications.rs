use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::calculator::Recurrence;
use crate::entity::EntityId;
use crate::error::ScheduleError;
use crate::schedule::{ClockTime, Schedule};

/// Occurrences materialised ahead of time for kinds the OS cannot repeat
/// natively (every other day, every X days).
pub const DEFAULT_LOOKAHEAD: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
    At { instant: DateTime<Utc> },
}

impl TriggerSpec {
    fn daily(time: ClockTime) -> Self {
        TriggerSpec::Daily {
            hour: time.hour(),
            minute: time.minute(),
        }
    }

    fn weekly(weekday: Weekday, time: ClockTime) -> Self {
        TriggerSpec::Weekly {
            weekday,
            hour: time.hour(),
            minute: time.minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedTrigger {
    pub entity_id: EntityId,
    pub content: NotificationContent,
    pub trigger: TriggerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TriggerHandle(pub String);

/// A trigger as reported back by the notification center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledTrigger {
    pub handle: TriggerHandle,
    pub entity_tag: Option<EntityId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("notification permission was denied")]
    PermissionDenied,
    #[error("notification center rejected the request: {0}")]
    Rejected(String),
    #[error("no scheduled trigger with handle `{0}`")]
    UnknownTrigger(String),
}

/// Platform-specific notification adapters will implement this trait.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    async fn schedule_trigger(&self, trigger: &PlannedTrigger)
        -> Result<TriggerHandle, DeliveryError>;
    async fn list_scheduled(&self) -> Result<Vec<ScheduledTrigger>, DeliveryError>;
    async fn cancel_trigger(&self, handle: &TriggerHandle) -> Result<(), DeliveryError>;
}

/// Expand `schedule` into the triggers the notification center should hold
/// for `entity_id`. Pure; nothing is registered.
///
/// Absolute triggers at or before `after` are skipped, and `lookahead`
/// counts only the ones that remain.
pub fn plan_triggers(
    schedule: &Schedule,
    entity_id: &EntityId,
    content: &NotificationContent,
    lookahead: usize,
    after: DateTime<Utc>,
) -> Result<Vec<PlannedTrigger>, ScheduleError> {
    let specs: Vec<TriggerSpec> = match Recurrence::lower(schedule)? {
        Recurrence::EveryDay { times, .. } => times.into_iter().map(TriggerSpec::daily).collect(),
        Recurrence::EveryOtherDay {
            time,
            next_take_date,
        } => absolute_series(schedule, 2, time, next_take_date, lookahead, after)?,
        Recurrence::EveryXDays {
            interval_days,
            time,
            next_take_date,
        } => absolute_series(
            schedule,
            interval_days,
            time,
            next_take_date,
            lookahead,
            after,
        )?,
        Recurrence::SpecificWeekDays { days, time } => days
            .into_iter()
            .map(|day| TriggerSpec::weekly(day, time))
            .collect(),
        Recurrence::OnlyAsNeeded => Vec::new(),
    };

    debug!(entity_id = %entity_id, kind = %schedule.kind, count = specs.len(), "planned triggers");
    Ok(specs
        .into_iter()
        .map(|trigger| PlannedTrigger {
            entity_id: entity_id.clone(),
            content: content.clone(),
            trigger,
        })
        .collect())
}

fn absolute_series(
    schedule: &Schedule,
    interval_days: u32,
    time: ClockTime,
    next_take_date: Option<DateTime<Utc>>,
    lookahead: usize,
    after: DateTime<Utc>,
) -> Result<Vec<TriggerSpec>, ScheduleError> {
    let first = next_take_date.ok_or_else(|| {
        ScheduleError::missing(
            schedule.kind,
            "nextTakeDate",
            "absolute triggers start from the next take date",
        )
    })?;
    let first_day = schedule.local_date(first);
    let step = u64::from(interval_days.max(1));
    let within_end = |instant: &DateTime<Utc>| schedule.end_date.map_or(true, |end| *instant <= end);
    let occurrence = |index: u64| -> Option<DateTime<Utc>> {
        if index == 0 {
            return Some(first);
        }
        let day = first_day.checked_add_days(Days::new(index.checked_mul(step)?))?;
        Some(schedule.at(day, time))
    };

    // Jump close to `after` instead of walking every missed occurrence.
    let mut index = if first > after {
        0
    } else {
        let behind = (schedule.local_date(after) - first_day).num_days().max(0);
        u64::try_from(behind).unwrap_or(0) / step
    };

    let mut series = Vec::with_capacity(lookahead);
    while series.len() < lookahead {
        let Some(instant) = occurrence(index) else {
            break;
        };
        index += 1;
        if instant <= after {
            continue;
        }
        if !within_end(&instant) {
            break;
        }
        series.push(TriggerSpec::At { instant });
    }
    Ok(series)
}

/// Bridges planned triggers to a [`NotificationCenter`].
#[derive(Clone)]
pub struct NotificationPlanner {
    center: Arc<dyn NotificationCenter>,
    lookahead: usize,
}

impl NotificationPlanner {
    pub fn new(center: Arc<dyn NotificationCenter>) -> Self {
        Self {
            center,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead.max(1);
        self
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub fn plan_triggers(
        &self,
        schedule: &Schedule,
        entity_id: &EntityId,
        content: &NotificationContent,
        after: DateTime<Utc>,
    ) -> Result<Vec<PlannedTrigger>, ScheduleError> {
        plan_triggers(schedule, entity_id, content, self.lookahead, after)
    }

    /// Register every trigger. On the first failure the triggers already
    /// registered by this call are cancelled again and the error is returned,
    /// so a batch is either fully registered or not at all.
    #[instrument(skip_all, fields(count = triggers.len()))]
    pub async fn register(
        &self,
        triggers: &[PlannedTrigger],
    ) -> Result<Vec<TriggerHandle>, DeliveryError> {
        let mut handles = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            match self.center.schedule_trigger(trigger).await {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    self.roll_back(&handles).await;
                    return Err(err);
                }
            }
        }
        Ok(handles)
    }

    async fn roll_back(&self, handles: &[TriggerHandle]) {
        for handle in handles {
            if let Err(err) = self.center.cancel_trigger(handle).await {
                warn!(handle = %handle.0, error = %err, "unable to roll back trigger");
            }
        }
        debug!(rolled_back = handles.len(), "rolled back partial registration");
    }

    /// Cancel every trigger tagged with `entity_id`; returns how many were cancelled.
    #[instrument(skip_all, fields(entity_id = %entity_id))]
    pub async fn cancel_all_for_entity(&self, entity_id: &EntityId) -> Result<usize, DeliveryError> {
        let owned: Vec<TriggerHandle> = self
            .center
            .list_scheduled()
            .await?
            .into_iter()
            .filter(|scheduled| scheduled.entity_tag.as_ref() == Some(entity_id))
            .map(|scheduled| scheduled.handle)
            .collect();
        for handle in &owned {
            self.center.cancel_trigger(handle).await?;
        }
        debug!(cancelled = owned.len(), "cancelled entity triggers");
        Ok(owned.len())
    }

    /// Replace the entity's triggers with a fresh plan for `schedule`.
    ///
    /// The old triggers are cancelled before the new batch is registered. If
    /// registration fails the entity is left with no triggers at all until
    /// the next successful reschedule.
    pub async fn reschedule(
        &self,
        schedule: &Schedule,
        entity_id: &EntityId,
        content: &NotificationContent,
        after: DateTime<Utc>,
    ) -> Result<Vec<TriggerHandle>> {
        let triggers = self
            .plan_triggers(schedule, entity_id, content, after)
            .with_context(|| format!("unable to plan reminders for `{entity_id}`"))?;
        self.cancel_all_for_entity(entity_id)
            .await
            .with_context(|| format!("unable to clear reminders for `{entity_id}`"))?;
        let handles = self
            .register(&triggers)
            .await
            .with_context(|| format!("unable to register reminders for `{entity_id}`"))?;
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryNotificationCenter;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Tz;

    fn time(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn content() -> NotificationContent {
        NotificationContent::new("Vitamin D", "Time for your dose")
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    fn before_start() -> DateTime<Utc> {
        start() - Duration::hours(1)
    }

    fn instants(triggers: &[PlannedTrigger]) -> Vec<DateTime<Utc>> {
        triggers
            .iter()
            .map(|t| match t.trigger {
                TriggerSpec::At { instant } => instant,
                ref other => panic!("unexpected trigger {other:?}"),
            })
            .collect()
    }

    #[test]
    fn every_day_plans_one_daily_trigger_per_time() {
        let schedule = Schedule::every_day(Tz::UTC, [time("20:00"), time("08:00")]);
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 30, before_start()).unwrap();
        let specs: Vec<_> = triggers.iter().map(|t| t.trigger.clone()).collect();
        assert_eq!(
            specs,
            vec![
                TriggerSpec::Daily { hour: 8, minute: 0 },
                TriggerSpec::Daily { hour: 20, minute: 0 },
            ]
        );
        assert!(triggers.iter().all(|t| t.entity_id.as_str() == "med"));
    }

    #[test]
    fn every_other_day_materialises_lookahead_window() {
        let schedule = Schedule::every_x_days(Tz::UTC, 2, time("09:00"), start());
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 30, before_start()).unwrap();
        assert_eq!(triggers.len(), 30);
        let instants = instants(&triggers);
        assert_eq!(instants[0], start());
        assert!(instants.windows(2).all(|w| w[1] - w[0] == Duration::days(2)));
    }

    #[test]
    fn every_x_days_stops_at_end_date() {
        let end = start() + Duration::days(10);
        let schedule = Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start())
            .with_end_date(Some(end));
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 30, before_start()).unwrap();
        // Jan 10, 13, 16, 19; Jan 22 is past the end date.
        assert_eq!(triggers.len(), 4);
    }

    #[test]
    fn missed_occurrences_are_skipped_and_window_counts_from_now() {
        let schedule = Schedule::every_x_days(Tz::UTC, 1, time("09:00"), start());
        let now = Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap();
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 30, now).unwrap();
        let instants = instants(&triggers);
        assert_eq!(instants.len(), 30);
        assert_eq!(instants[0], Utc.with_ymd_and_hms(2024, 2, 21, 9, 0, 0).unwrap());
        assert!(instants.iter().all(|instant| *instant > now));
    }

    #[test]
    fn missed_occurrences_stay_on_the_interval_grid() {
        let schedule = Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start());
        // Jan 10, 13, 16 are past; Jan 19 is the first one ahead.
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap();
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 2, now).unwrap();
        assert_eq!(
            instants(&triggers),
            vec![
                Utc.with_ymd_and_hms(2024, 1, 19, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 22, 9, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn week_days_plan_weekly_triggers() {
        let schedule =
            Schedule::specific_week_days(Tz::UTC, [Weekday::Fri, Weekday::Mon], time("07:30"));
        let triggers = plan_triggers(&schedule, &"med".into(), &content(), 30, before_start()).unwrap();
        let weekdays: Vec<Weekday> = triggers
            .iter()
            .filter_map(|t| match t.trigger {
                TriggerSpec::Weekly { weekday, hour: 7, minute: 30 } => Some(weekday),
                _ => None,
            })
            .collect();
        assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Fri]);
    }

    #[test]
    fn as_needed_plans_nothing() {
        let triggers = plan_triggers(&Schedule::new(Tz::UTC), &"med".into(), &content(), 30, before_start());
        assert_eq!(triggers.unwrap(), Vec::new());
    }

    #[test]
    fn interval_without_start_is_a_precondition_error() {
        let schedule =
            Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start()).with_next_take_date(None);
        assert!(plan_triggers(&schedule, &"med".into(), &content(), 30, before_start()).is_err());
    }

    #[tokio::test]
    async fn cancel_all_only_touches_owning_entity() {
        let center = Arc::new(InMemoryNotificationCenter::new());
        let planner = NotificationPlanner::new(center.clone()).with_lookahead(5);
        let daily = Schedule::every_day(Tz::UTC, [time("08:00"), time("20:00")]);
        let interval = Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start());

        let mine = planner.plan_triggers(&daily, &"mine".into(), &content(), before_start()).unwrap();
        let theirs = planner.plan_triggers(&interval, &"theirs".into(), &content(), before_start()).unwrap();
        planner.register(&mine).await.unwrap();
        planner.register(&theirs).await.unwrap();
        assert_eq!(center.scheduled().len(), 7);

        let cancelled = planner.cancel_all_for_entity(&"mine".into()).await.unwrap();
        assert_eq!(cancelled, 2);
        let remaining = center.scheduled();
        assert_eq!(remaining.len(), 5);
        assert!(remaining.iter().all(|t| t.entity_id.as_str() == "theirs"));
    }

    #[tokio::test]
    async fn registration_failure_propagates() {
        let center = Arc::new(InMemoryNotificationCenter::new());
        center.deny_permission();
        let planner = NotificationPlanner::new(center.clone());
        let schedule = Schedule::every_day(Tz::UTC, [time("08:00")]);
        let triggers = planner.plan_triggers(&schedule, &"med".into(), &content(), before_start()).unwrap();
        assert_eq!(
            planner.register(&triggers).await,
            Err(DeliveryError::PermissionDenied)
        );
        assert!(center.scheduled().is_empty());
    }

    #[tokio::test]
    async fn partial_registration_is_rolled_back() {
        let center = Arc::new(InMemoryNotificationCenter::new());
        let planner = NotificationPlanner::new(center.clone()).with_lookahead(5);
        let daily = Schedule::every_day(Tz::UTC, [time("08:00")]);
        let kept = planner.plan_triggers(&daily, &"kept".into(), &content(), before_start()).unwrap();
        planner.register(&kept).await.unwrap();

        center.limit_pending(Some(3));
        let interval = Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start());
        let batch = planner.plan_triggers(&interval, &"med".into(), &content(), before_start()).unwrap();
        assert!(matches!(
            planner.register(&batch).await,
            Err(DeliveryError::Rejected(_))
        ));
        assert!(center.scheduled_for(&"med".into()).is_empty());
        assert_eq!(center.scheduled_for(&"kept".into()).len(), 1);
    }

    #[tokio::test]
    async fn reschedule_replaces_previous_plan() {
        let center = Arc::new(InMemoryNotificationCenter::new());
        let planner = NotificationPlanner::new(center.clone()).with_lookahead(3);
        let id: EntityId = "med".into();
        let daily = Schedule::every_day(Tz::UTC, [time("08:00"), time("20:00")]);
        planner.reschedule(&daily, &id, &content(), before_start()).await.unwrap();
        assert_eq!(center.scheduled_for(&id).len(), 2);

        let interval = Schedule::every_x_days(Tz::UTC, 3, time("09:00"), start());
        let handles = planner.reschedule(&interval, &id, &content(), before_start()).await.unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(center.scheduled_for(&id).len(), 3);
    }
}
