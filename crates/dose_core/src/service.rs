use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    calculator::{next_occurrence, ReferencePoint},
    entity::{EntityId, EntityKind, ScheduledEntity},
    notifications::{NotificationCenter, NotificationContent, NotificationPlanner},
    schedule::RecurrenceKind,
    transition,
    wire::WireEntity,
};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReminderSnapshot {
    pub entities: Vec<WireEntity>,
}

/// Owns the schedulable entities of one user and keeps the notification
/// center in step with their schedules.
pub struct ReminderService {
    entities: RwLock<HashMap<EntityId, ScheduledEntity>>,
    planner: NotificationPlanner,
    clock: Clock,
}

pub struct ReminderServiceBuilder {
    center: Option<Arc<dyn NotificationCenter>>,
    lookahead: Option<usize>,
    clock: Option<Clock>,
}

impl ReminderServiceBuilder {
    pub fn new() -> Self {
        Self {
            center: None,
            lookahead: None,
            clock: None,
        }
    }

    pub fn with_notification_center(mut self, center: Arc<dyn NotificationCenter>) -> Self {
        self.center = Some(center);
        self
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = Some(lookahead);
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<ReminderService> {
        let center = self
            .center
            .ok_or_else(|| anyhow!("a notification center is required"))?;
        let mut planner = NotificationPlanner::new(center);
        if let Some(lookahead) = self.lookahead {
            planner = planner.with_lookahead(lookahead);
        }
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };
        Ok(ReminderService {
            entities: RwLock::new(HashMap::new()),
            planner,
            clock,
        })
    }
}

impl Default for ReminderServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderService {
    pub fn builder() -> ReminderServiceBuilder {
        ReminderServiceBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn entity(&self, id: &EntityId) -> Option<ScheduledEntity> {
        self.entities.read().get(id).cloned()
    }

    pub fn entities(&self) -> Vec<ScheduledEntity> {
        let mut entities: Vec<ScheduledEntity> = self.entities.read().values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    pub fn snapshot(&self) -> ReminderSnapshot {
        ReminderSnapshot {
            entities: self.entities().iter().map(WireEntity::from).collect(),
        }
    }

    /// Validate, fill in the next occurrence, store, and re-plan reminders.
    #[instrument(skip_all, fields(entity_id = %entity.id))]
    pub async fn upsert(&self, mut entity: ScheduledEntity) -> Result<ScheduledEntity> {
        let now = self.now();
        let report = entity.schedule.validate_at(now);
        ensure!(
            report.valid,
            "schedule for `{}` is invalid: {}",
            entity.id,
            report
                .violations
                .iter()
                .map(|v| format!("{}: {}", v.field, v.message))
                .collect::<Vec<_>>()
                .join("; ")
        );

        // Interval kinds keep the user-chosen start; the rest follow the clock.
        entity.schedule.next_take_date = next_occurrence(&entity.schedule, ReferencePoint::Now(now))
            .with_context(|| format!("unable to compute next dose for `{}`", entity.id))?;
        self.entities
            .write()
            .insert(entity.id.clone(), entity.clone());
        info!(kind = %entity.schedule.kind, next = ?entity.schedule.next_take_date, "stored schedule");

        self.sync_triggers(&entity, now).await?;
        Ok(entity)
    }

    /// Advance the schedule past a completed dose and re-plan reminders.
    #[instrument(skip(self, id), fields(entity_id = %id))]
    pub async fn record_dose(
        &self,
        id: &EntityId,
        taken_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.advance(id, taken_at).await
    }

    /// A skipped dose moves the schedule on exactly like a taken one.
    #[instrument(skip(self, id), fields(entity_id = %id))]
    pub async fn skip_dose(
        &self,
        id: &EntityId,
        skipped_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.advance(id, skipped_at).await
    }

    /// Switch the entity to another recurrence kind and re-plan reminders.
    #[instrument(skip(self, id), fields(entity_id = %id))]
    pub async fn change_recurrence(
        &self,
        id: &EntityId,
        kind: RecurrenceKind,
    ) -> Result<ScheduledEntity> {
        let mut entity = self.require(id)?;
        entity.schedule = transition::retarget_at(&entity.schedule, kind, self.now());
        self.upsert(entity).await
    }

    /// Forget the entity and cancel every reminder it owns.
    #[instrument(skip_all, fields(entity_id = %id))]
    pub async fn remove(&self, id: &EntityId) -> Result<Option<ScheduledEntity>> {
        let removed = self.entities.write().remove(id);
        let cancelled = self
            .planner
            .cancel_all_for_entity(id)
            .await
            .with_context(|| format!("unable to cancel reminders for `{id}`"))?;
        debug!(cancelled, "removed entity");
        Ok(removed)
    }

    /// Re-plan every entity. Meant to run when the app comes to the
    /// foreground so materialised interval triggers never run dry.
    ///
    /// A failing entity does not stop the others; the failures are reported
    /// together once every entity has been attempted.
    #[instrument(skip(self))]
    pub async fn replan_all(&self) -> Result<usize> {
        let now = self.now();
        let entities = self.entities();
        let total = entities.len();
        let mut failed = Vec::new();
        for entity in entities {
            let id = entity.id.clone();
            if let Err(err) = self.replan(entity, now).await {
                warn!(entity_id = %id, error = %format!("{err:#}"), "re-planning failed");
                failed.push(id);
            }
        }
        let replanned = total - failed.len();
        info!(replanned, failed = failed.len(), "re-planned reminders");
        if !failed.is_empty() {
            let ids: Vec<String> = failed.iter().map(ToString::to_string).collect();
            bail!(
                "{} of {total} entities could not be re-planned: {}",
                failed.len(),
                ids.join(", ")
            );
        }
        Ok(replanned)
    }

    async fn replan(&self, mut entity: ScheduledEntity, now: DateTime<Utc>) -> Result<()> {
        if refreshes_from_now(entity.schedule.kind)
            && entity.schedule.next_take_date.is_some_and(|next| next <= now)
        {
            entity.schedule.next_take_date =
                next_occurrence(&entity.schedule, ReferencePoint::Now(now))
                    .with_context(|| format!("unable to compute next dose for `{}`", entity.id))?;
            self.store(entity.clone());
        }
        self.sync_triggers(&entity, now).await
    }

    async fn advance(&self, id: &EntityId, basis: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let mut entity = self.require(id)?;
        let next = next_occurrence(&entity.schedule, ReferencePoint::Taken(basis))
            .with_context(|| format!("unable to compute next dose for `{id}`"))?;
        entity.schedule.next_take_date = next;
        self.store(entity.clone());
        debug!(next = ?next, "advanced schedule");
        self.sync_triggers(&entity, self.now()).await?;
        Ok(next)
    }

    async fn sync_triggers(&self, entity: &ScheduledEntity, now: DateTime<Utc>) -> Result<()> {
        if entity.schedule.is_finished(now) {
            warn!(entity_id = %entity.id, "schedule has ended, clearing reminders");
            self.planner
                .cancel_all_for_entity(&entity.id)
                .await
                .with_context(|| format!("unable to cancel reminders for `{}`", entity.id))?;
            return Ok(());
        }
        let content = notification_content(entity);
        self.planner
            .reschedule(&entity.schedule, &entity.id, &content, now)
            .await?;
        Ok(())
    }

    fn require(&self, id: &EntityId) -> Result<ScheduledEntity> {
        self.entity(id)
            .ok_or_else(|| anyhow!("unknown entity `{id}`"))
    }

    fn store(&self, entity: ScheduledEntity) {
        self.entities.write().insert(entity.id.clone(), entity);
    }
}

fn refreshes_from_now(kind: RecurrenceKind) -> bool {
    matches!(
        kind,
        RecurrenceKind::EveryDay | RecurrenceKind::SpecificWeekDays
    )
}

fn notification_content(entity: &ScheduledEntity) -> NotificationContent {
    let body = match entity.kind {
        EntityKind::Medicine => format!("Time to take {}", entity.name),
        EntityKind::HealthTracker => format!("Time to record {}", entity.name),
    };
    NotificationContent::new(entity.name.clone(), body)
}
