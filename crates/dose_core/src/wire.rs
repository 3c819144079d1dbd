//! Loosely typed schedule shape exchanged with the remote API and captured by
//! forms. Conversion to and from the in-memory [`Schedule`] happens here and
//! nowhere else.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind, ScheduledEntity};
use crate::error::ScheduleError;
use crate::schedule::{
    parse_time_zone, weekday_from_index, weekday_index, ClockTime, RecurrenceKind, Schedule,
    MAX_INTERVAL_DAYS,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireSchedule {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    #[serde(default)]
    pub interval_days: i64,
    #[serde(default)]
    pub notification_times: Vec<String>,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub next_take_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    pub schedule: WireSchedule,
}

pub fn parse_instant(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ScheduleError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| ScheduleError::invalid(field, format!("`{raw}`: {err}")))
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a JSON array of entities as served by the remote API.
pub fn entities_from_json(raw: &str) -> serde_json::Result<Vec<WireEntity>> {
    serde_json::from_str(raw)
}

impl TryFrom<&WireSchedule> for Schedule {
    type Error = ScheduleError;

    fn try_from(wire: &WireSchedule) -> Result<Self, Self::Error> {
        let interval_days = u32::try_from(wire.interval_days)
            .ok()
            .filter(|days| *days <= MAX_INTERVAL_DAYS)
            .ok_or_else(|| {
                ScheduleError::invalid(
                    "intervalDays",
                    format!("{} is outside 0-{MAX_INTERVAL_DAYS}", wire.interval_days),
                )
            })?;
        let notification_times = wire
            .notification_times
            .iter()
            .map(|raw| raw.parse::<ClockTime>())
            .collect::<Result<Vec<_>, _>>()?;
        let days_of_week = wire
            .days_of_week
            .iter()
            .flatten()
            .map(|index| {
                weekday_from_index(*index).ok_or_else(|| {
                    ScheduleError::invalid("daysOfWeek", format!("{index} is outside 0-6"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let next_take_date = wire
            .next_take_date
            .as_deref()
            .map(|raw| parse_instant("nextTakeDate", raw))
            .transpose()?;
        let end_date = wire
            .end_date
            .as_deref()
            .map(|raw| parse_instant("endDate", raw))
            .transpose()?;

        Ok(Schedule {
            kind: wire.kind,
            interval_days,
            notification_times,
            time_zone: parse_time_zone(&wire.time_zone)?,
            next_take_date,
            days_of_week,
            end_date,
        })
    }
}

impl TryFrom<WireSchedule> for Schedule {
    type Error = ScheduleError;

    fn try_from(wire: WireSchedule) -> Result<Self, Self::Error> {
        Schedule::try_from(&wire)
    }
}

impl From<&Schedule> for WireSchedule {
    fn from(schedule: &Schedule) -> Self {
        let days_of_week = (!schedule.days_of_week.is_empty()).then(|| {
            schedule
                .days_of_week
                .iter()
                .map(|day| i64::from(weekday_index(*day)))
                .collect()
        });
        WireSchedule {
            kind: schedule.kind,
            interval_days: i64::from(schedule.interval_days),
            notification_times: schedule
                .notification_times
                .iter()
                .map(ToString::to_string)
                .collect(),
            time_zone: schedule.time_zone.name().to_string(),
            next_take_date: schedule.next_take_date.map(format_instant),
            days_of_week,
            end_date: schedule.end_date.map(format_instant),
        }
    }
}

impl TryFrom<&WireEntity> for ScheduledEntity {
    type Error = ScheduleError;

    fn try_from(wire: &WireEntity) -> Result<Self, Self::Error> {
        Ok(ScheduledEntity {
            id: EntityId::new(wire.id.clone()),
            name: wire.name.clone(),
            kind: wire.kind,
            schedule: Schedule::try_from(&wire.schedule)?,
        })
    }
}

impl From<&ScheduledEntity> for WireEntity {
    fn from(entity: &ScheduledEntity) -> Self {
        WireEntity {
            id: entity.id.to_string(),
            name: entity.name.clone(),
            kind: entity.kind,
            schedule: WireSchedule::from(&entity.schedule),
        }
    }
}
