use chrono::{DateTime, Utc, Weekday};
use serde::Serialize;

use crate::schedule::{weekday_index, RecurrenceKind, Schedule};

/// Lookup of human-readable strings; the embedding app supplies the catalog.
pub trait Translator {
    fn translate(&self, key: &str) -> String;
}

impl<F> Translator for F
where
    F: Fn(&str) -> String,
{
    fn translate(&self, key: &str) -> String {
        self(key)
    }
}

/// Echoes keys back; handy when no catalog is loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyTranslator;

impl Translator for KeyTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Upcoming,
    Overdue,
    AsNeeded,
    Finished,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoseLabel {
    pub status: DoseStatus,
    pub text: String,
}

pub fn recurrence_key(kind: RecurrenceKind) -> &'static str {
    match kind {
        RecurrenceKind::EveryDay => "schedule.kind.everyDay",
        RecurrenceKind::EveryOtherDay => "schedule.kind.everyOtherDay",
        RecurrenceKind::EveryXDays => "schedule.kind.everyXDays",
        RecurrenceKind::SpecificWeekDays => "schedule.kind.specificWeekDays",
        RecurrenceKind::OnlyAsNeeded => "schedule.kind.onlyAsNeeded",
    }
}

fn weekday_key(day: Weekday) -> &'static str {
    const KEYS: [&str; 7] = [
        "weekday.sun",
        "weekday.mon",
        "weekday.tue",
        "weekday.wed",
        "weekday.thu",
        "weekday.fri",
        "weekday.sat",
    ];
    KEYS[usize::from(weekday_index(day))]
}

/// One-line summary such as "Every 3 days · 09:00".
pub fn describe_recurrence(schedule: &Schedule, translator: &dyn Translator) -> String {
    let mut label = translator.translate(recurrence_key(schedule.kind));
    match schedule.kind {
        RecurrenceKind::EveryXDays => {
            label = label.replace("{days}", &schedule.interval_days.to_string());
        }
        RecurrenceKind::SpecificWeekDays => {
            let mut days = schedule.days_of_week.clone();
            days.sort_by_key(|day| weekday_index(*day));
            let names: Vec<String> = days
                .iter()
                .map(|day| translator.translate(weekday_key(*day)))
                .collect();
            label = label.replace("{days}", &names.join(", "));
        }
        _ => {}
    }

    if schedule.notification_times.is_empty() {
        return label;
    }
    let mut times = schedule.notification_times.clone();
    times.sort();
    let times: Vec<String> = times.iter().map(ToString::to_string).collect();
    format!("{label} · {}", times.join(", "))
}

pub fn describe_next_dose(
    schedule: &Schedule,
    now: DateTime<Utc>,
    translator: &dyn Translator,
) -> DoseLabel {
    if schedule.is_finished(now) {
        return DoseLabel {
            status: DoseStatus::Finished,
            text: translator.translate("schedule.finished"),
        };
    }
    let Some(next) = schedule.next_take_date else {
        return DoseLabel {
            status: DoseStatus::AsNeeded,
            text: translator.translate("schedule.asNeeded"),
        };
    };
    let local = next
        .with_timezone(&schedule.time_zone)
        .format("%Y-%m-%d %H:%M");
    let (status, key) = if next < now {
        (DoseStatus::Overdue, "schedule.overdue")
    } else {
        (DoseStatus::Upcoming, "schedule.nextDose")
    };
    DoseLabel {
        status,
        text: format!("{}: {local}", translator.translate(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn english(key: &str) -> String {
        match key {
            "schedule.kind.everyXDays" => "Every {days} days",
            "schedule.kind.specificWeekDays" => "On {days}",
            "schedule.nextDose" => "Next dose",
            "schedule.overdue" => "Overdue",
            "weekday.mon" => "Mon",
            "weekday.fri" => "Fri",
            other => other,
        }
        .to_string()
    }

    #[test]
    fn describes_recurrence_with_placeholders() {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let every_x = Schedule::every_x_days(Tz::UTC, 3, "09:00".parse().unwrap(), at);
        assert_eq!(describe_recurrence(&every_x, &english), "Every 3 days · 09:00");

        let weekly = Schedule::specific_week_days(
            Tz::UTC,
            [Weekday::Fri, Weekday::Mon],
            "07:30".parse().unwrap(),
        );
        assert_eq!(describe_recurrence(&weekly, &english), "On Mon, Fri · 07:30");
    }

    #[test]
    fn labels_next_dose_relative_to_now() {
        let tz: Tz = "Europe/Warsaw".parse().unwrap();
        let next = Utc.with_ymd_and_hms(2024, 1, 13, 8, 0, 0).unwrap();
        let schedule = Schedule::every_x_days(tz, 3, "09:00".parse().unwrap(), next);

        let before = describe_next_dose(&schedule, next - chrono::Duration::hours(1), &english);
        assert_eq!(before.status, DoseStatus::Upcoming);
        assert_eq!(before.text, "Next dose: 2024-01-13 09:00");

        let after = describe_next_dose(&schedule, next + chrono::Duration::hours(1), &english);
        assert_eq!(after.status, DoseStatus::Overdue);
        assert!(after.text.starts_with("Overdue"));
    }

    #[test]
    fn as_needed_falls_back_to_keys() {
        let label = describe_next_dose(&Schedule::new(Tz::UTC), Utc::now(), &KeyTranslator);
        assert_eq!(label.status, DoseStatus::AsNeeded);
        assert_eq!(label.text, "schedule.asNeeded");
    }
}
