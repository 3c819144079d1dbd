use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

pub const MAX_INTERVAL_DAYS: u32 = 365;
pub const MAX_DAILY_TIMES: usize = 12;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceKind {
    EveryDay,
    EveryOtherDay,
    EveryXDays,
    SpecificWeekDays,
    OnlyAsNeeded,
}

impl RecurrenceKind {
    pub const ALL: [RecurrenceKind; 5] = [
        RecurrenceKind::EveryDay,
        RecurrenceKind::EveryOtherDay,
        RecurrenceKind::EveryXDays,
        RecurrenceKind::SpecificWeekDays,
        RecurrenceKind::OnlyAsNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceKind::EveryDay => "EVERY_DAY",
            RecurrenceKind::EveryOtherDay => "EVERY_OTHER_DAY",
            RecurrenceKind::EveryXDays => "EVERY_X_DAYS",
            RecurrenceKind::SpecificWeekDays => "SPECIFIC_WEEK_DAYS",
            RecurrenceKind::OnlyAsNeeded => "ONLY_AS_NEEDED",
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time of day in strict `HH:MM` 24-hour notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl Default for ClockTime {
    /// 08:00, the slot new schedules start from.
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes[..2].iter().all(u8::is_ascii_digit)
            && bytes[3..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(ScheduleError::invalid(
                "notificationTimes",
                format!("`{s}` is not in HH:MM format"),
            ));
        }
        let hour: u32 = s[..2].parse().unwrap_or(u32::MAX);
        let minute: u32 = s[3..].parse().unwrap_or(u32::MAX);
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::invalid(
                "notificationTimes",
                format!("`{s}` is outside 00:00-23:59"),
            ));
        }
        Self::from_hm(hour, minute).ok_or_else(|| {
            ScheduleError::invalid("notificationTimes", format!("`{s}` is not a time of day"))
        })
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Recurrence definition embedded in a medicine or health tracker.
///
/// Field combinations are not enforced by construction; run the validator
/// before handing a schedule to the calculator or the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub kind: RecurrenceKind,
    pub interval_days: u32,
    pub notification_times: Vec<ClockTime>,
    pub time_zone: Tz,
    pub next_take_date: Option<DateTime<Utc>>,
    pub days_of_week: Vec<Weekday>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Schedule {
    /// An as-needed schedule; every other kind starts from here and is
    /// shaped with the `with_*` helpers or `transition::retarget`.
    pub fn new(time_zone: Tz) -> Self {
        Self {
            kind: RecurrenceKind::OnlyAsNeeded,
            interval_days: 0,
            notification_times: Vec::new(),
            time_zone,
            next_take_date: None,
            days_of_week: Vec::new(),
            end_date: None,
        }
    }

    pub fn every_day(time_zone: Tz, times: impl IntoIterator<Item = ClockTime>) -> Self {
        Self {
            kind: RecurrenceKind::EveryDay,
            interval_days: 1,
            notification_times: times.into_iter().collect(),
            ..Self::new(time_zone)
        }
    }

    pub fn every_x_days(
        time_zone: Tz,
        interval_days: u32,
        time: ClockTime,
        next_take_date: DateTime<Utc>,
    ) -> Self {
        let kind = if interval_days == 2 {
            RecurrenceKind::EveryOtherDay
        } else {
            RecurrenceKind::EveryXDays
        };
        Self {
            kind,
            interval_days,
            notification_times: vec![time],
            next_take_date: Some(next_take_date),
            ..Self::new(time_zone)
        }
    }

    pub fn specific_week_days(
        time_zone: Tz,
        days: impl IntoIterator<Item = Weekday>,
        time: ClockTime,
    ) -> Self {
        Self {
            kind: RecurrenceKind::SpecificWeekDays,
            interval_days: 1,
            notification_times: vec![time],
            days_of_week: days.into_iter().collect(),
            ..Self::new(time_zone)
        }
    }

    pub fn with_next_take_date(mut self, next: Option<DateTime<Utc>>) -> Self {
        self.next_take_date = next;
        self
    }

    pub fn with_end_date(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.end_date = end;
        self
    }

    /// True once `now` lies past the end date; no occurrence is planned after that.
    pub fn is_finished(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }

    /// Local calendar date of `instant` in this schedule's zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        local_date(self.time_zone, instant)
    }

    /// Instant of `date` at `time` on this schedule's wall clock.
    pub fn at(&self, date: NaiveDate, time: ClockTime) -> DateTime<Utc> {
        resolve_local(self.time_zone, date, time.as_naive())
    }
}

pub(crate) fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Map a wall-clock reading to an instant. Ambiguous readings (clocks set
/// back) take the earlier instant; readings inside a spring-forward gap move
/// forward until they exist.
pub(crate) fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let mut naive = date.and_time(time);
    for _ in 0..8 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => naive += Duration::minutes(15),
        }
    }
    Utc.from_utc_datetime(&naive)
}

/// Wire index of a weekday, 0 = Sunday.
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

pub fn weekday_from_index(index: i64) -> Option<Weekday> {
    let day = match index {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => return None,
    };
    Some(day)
}

pub fn parse_time_zone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimeZone(name.to_string()))
}
