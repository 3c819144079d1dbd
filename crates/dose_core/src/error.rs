use thiserror::Error;

use crate::schedule::RecurrenceKind;

/// Precondition violations raised while working with a schedule.
///
/// These indicate that validation was skipped upstream; callers should treat
/// them as programming errors rather than user input problems.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{kind} schedule is missing {field}: {reason}")]
    MissingField {
        kind: RecurrenceKind,
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unknown time zone `{0}`")]
    UnknownTimeZone(String),
}

impl ScheduleError {
    pub(crate) fn missing(
        kind: RecurrenceKind,
        field: &'static str,
        reason: &'static str,
    ) -> Self {
        Self::MissingField {
            kind,
            field,
            reason,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
