pub mod calculator;
pub mod display;
pub mod entity;
pub mod error;
pub mod memory;
pub mod notifications;
pub mod schedule;
pub mod service;
pub mod transition;
pub mod validator;
pub mod wire;

pub use crate::calculator::{next_occurrence, ReferencePoint};
pub use crate::error::ScheduleError;
pub use crate::schedule::{ClockTime, RecurrenceKind, Schedule};
pub use crate::service::{ReminderService, ReminderServiceBuilder};
