use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;

/// Identifier of a medicine or health tracker; also the tag attached to
/// every notification trigger registered on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Medicine,
    HealthTracker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub schedule: Schedule,
}

impl ScheduledEntity {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Medicine,
            schedule,
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }
}
