//! Event: an immutable record of something that happened to an entity.

use serde::{Deserialize, Serialize};

use crate::entity::EntityState;
use crate::id::EventId;
use crate::time::{Timestamp, now};
use crate::unique_id::UniqueId;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    EntityAdded,
    StateChanged { from: EntityState, to: EntityState },
    EntityRemoved,
}

/// A timestamped event about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub unique_id: UniqueId,
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(unique_id: UniqueId, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            unique_id,
            kind,
            timestamp: now(),
        }
    }
}
