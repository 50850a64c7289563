//! Entity: what the host knows about one integration-owned entity.
//!
//! The integration keeps the live object (see the `ToggleEntity` port in
//! `lumahub-app`); the host only stores the last rendered state.

mod state;

pub use state::EntityState;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Timestamp;
use crate::unique_id::UniqueId;

/// Last rendered state of an entity, as stored by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub unique_id: UniqueId,
    pub name: String,
    pub state: EntityState,
    pub last_changed: Timestamp,
    pub last_updated: Timestamp,
}

impl EntityRecord {
    /// Create a record in the [`Unknown`](EntityState::Unknown) state.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is empty.
    pub fn new(
        unique_id: UniqueId,
        name: impl Into<String>,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self {
            unique_id,
            name,
            state: EntityState::Unknown,
            last_changed: now,
            last_updated: now,
        })
    }

    /// Write a freshly rendered state.
    ///
    /// `last_updated` always moves; `last_changed` only moves when the state
    /// differs. Returns the previous state when it changed.
    pub fn update_state(&mut self, state: EntityState, now: Timestamp) -> Option<EntityState> {
        self.last_updated = now;
        if self.state == state {
            return None;
        }
        self.last_changed = now;
        Some(std::mem::replace(&mut self.state, state))
    }
}
