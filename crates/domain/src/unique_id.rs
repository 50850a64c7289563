//! Integration-assigned unique identifier of an entity.
//!
//! Integrations derive a [`UniqueId`] from whatever stable keys the remote
//! side exposes, so the same logical entity gets the same id across
//! reconnects and restarts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable, integration-scoped entity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    /// Wrap a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyUniqueId`] when `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyUniqueId);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
