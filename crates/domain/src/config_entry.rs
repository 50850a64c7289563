//! Config entry: one configured connection to a remote server.
//!
//! The host stores entries; integrations read them during setup. The
//! `unique_id` of an entry is the remote server's own identifier and is only
//! known once the server has been reached at least once.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::ConfigEntryId;

/// Default Hyperion JSON server port.
pub const DEFAULT_PORT: u16 = 19444;

/// Connection data of a config entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// User-tunable options attached to an entry (read-only to integrations).
pub type EntryOptions = serde_json::Map<String, serde_json::Value>;

/// A configured server connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    #[serde(default)]
    pub entry_id: ConfigEntryId,
    #[serde(default)]
    pub unique_id: Option<String>,
    pub data: ConnectionData,
    #[serde(default)]
    pub options: EntryOptions,
}

impl ConfigEntry {
    /// Create an entry with a fresh id and no options.
    #[must_use]
    pub fn new(unique_id: Option<String>, data: ConnectionData) -> Self {
        Self {
            entry_id: ConfigEntryId::new(),
            unique_id,
            data,
            options: EntryOptions::new(),
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyHost`] when the host is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.data.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        Ok(())
    }

    /// The server id, treating an empty string as absent.
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.unique_id.as_deref().filter(|id| !id.is_empty())
    }
}
