//! Hyperion adapter error types.

use lumahub_domain::error::{LumaHubError, NotReadyError, ValidationError};

use crate::PLATFORM;

/// Errors specific to the Hyperion adapter.
#[derive(Debug, thiserror::Error)]
pub enum HyperionError {
    /// The config entry does not carry the server id yet.
    #[error("config entry has no Hyperion server id")]
    MissingServerId,

    /// A derived identifier or entry failed validation.
    #[error("invalid Hyperion data")]
    Validation(#[source] ValidationError),
}

impl HyperionError {
    /// Convert into a [`LumaHubError`] for propagation across port boundaries.
    ///
    /// A missing server id becomes [`LumaHubError::NotReady`] so the host
    /// retries setup later.
    pub fn into_domain(self) -> LumaHubError {
        match self {
            Self::MissingServerId => NotReadyError {
                integration: PLATFORM,
                reason: "server id not known yet",
            }
            .into(),
            Self::Validation(err) => err.into(),
        }
    }
}

impl From<ValidationError> for HyperionError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<HyperionError> for LumaHubError {
    fn from(err: HyperionError) -> Self {
        err.into_domain()
    }
}
