//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`LumaHubError`] via `#[from]` (no `String` variants).

/// Top-level error returned across port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum LumaHubError {
    #[error("integration not ready")]
    NotReady(#[from] NotReadyError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("entity unavailable")]
    Unavailable(#[from] UnavailableError),

    #[error("validation error")]
    Validation(#[from] ValidationError),
}

/// Setup could not complete yet; the host is expected to retry later.
#[derive(Debug, thiserror::Error)]
#[error("{integration} is not ready: {reason}")]
pub struct NotReadyError {
    pub integration: &'static str,
    pub reason: &'static str,
}

/// A lookup by identifier found nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A command targeted an entity whose backing device is not reachable.
#[derive(Debug, thiserror::Error)]
#[error("entity {unique_id} is unavailable")]
pub struct UnavailableError {
    pub unique_id: String,
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("unique id must not be empty")]
    EmptyUniqueId,

    #[error("host must not be empty")]
    EmptyHost,
}
