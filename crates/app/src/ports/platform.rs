//! Platform port: where integrations hand over the entities they create.

use std::future::Future;
use std::sync::Arc;

use crate::ports::ToggleEntity;

/// Accepts newly created entities.
///
/// The host takes ownership of the entities and runs their
/// [`added_to_host`](ToggleEntity::added_to_host) hook.
pub trait EntityPlatform<E: ToggleEntity>: Send + Sync {
    /// Add a batch of entities created by one reconciliation pass.
    fn add_entities(&self, entities: Vec<Arc<E>>) -> impl Future<Output = ()> + Send;
}
