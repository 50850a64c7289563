//! Registry port: unique-id lookup and deletion.

use std::future::Future;

use lumahub_domain::error::LumaHubError;
use lumahub_domain::id::EntityId;
use lumahub_domain::unique_id::UniqueId;

/// Host registry mapping `(platform, unique_id)` to host entity ids.
///
/// Registry entries outlive the live entity objects: removing an entity from
/// the host keeps its entry, deleting the entry forgets it for good.
pub trait EntityRegistry: Send + Sync {
    /// Look up the entity id registered for `unique_id` by `platform`.
    fn entity_id(
        &self,
        platform: &str,
        unique_id: &UniqueId,
    ) -> impl Future<Output = Option<EntityId>> + Send;

    /// Delete a registry entry, removing the live entity first if any.
    fn remove(&self, entity_id: EntityId) -> impl Future<Output = Result<(), LumaHubError>> + Send;
}
