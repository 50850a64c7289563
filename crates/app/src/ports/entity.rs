//! Entity port: the capability contract of an on/off entity.

use std::future::Future;

use lumahub_domain::entity::EntityState;
use lumahub_domain::error::LumaHubError;
use lumahub_domain::unique_id::UniqueId;

use crate::services::entity_host::HostContext;

/// An entity that can be switched on and off.
///
/// Implementations are plain structs owned by the host once handed over
/// through [`EntityPlatform::add_entities`](crate::ports::EntityPlatform::add_entities).
/// The host calls the lifecycle hooks in order:
///
/// 1. [`added_to_host`](Self::added_to_host): register listeners, render once
/// 2. (service calls: [`turn_on`](Self::turn_on) / [`turn_off`](Self::turn_off))
/// 3. [`will_remove`](Self::will_remove): release resources
pub trait ToggleEntity: Send + Sync + Sized + 'static {
    /// Display name.
    fn name(&self) -> &str;

    /// Integration-assigned key, stable across restarts.
    fn unique_id(&self) -> &UniqueId;

    /// Current on/off value.
    fn is_on(&self) -> bool;

    /// Whether the backing device can be interacted with.
    ///
    /// The host renders unavailable entities as such and rejects commands
    /// against them.
    fn available(&self) -> bool;

    /// Switch on.
    fn turn_on(&self) -> impl Future<Output = Result<(), LumaHubError>> + Send;

    /// Switch off.
    fn turn_off(&self) -> impl Future<Output = Result<(), LumaHubError>> + Send;

    /// Called once the host tracks the entity.
    fn added_to_host(&self, ctx: HostContext<Self>);

    /// Called when the host is about to forget the entity, whatever the reason.
    fn will_remove(&self) -> impl Future<Output = ()> + Send;

    /// State to render from the current availability and on/off value.
    fn state(&self) -> EntityState {
        EntityState::from_toggle(self.available(), self.is_on())
    }
}
