//! Hyperion switch: one on/off entity per (instance, component) pair.
//!
//! The switch keeps no state of its own: `is_on` and `available` read the
//! client's cache, commands go straight to the server, and client pushes
//! only trigger a re-render.
//!
//! Lifecycle: `Uninitialized` → `Active` (added to the host) → `Removed`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lumahub_app::ports::ToggleEntity;
use lumahub_app::services::entity_host::HostContext;
use lumahub_app::signal_bus::{SignalTopic, Subscription};
use lumahub_domain::config_entry::EntryOptions;
use lumahub_domain::entity::EntityState;
use lumahub_domain::error::LumaHubError;
use lumahub_domain::unique_id::UniqueId;

use crate::client::{ClientCallback, ClientTopic, HyperionClient};
use crate::model::ComponentType;

enum Lifecycle {
    Uninitialized,
    Active { removal: Subscription },
    Removed,
}

/// Switch entity toggling one component of one Hyperion instance.
pub struct HyperionSwitch<C> {
    unique_id: UniqueId,
    component: ComponentType,
    options: Arc<EntryOptions>,
    client: Arc<C>,
    lifecycle: Mutex<Lifecycle>,
}

fn render<C: HyperionClient>(
    ctx: &HostContext<HyperionSwitch<C>>,
    client: &C,
    unique_id: &UniqueId,
    component: ComponentType,
) {
    let state = EntityState::from_toggle(client.has_loaded_state(), client.is_on(&[component]));
    ctx.write_state(unique_id, state);
}

impl<C: HyperionClient> HyperionSwitch<C> {
    /// Create a switch owning `client`, a connection bound to the switch's instance.
    #[must_use]
    pub fn new(
        unique_id: UniqueId,
        component: ComponentType,
        options: Arc<EntryOptions>,
        client: C,
    ) -> Self {
        Self {
            unique_id,
            component,
            options,
            client: Arc::new(client),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    #[must_use]
    pub fn component(&self) -> ComponentType {
        self.component
    }

    /// Entry options captured when the switch was created.
    #[must_use]
    pub fn options(&self) -> &EntryOptions {
        &self.options
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Active { .. })
    }

    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Removed)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Callback re-rendering on every components push. The payload is
    /// ignored: the push only says the cache changed.
    fn components_callback(&self, ctx: HostContext<Self>) -> ClientCallback {
        // weak: the client stores this callback and the switch owns the client
        let client: Weak<C> = Arc::downgrade(&self.client);
        let unique_id = self.unique_id.clone();
        let component = self.component;
        Arc::new(move |_payload| {
            if let Some(client) = client.upgrade() {
                render(&ctx, client.as_ref(), &unique_id, component);
            }
        })
    }
}

impl<C: HyperionClient> ToggleEntity for HyperionSwitch<C> {
    fn name(&self) -> &str {
        self.component.as_str()
    }

    fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    fn is_on(&self) -> bool {
        self.client.is_on(&[self.component])
    }

    fn available(&self) -> bool {
        self.client.has_loaded_state()
    }

    async fn turn_on(&self) -> Result<(), LumaHubError> {
        if self.is_on() {
            tracing::trace!(unique_id = %self.unique_id, "already on");
            return Ok(());
        }
        if !self.client.set_component_state(self.component, true).await {
            tracing::debug!(unique_id = %self.unique_id, "failed to enable component");
        }
        Ok(())
    }

    async fn turn_off(&self) -> Result<(), LumaHubError> {
        if !self.client.set_component_state(self.component, false).await {
            tracing::debug!(unique_id = %self.unique_id, "failed to disable component");
        }
        Ok(())
    }

    fn added_to_host(&self, ctx: HostContext<Self>) {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Uninitialized) {
            tracing::warn!(unique_id = %self.unique_id, "switch added to host twice");
            return;
        }

        let remover = ctx.clone();
        let unique_id = self.unique_id.clone();
        let removal = ctx.signals().connect(
            SignalTopic::EntityRemoved(self.unique_id.clone()),
            move |_| {
                let remover = remover.clone();
                let unique_id = unique_id.clone();
                async move {
                    remover.remove(&unique_id).await;
                }
            },
        );

        self.client.set_callbacks(HashMap::from([(
            ClientTopic::ComponentsUpdate,
            self.components_callback(ctx.clone()),
        )]));

        *lifecycle = Lifecycle::Active { removal };
        drop(lifecycle);

        render(&ctx, self.client.as_ref(), &self.unique_id, self.component);
    }

    async fn will_remove(&self) {
        let removal = match std::mem::replace(&mut *self.lifecycle(), Lifecycle::Removed) {
            Lifecycle::Removed => return,
            Lifecycle::Active { removal } => Some(removal),
            Lifecycle::Uninitialized => None,
        };
        if let Some(removal) = removal {
            removal.disconnect();
        }
        if !self.client.disconnect().await {
            tracing::debug!(unique_id = %self.unique_id, "client was already disconnected");
        }
    }
}
