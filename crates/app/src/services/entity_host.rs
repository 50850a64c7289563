//! Entity host: in-memory owner of the live entities of one platform.
//!
//! The host keeps three things per platform:
//! - the live entity objects, keyed by unique id
//! - the last rendered [`EntityRecord`] of each live entity
//! - a registry mapping unique ids to host [`EntityId`]s, which outlives
//!   the live objects
//!
//! Every transition is published on the [`InProcessEventBus`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lumahub_domain::entity::{EntityRecord, EntityState};
use lumahub_domain::error::{LumaHubError, NotFoundError, UnavailableError};
use lumahub_domain::event::{Event, EventKind};
use lumahub_domain::id::EntityId;
use lumahub_domain::time::now;
use lumahub_domain::unique_id::UniqueId;

use crate::event_bus::InProcessEventBus;
use crate::ports::{EntityPlatform, EntityRegistry, ToggleEntity};
use crate::signal_bus::SignalBus;

/// One row of the entity registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub entity_id: EntityId,
    pub platform: String,
    pub unique_id: UniqueId,
    pub name: String,
}

/// Handle given to an entity in [`ToggleEntity::added_to_host`].
///
/// It only holds a weak reference to the host, so entities storing it do not
/// keep the host alive.
pub struct HostContext<E> {
    host: Weak<EntityHost<E>>,
    signals: SignalBus,
}

impl<E> Clone for HostContext<E> {
    fn clone(&self) -> Self {
        Self {
            host: Weak::clone(&self.host),
            signals: self.signals.clone(),
        }
    }
}

impl<E: ToggleEntity> HostContext<E> {
    /// The signal bus shared by the host and its integrations.
    #[must_use]
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Store a freshly rendered state.
    pub fn write_state(&self, unique_id: &UniqueId, state: EntityState) {
        if let Some(host) = self.host.upgrade() {
            host.write_state(unique_id, state);
        }
    }

    /// Ask the host to detach the entity. Returns whether it was live.
    pub async fn remove(&self, unique_id: &UniqueId) -> bool {
        match self.host.upgrade() {
            Some(host) => host.remove_entity(unique_id).await,
            None => false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory host for the entities of one platform.
pub struct EntityHost<E> {
    platform: String,
    me: Weak<Self>,
    signals: SignalBus,
    events: InProcessEventBus,
    entities: Mutex<HashMap<UniqueId, Arc<E>>>,
    states: Mutex<HashMap<UniqueId, EntityRecord>>,
    registry: Mutex<HashMap<EntityId, RegistryEntry>>,
}

impl<E: ToggleEntity> EntityHost<E> {
    /// Create a host for `platform` sharing the given buses.
    #[must_use]
    pub fn new(
        platform: impl Into<String>,
        signals: SignalBus,
        events: InProcessEventBus,
    ) -> Arc<Self> {
        let platform = platform.into();
        Arc::new_cyclic(|me| Self {
            platform,
            me: Weak::clone(me),
            signals,
            events,
            entities: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            registry: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    #[must_use]
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    #[must_use]
    pub fn events(&self) -> &InProcessEventBus {
        &self.events
    }

    fn context(&self) -> HostContext<E> {
        HostContext {
            host: Weak::clone(&self.me),
            signals: self.signals.clone(),
        }
    }

    /// The live entity with this unique id.
    #[must_use]
    pub fn entity(&self, unique_id: &UniqueId) -> Option<Arc<E>> {
        lock(&self.entities).get(unique_id).cloned()
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        lock(&self.entities).len()
    }

    /// Unique ids of the live entities, sorted.
    #[must_use]
    pub fn unique_ids(&self) -> Vec<UniqueId> {
        let mut ids: Vec<_> = lock(&self.entities).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Last rendered record of a live entity.
    #[must_use]
    pub fn state(&self, unique_id: &UniqueId) -> Option<EntityRecord> {
        lock(&self.states).get(unique_id).cloned()
    }

    /// Snapshot of the registry, sorted by unique id.
    #[must_use]
    pub fn registry_entries(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = lock(&self.registry).values().cloned().collect();
        entries.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        entries
    }

    fn register(&self, unique_id: &UniqueId, name: &str) -> EntityId {
        let mut registry = lock(&self.registry);
        if let Some(entry) = registry
            .values()
            .find(|e| e.platform == self.platform && &e.unique_id == unique_id)
        {
            return entry.entity_id;
        }
        let entity_id = EntityId::new();
        registry.insert(
            entity_id,
            RegistryEntry {
                entity_id,
                platform: self.platform.clone(),
                unique_id: unique_id.clone(),
                name: name.to_string(),
            },
        );
        entity_id
    }

    fn write_state(&self, unique_id: &UniqueId, state: EntityState) {
        let change = {
            let mut states = lock(&self.states);
            let Some(record) = states.get_mut(unique_id) else {
                tracing::trace!(%unique_id, "ignoring state of untracked entity");
                return;
            };
            record.update_state(state, now())
        };
        if let Some(from) = change {
            tracing::debug!(%unique_id, %from, to = %state, "entity state changed");
            self.events.publish(Event::new(
                unique_id.clone(),
                EventKind::StateChanged { from, to: state },
            ));
        }
    }

    /// Detach a live entity, running its [`will_remove`](ToggleEntity::will_remove)
    /// hook. The registry entry is kept. Returns whether the entity was live.
    pub async fn remove_entity(&self, unique_id: &UniqueId) -> bool {
        let Some(entity) = lock(&self.entities).remove(unique_id) else {
            return false;
        };
        lock(&self.states).remove(unique_id);

        entity.will_remove().await;
        tracing::info!(platform = %self.platform, %unique_id, "entity removed");
        self.events
            .publish(Event::new(unique_id.clone(), EventKind::EntityRemoved));
        true
    }

    /// Detach every live entity, e.g. when the host shuts down.
    pub async fn unload(&self) -> usize {
        let mut removed = 0;
        for unique_id in self.unique_ids() {
            if self.remove_entity(&unique_id).await {
                removed += 1;
            }
        }
        removed
    }

    fn available_entity(&self, unique_id: &UniqueId) -> Result<Arc<E>, LumaHubError> {
        let entity = self.entity(unique_id).ok_or_else(|| NotFoundError {
            entity: "Entity",
            id: unique_id.to_string(),
        })?;
        if !entity.available() {
            return Err(UnavailableError {
                unique_id: unique_id.to_string(),
            }
            .into());
        }
        Ok(entity)
    }

    /// Service call: switch an entity on.
    ///
    /// # Errors
    ///
    /// Returns [`LumaHubError::NotFound`] for unknown entities and
    /// [`LumaHubError::Unavailable`] when the entity reports unavailable.
    pub async fn turn_on(&self, unique_id: &UniqueId) -> Result<(), LumaHubError> {
        self.available_entity(unique_id)?.turn_on().await
    }

    /// Service call: switch an entity off.
    ///
    /// # Errors
    ///
    /// Same as [`turn_on`](Self::turn_on).
    pub async fn turn_off(&self, unique_id: &UniqueId) -> Result<(), LumaHubError> {
        self.available_entity(unique_id)?.turn_off().await
    }
}

impl<E: ToggleEntity> EntityPlatform<E> for EntityHost<E> {
    async fn add_entities(&self, entities: Vec<Arc<E>>) {
        for entity in entities {
            let unique_id = entity.unique_id().clone();
            let record = match EntityRecord::new(unique_id.clone(), entity.name(), now()) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(%unique_id, error = %err, "rejecting invalid entity");
                    continue;
                }
            };
            {
                let mut live = lock(&self.entities);
                if live.contains_key(&unique_id) {
                    tracing::warn!(%unique_id, "entity with this unique id already exists");
                    continue;
                }
                live.insert(unique_id.clone(), Arc::clone(&entity));
            }
            lock(&self.states).insert(unique_id.clone(), record);
            let entity_id = self.register(&unique_id, entity.name());

            tracing::info!(platform = %self.platform, %unique_id, %entity_id, "entity added");
            self.events
                .publish(Event::new(unique_id.clone(), EventKind::EntityAdded));
            entity.added_to_host(self.context());
        }
    }
}

impl<E: ToggleEntity> EntityRegistry for EntityHost<E> {
    async fn entity_id(&self, platform: &str, unique_id: &UniqueId) -> Option<EntityId> {
        lock(&self.registry)
            .values()
            .find(|e| e.platform == platform && &e.unique_id == unique_id)
            .map(|e| e.entity_id)
    }

    async fn remove(&self, entity_id: EntityId) -> Result<(), LumaHubError> {
        let entry = lock(&self.registry)
            .remove(&entity_id)
            .ok_or_else(|| NotFoundError {
                entity: "RegistryEntry",
                id: entity_id.to_string(),
            })?;
        self.remove_entity(&entry.unique_id).await;
        tracing::debug!(%entity_id, unique_id = %entry.unique_id, "registry entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::signal_bus::{Signal, SignalTopic, Subscription};

    /// Minimal toggle entity keeping its own state.
    struct Lamp {
        unique_id: UniqueId,
        on: AtomicBool,
        available: AtomicBool,
        removals: AtomicUsize,
        ctx: Mutex<Option<HostContext<Lamp>>>,
        removal_sub: Mutex<Option<Subscription>>,
    }

    impl Lamp {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                unique_id: UniqueId::new(id).unwrap(),
                on: AtomicBool::new(false),
                available: AtomicBool::new(true),
                removals: AtomicUsize::new(0),
                ctx: Mutex::new(None),
                removal_sub: Mutex::new(None),
            })
        }

        fn render(&self) {
            if let Some(ctx) = lock(&self.ctx).as_ref() {
                ctx.write_state(&self.unique_id, self.state());
            }
        }
    }

    impl ToggleEntity for Lamp {
        fn name(&self) -> &str {
            "lamp"
        }

        fn unique_id(&self) -> &UniqueId {
            &self.unique_id
        }

        fn is_on(&self) -> bool {
            self.on.load(Ordering::SeqCst)
        }

        fn available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }

        async fn turn_on(&self) -> Result<(), LumaHubError> {
            self.on.store(true, Ordering::SeqCst);
            self.render();
            Ok(())
        }

        async fn turn_off(&self) -> Result<(), LumaHubError> {
            self.on.store(false, Ordering::SeqCst);
            self.render();
            Ok(())
        }

        fn added_to_host(&self, ctx: HostContext<Self>) {
            let remover = ctx.clone();
            let unique_id = self.unique_id.clone();
            let sub = ctx.signals().connect(
                SignalTopic::EntityRemoved(unique_id.clone()),
                move |_| {
                    let remover = remover.clone();
                    let unique_id = unique_id.clone();
                    async move {
                        remover.remove(&unique_id).await;
                    }
                },
            );
            *lock(&self.removal_sub) = Some(sub);
            *lock(&self.ctx) = Some(ctx);
            self.render();
        }

        async fn will_remove(&self) {
            self.removals.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = lock(&self.removal_sub).take() {
                sub.disconnect();
            }
        }
    }

    fn host() -> Arc<EntityHost<Lamp>> {
        EntityHost::new("test", SignalBus::new(), InProcessEventBus::new(64))
    }

    #[tokio::test]
    async fn should_render_initial_state_when_added() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;

        assert_eq!(host.entity_count(), 1);
        let record = host.state(&lamp.unique_id).unwrap();
        assert_eq!(record.state, EntityState::Off);
        assert_eq!(record.name, "lamp");
    }

    #[tokio::test]
    async fn should_skip_duplicate_unique_ids() {
        let host = host();
        host.add_entities(vec![Lamp::new("dup"), Lamp::new("dup")])
            .await;
        assert_eq!(host.entity_count(), 1);
        assert_eq!(host.registry_entries().len(), 1);
    }

    #[tokio::test]
    async fn should_publish_added_and_state_changed_events() {
        let host = host();
        let mut rx = host.events().subscribe();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::EntityAdded);
        assert_eq!(
            rx.recv().await.unwrap().kind,
            EventKind::StateChanged {
                from: EntityState::Unknown,
                to: EntityState::Off,
            }
        );
    }

    #[tokio::test]
    async fn should_forward_service_calls() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;

        host.turn_on(&lamp.unique_id).await.unwrap();
        assert_eq!(host.state(&lamp.unique_id).unwrap().state, EntityState::On);

        host.turn_off(&lamp.unique_id).await.unwrap();
        assert_eq!(host.state(&lamp.unique_id).unwrap().state, EntityState::Off);
    }

    #[tokio::test]
    async fn should_reject_commands_for_unavailable_entity() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        lamp.available.store(false, Ordering::SeqCst);
        host.add_entities(vec![Arc::clone(&lamp)]).await;

        assert_eq!(
            host.state(&lamp.unique_id).unwrap().state,
            EntityState::Unavailable
        );
        let result = host.turn_on(&lamp.unique_id).await;
        assert!(matches!(result, Err(LumaHubError::Unavailable(_))));
        assert!(!lamp.is_on());
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_entity() {
        let host = host();
        let result = host.turn_off(&UniqueId::new("nope").unwrap()).await;
        assert!(matches!(result, Err(LumaHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_remove_entity_on_removal_signal() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;

        let delivered = host
            .signals()
            .send(Signal::EntityRemoved {
                unique_id: lamp.unique_id.clone(),
            })
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(host.entity_count(), 0);
        assert!(host.state(&lamp.unique_id).is_none());
        assert_eq!(lamp.removals.load(Ordering::SeqCst), 1);
        assert_eq!(
            host.signals()
                .handler_count(&SignalTopic::EntityRemoved(lamp.unique_id.clone())),
            0
        );
        // the registry entry survives the live object
        assert_eq!(host.registry_entries().len(), 1);
    }

    #[tokio::test]
    async fn should_reuse_registry_entry_when_re_added() {
        let host = host();
        let first = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&first)]).await;
        let id_before = host.entity_id("test", &first.unique_id).await.unwrap();

        host.remove_entity(&first.unique_id).await;
        host.add_entities(vec![Lamp::new("lamp_1")]).await;

        let id_after = host.entity_id("test", &first.unique_id).await.unwrap();
        assert_eq!(id_before, id_after);
    }

    #[tokio::test]
    async fn should_remove_live_entity_when_registry_entry_deleted() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;
        let entity_id = host.entity_id("test", &lamp.unique_id).await.unwrap();

        EntityRegistry::remove(host.as_ref(), entity_id).await.unwrap();

        assert_eq!(host.entity_count(), 0);
        assert!(host.registry_entries().is_empty());
        assert_eq!(lamp.removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_not_find_entry_of_other_platform() {
        let host = host();
        let lamp = Lamp::new("lamp_1");
        host.add_entities(vec![Arc::clone(&lamp)]).await;
        assert!(host.entity_id("other", &lamp.unique_id).await.is_none());
    }

    #[tokio::test]
    async fn should_remove_everything_on_unload() {
        let host = host();
        let a = Lamp::new("a");
        let b = Lamp::new("b");
        host.add_entities(vec![Arc::clone(&a), Arc::clone(&b)]).await;

        assert_eq!(host.unload().await, 2);
        assert_eq!(host.entity_count(), 0);
        assert_eq!(a.removals.load(Ordering::SeqCst), 1);
        assert_eq!(b.removals.load(Ordering::SeqCst), 1);
    }
}
