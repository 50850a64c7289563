//! In-memory client and factory recording every call, for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{ClientCallbacks, ClientFactory, ClientTopic, ConnectParams, HyperionClient};
use crate::model::{ComponentType, Instance};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ClientInner {
    params: Option<ConnectParams>,
    loaded: AtomicBool,
    commands_fail: AtomicBool,
    enabled: Mutex<HashSet<ComponentType>>,
    set_calls: Mutex<Vec<(ComponentType, bool)>>,
    callbacks: Mutex<ClientCallbacks>,
    disconnects: AtomicUsize,
    instances: Mutex<Vec<Instance>>,
}

/// Fake client; clones share state so tests keep a handle after hand-off.
#[derive(Clone, Default)]
pub struct FakeClient {
    inner: Arc<ClientInner>,
}

impl FakeClient {
    pub fn loaded() -> Self {
        let client = Self::default();
        client.set_loaded(true);
        client
    }

    fn connected(params: ConnectParams) -> Self {
        let client = Self {
            inner: Arc::new(ClientInner {
                params: Some(params),
                ..ClientInner::default()
            }),
        };
        client.set_loaded(true);
        client
    }

    pub fn params(&self) -> Option<&ConnectParams> {
        self.inner.params.as_ref()
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.inner.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn set_commands_fail(&self, fail: bool) {
        self.inner.commands_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        *lock(&self.inner.instances) = instances;
    }

    /// Change the cached state without notifying anyone.
    pub fn set_cached(&self, component: ComponentType, enabled: bool) {
        let mut set = lock(&self.inner.enabled);
        if enabled {
            set.insert(component);
        } else {
            set.remove(&component);
        }
    }

    pub fn set_calls(&self) -> Vec<(ComponentType, bool)> {
        lock(&self.inner.set_calls).clone()
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    pub fn has_callback(&self, topic: ClientTopic) -> bool {
        lock(&self.inner.callbacks).contains_key(&topic)
    }

    /// Fire the callback registered for `topic`, as a server push would.
    pub fn push(&self, topic: ClientTopic, payload: Option<&serde_json::Value>) -> bool {
        let callback = lock(&self.inner.callbacks).get(&topic).cloned();
        match callback {
            Some(callback) => {
                callback(payload);
                true
            }
            None => false,
        }
    }
}

impl HyperionClient for FakeClient {
    fn has_loaded_state(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    fn is_on(&self, components: &[ComponentType]) -> bool {
        let enabled = lock(&self.inner.enabled);
        components.iter().all(|c| enabled.contains(c))
    }

    async fn set_component_state(&self, component: ComponentType, enabled: bool) -> bool {
        lock(&self.inner.set_calls).push((component, enabled));
        if self.inner.commands_fail.load(Ordering::SeqCst) {
            return false;
        }
        self.set_cached(component, enabled);
        self.push(ClientTopic::ComponentsUpdate, None);
        true
    }

    fn set_callbacks(&self, callbacks: ClientCallbacks) {
        lock(&self.inner.callbacks).extend(callbacks);
    }

    async fn disconnect(&self) -> bool {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst) == 0
    }

    fn instances(&self) -> Vec<Instance> {
        lock(&self.inner.instances).clone()
    }
}

#[derive(Default)]
struct FactoryInner {
    unreachable: Mutex<HashSet<u32>>,
    attempts: Mutex<Vec<ConnectParams>>,
    clients: Mutex<Vec<FakeClient>>,
}

/// Fake factory handing out [`FakeClient`]s; clones share state.
#[derive(Clone, Default)]
pub struct FakeFactory {
    inner: Arc<FactoryInner>,
}

impl FakeFactory {
    /// Make connections to `instance` fail (or succeed again).
    pub fn set_unreachable(&self, instance: u32, unreachable: bool) {
        let mut set = lock(&self.inner.unreachable);
        if unreachable {
            set.insert(instance);
        } else {
            set.remove(&instance);
        }
    }

    pub fn attempts(&self) -> usize {
        lock(&self.inner.attempts).len()
    }

    /// Clients successfully handed out, in creation order.
    pub fn clients(&self) -> Vec<FakeClient> {
        lock(&self.inner.clients).clone()
    }

    pub fn clients_for(&self, instance: u32) -> Vec<FakeClient> {
        self.clients()
            .into_iter()
            .filter(|c| c.params().and_then(|p| p.instance) == Some(instance))
            .collect()
    }
}

impl ClientFactory for FakeFactory {
    type Client = FakeClient;

    async fn connect(&self, params: &ConnectParams) -> Option<FakeClient> {
        lock(&self.inner.attempts).push(params.clone());
        let unreachable = params
            .instance
            .is_some_and(|i| lock(&self.inner.unreachable).contains(&i));
        if unreachable {
            return None;
        }
        let client = FakeClient::connected(params.clone());
        lock(&self.inner.clients).push(client.clone());
        Some(client)
    }
}
