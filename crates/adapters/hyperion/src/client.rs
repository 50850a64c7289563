//! Client ports: what the integration needs from a Hyperion protocol client.
//!
//! Connection management, authentication and the JSON wire protocol live in
//! the client implementation; the integration only consumes these traits.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use lumahub_domain::config_entry::ConnectionData;

use crate::model::{ComponentType, Instance};

/// Push notifications a client can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientTopic {
    /// Some component changed state on the client's instance.
    ComponentsUpdate,
    /// The server's instance list changed.
    InstanceUpdate,
}

impl ClientTopic {
    /// Wire name of the notification.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ComponentsUpdate => "components-update",
            Self::InstanceUpdate => "instance-update",
        }
    }
}

/// Callback invoked with the (possibly empty) notification payload.
pub type ClientCallback = Arc<dyn Fn(Option<&serde_json::Value>) + Send + Sync>;

/// Callbacks to register on a client, one per topic.
pub type ClientCallbacks = HashMap<ClientTopic, ClientCallback>;

/// Everything needed to open a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    /// Instance to bind to; `None` keeps the server's default instance.
    pub instance: Option<u32>,
    pub token: Option<String>,
}

impl ConnectParams {
    /// Parameters for a client bound to `instance` on the entry's server.
    #[must_use]
    pub fn for_instance(data: &ConnectionData, instance: u32) -> Self {
        Self {
            host: data.host.clone(),
            port: data.port,
            instance: Some(instance),
            token: data.token.clone(),
        }
    }
}

/// A connected Hyperion client, bound to one instance.
pub trait HyperionClient: Send + Sync + 'static {
    /// Whether the client has received the server's full state at least once.
    fn has_loaded_state(&self) -> bool;

    /// Cached on/off value: `true` iff every listed component is enabled.
    fn is_on(&self, components: &[ComponentType]) -> bool;

    /// Ask the server to enable or disable a component. Returns `false` on failure.
    fn set_component_state(
        &self,
        component: ComponentType,
        enabled: bool,
    ) -> impl Future<Output = bool> + Send;

    /// Replace the callbacks registered for the given topics.
    fn set_callbacks(&self, callbacks: ClientCallbacks);

    /// Close the connection. Returns `false` if it was not open.
    fn disconnect(&self) -> impl Future<Output = bool> + Send;

    /// Instances known to the server, as last reported.
    fn instances(&self) -> Vec<Instance>;
}

/// Opens client connections.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: HyperionClient;

    /// Connect and load state. Returns `None` when the server cannot be reached.
    fn connect(&self, params: &ConnectParams) -> impl Future<Output = Option<Self::Client>> + Send;
}
