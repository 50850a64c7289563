//! Hyperion integration for lumahub.
//!
//! Exposes the switchable components of every running instance of a
//! Hyperion server as on/off entities:
//!
//! - [`model`]: instances and components as reported by the server
//! - [`client`]: ports to the protocol client collaborator
//! - [`reconciler`]: keeps the set of switches in line with the instance list
//! - [`switch`]: the switch entity itself
//!
//! [`setup_entry`] wires everything for one config entry.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod switch;
pub mod unique_id;

#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lumahub_app::ports::{EntityPlatform, EntityRegistry};
use lumahub_app::signal_bus::{Signal, SignalBus, SignalTopic};
use lumahub_app::unload::UnloadHooks;
use lumahub_domain::config_entry::ConfigEntry;
use lumahub_domain::id::ConfigEntryId;
use tokio::sync::mpsc;

pub use client::{ClientFactory, ClientTopic, ConnectParams, HyperionClient};
pub use config::HyperionConfig;
pub use error::HyperionError;
pub use model::{Component, ComponentType, Instance};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use switch::HyperionSwitch;

/// Platform name under which switches are registered.
pub const PLATFORM: &str = "hyperion";

/// A reconciler shared between setup and the signal handler driving it.
pub type SharedReconciler<F, H> = Arc<tokio::sync::Mutex<Reconciler<F, H>>>;

/// Set up the switches of one config entry.
///
/// Runs the first diff over the instances known to `root_client`, then keeps
/// reconciling on every [`Signal::InstancesUpdated`] for the entry. Instance
/// pushes of `root_client` are forwarded as such signals, in push order.
/// Both the signal subscription and the forwarding are registered on `hooks`,
/// so unloading the entry stops updates.
///
/// Must be awaited from within a tokio runtime.
///
/// # Errors
///
/// Returns [`HyperionError::Validation`] when the entry has a blank host or
/// a unique id cannot be derived, and [`HyperionError::MissingServerId`]
/// when the entry does not carry the server id yet.
pub async fn setup_entry<R, F, H>(
    entry: &ConfigEntry,
    root_client: &R,
    factory: F,
    host: Arc<H>,
    signals: &SignalBus,
    config: HyperionConfig,
    hooks: &mut UnloadHooks,
) -> Result<SharedReconciler<F, H>, HyperionError>
where
    R: HyperionClient,
    F: ClientFactory,
    H: EntityPlatform<HyperionSwitch<F::Client>> + EntityRegistry + 'static,
{
    entry.validate()?;
    let server_id = entry
        .server_id()
        .ok_or(HyperionError::MissingServerId)?
        .to_string();

    let mut reconciler = Reconciler::new(server_id, entry, config, factory, host, signals.clone());
    let outcome = reconciler.setup(&root_client.instances()).await?;
    tracing::info!(
        entry_id = %entry.entry_id,
        server_id = %reconciler.server_id(),
        switches = outcome.created.len(),
        known = reconciler.known().len(),
        "hyperion entry set up"
    );

    let reconciler = Arc::new(tokio::sync::Mutex::new(reconciler));
    let handle = Arc::clone(&reconciler);
    let subscription = signals.connect(
        SignalTopic::InstancesUpdated(entry.entry_id),
        move |signal| {
            let reconciler = Arc::clone(&handle);
            async move {
                let Signal::InstancesUpdated { payload, .. } = signal else {
                    return;
                };
                let mut reconciler = reconciler.lock().await;
                if let Err(err) = reconciler.on_response(&payload).await {
                    tracing::warn!(error = %err, "failed to reconcile hyperion instances");
                }
            }
        },
    );
    hooks.push(subscription);

    let forwarder = InstanceUpdateForwarder::spawn(root_client, signals, entry.entry_id);
    hooks.push_release(move || forwarder.stop());

    Ok(reconciler)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type PayloadSender = mpsc::UnboundedSender<serde_json::Value>;

/// Relays instance-list pushes of a root client as
/// [`Signal::InstancesUpdated`].
///
/// The client callback only enqueues the payload; a single worker task per
/// entry sends the signals one after the other, so updates are reconciled in
/// the order they were pushed.
struct InstanceUpdateForwarder {
    entry_id: ConfigEntryId,
    sender: Arc<Mutex<Option<PayloadSender>>>,
}

impl InstanceUpdateForwarder {
    fn spawn<R: HyperionClient>(client: &R, signals: &SignalBus, entry_id: ConfigEntryId) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sender = Arc::new(Mutex::new(Some(sender)));

        let signals = signals.clone();
        tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                signals
                    .send(Signal::InstancesUpdated { entry_id, payload })
                    .await;
            }
            tracing::debug!(%entry_id, "instance update forwarding stopped");
        });

        let slot = Arc::clone(&sender);
        let callback: client::ClientCallback = Arc::new(move |payload| {
            let payload = payload.cloned().unwrap_or_default();
            let delivered = lock(&slot)
                .as_ref()
                .is_some_and(|sender| sender.send(payload).is_ok());
            if !delivered {
                tracing::trace!(
                    %entry_id,
                    topic = ClientTopic::InstanceUpdate.as_str(),
                    "dropping push of unloaded entry"
                );
            }
        });
        client.set_callbacks(HashMap::from([(ClientTopic::InstanceUpdate, callback)]));

        Self { entry_id, sender }
    }

    /// Stop forwarding. Pushes already queued are still delivered.
    fn stop(self) {
        if lock(&self.sender).take().is_some() {
            tracing::debug!(entry_id = %self.entry_id, "stopping instance update forwarding");
        }
    }
}
