//! Reconciler: keeps the host's switches in line with the server's instances.
//!
//! Every instance snapshot is diffed against the set of unique ids already
//! handed to the host. Missing `(instance, component)` pairs get a freshly
//! connected client and a new [`HyperionSwitch`]; pairs that disappeared are
//! removed when [`HyperionConfig::remove_stale_entities`] is set.

use std::collections::HashSet;
use std::sync::Arc;

use lumahub_app::ports::{EntityPlatform, EntityRegistry};
use lumahub_app::signal_bus::{Signal, SignalBus};
use lumahub_domain::config_entry::{ConfigEntry, ConnectionData, EntryOptions};
use lumahub_domain::unique_id::UniqueId;

use crate::PLATFORM;
use crate::client::{ClientFactory, ConnectParams};
use crate::config::HyperionConfig;
use crate::error::HyperionError;
use crate::model::{ComponentType, Instance};
use crate::switch::HyperionSwitch;
use crate::unique_id::switch_unique_id;

/// What one diff did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Switches handed to the host, in creation order.
    pub created: Vec<UniqueId>,
    /// Stale switches removed from the host.
    pub removed: Vec<UniqueId>,
    /// Desired switches whose client could not connect; retried on the next update.
    pub skipped: Vec<UniqueId>,
}

impl ReconcileOutcome {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.skipped.is_empty()
    }
}

/// Diff engine of one config entry.
pub struct Reconciler<F, H> {
    server_id: String,
    connection: ConnectionData,
    options: Arc<EntryOptions>,
    config: HyperionConfig,
    factory: F,
    host: Arc<H>,
    signals: SignalBus,
    known: HashSet<UniqueId>,
}

impl<F, H> Reconciler<F, H>
where
    F: ClientFactory,
    H: EntityPlatform<HyperionSwitch<F::Client>> + EntityRegistry,
{
    /// Create a reconciler for `entry`, with no known entities.
    #[must_use]
    pub fn new(
        server_id: impl Into<String>,
        entry: &ConfigEntry,
        config: HyperionConfig,
        factory: F,
        host: Arc<H>,
        signals: SignalBus,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            connection: entry.data.clone(),
            options: Arc::new(entry.options.clone()),
            config,
            factory,
            host,
            signals,
            known: HashSet::new(),
        }
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Unique ids handed to the host so far.
    #[must_use]
    pub fn known(&self) -> &HashSet<UniqueId> {
        &self.known
    }

    /// First diff, run once while the entry is being set up.
    ///
    /// # Errors
    ///
    /// Returns [`HyperionError::Validation`] if a unique id cannot be derived.
    pub async fn setup(&mut self, instances: &[Instance]) -> Result<ReconcileOutcome, HyperionError> {
        tracing::debug!(server_id = %self.server_id, instances = instances.len(), "initial reconcile");
        self.reconcile(instances).await
    }

    /// Diff a fresh instance list.
    ///
    /// # Errors
    ///
    /// Same as [`setup`](Self::setup).
    pub async fn on_instances_updated(
        &mut self,
        instances: &[Instance],
    ) -> Result<ReconcileOutcome, HyperionError> {
        self.reconcile(instances).await
    }

    /// Diff the instance list carried by a server response.
    ///
    /// Returns `Ok(None)` without touching anything when the response has no
    /// `data` array.
    ///
    /// # Errors
    ///
    /// Same as [`setup`](Self::setup).
    pub async fn on_response(
        &mut self,
        response: &serde_json::Value,
    ) -> Result<Option<ReconcileOutcome>, HyperionError> {
        let Some(instances) = Instance::list_from_response(response) else {
            tracing::debug!(server_id = %self.server_id, "ignoring instance update without data");
            return Ok(None);
        };
        self.reconcile(&instances).await.map(Some)
    }

    fn components_for(&self, instance: &Instance) -> Vec<ComponentType> {
        self.config
            .components
            .iter()
            .copied()
            .filter(|c| instance.components.is_none() || instance.reports(*c))
            .collect()
    }

    async fn reconcile(&mut self, instances: &[Instance]) -> Result<ReconcileOutcome, HyperionError> {
        let mut outcome = ReconcileOutcome::default();
        let mut desired = HashSet::new();
        let mut switches = Vec::new();

        for instance in instances.iter().filter(|i| i.running) {
            for component in self.components_for(instance) {
                let unique_id = switch_unique_id(&self.server_id, instance.instance_id, component)?;
                desired.insert(unique_id.clone());
                if self.known.contains(&unique_id) {
                    continue;
                }

                let params = ConnectParams::for_instance(&self.connection, instance.instance_id);
                let Some(client) = self.factory.connect(&params).await else {
                    tracing::warn!(
                        host = %params.host,
                        port = params.port,
                        instance = instance.instance_id,
                        %unique_id,
                        "could not connect to hyperion instance"
                    );
                    outcome.skipped.push(unique_id);
                    continue;
                };

                self.known.insert(unique_id.clone());
                switches.push(Arc::new(HyperionSwitch::new(
                    unique_id.clone(),
                    component,
                    Arc::clone(&self.options),
                    client,
                )));
                outcome.created.push(unique_id);
            }
        }

        if !switches.is_empty() {
            self.host.add_entities(switches).await;
        }

        if self.config.remove_stale_entities {
            let mut stale: Vec<UniqueId> = self.known.difference(&desired).cloned().collect();
            stale.sort();
            for unique_id in stale {
                self.remove_stale(&unique_id).await;
                outcome.removed.push(unique_id);
            }
        }

        if outcome.is_noop() {
            tracing::trace!(server_id = %self.server_id, "hyperion instances already in sync");
            return Ok(outcome);
        }
        tracing::debug!(
            server_id = %self.server_id,
            created = outcome.created.len(),
            removed = outcome.removed.len(),
            skipped = outcome.skipped.len(),
            known = self.known.len(),
            "reconciled hyperion instances"
        );
        Ok(outcome)
    }

    async fn remove_stale(&mut self, unique_id: &UniqueId) {
        self.known.remove(unique_id);
        self.signals
            .send(Signal::EntityRemoved {
                unique_id: unique_id.clone(),
            })
            .await;

        let Some(entity_id) = self.host.entity_id(PLATFORM, unique_id).await else {
            return;
        };
        if let Err(err) = self.host.remove(entity_id).await {
            tracing::warn!(%unique_id, %entity_id, error = %err, "failed to delete registry entry");
        }
    }
}
