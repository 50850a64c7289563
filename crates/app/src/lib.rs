//! # lumahub-app
//!
//! Application layer: host **port definitions** (traits) and the in-process
//! infrastructure integrations plug into.
//!
//! ## Responsibilities
//! - Define **port traits** integrations and the host meet at:
//!   - `ToggleEntity`: the capability contract of an on/off entity
//!   - `EntityPlatform`: where integrations hand newly created entities
//!   - `EntityRegistry`: unique-id lookup and deletion
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `SignalBus`: typed dispatcher keyed by `(kind, id)` topics
//!   - `InProcessEventBus`: broadcast of entity added/changed/removed events
//!   - `UnloadHooks`: subscriptions to drop when a config entry unloads
//! - Provide `EntityHost`, the in-memory host driving entity lifecycles
//!
//! ## Dependency rule
//! Depends on `lumahub-domain` only (plus `tokio::sync` for channels and
//! `serde_json` for signal payloads).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
pub mod signal_bus;
pub mod unload;
