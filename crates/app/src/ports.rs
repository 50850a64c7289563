//! Port definitions: traits that integrations and the host implement.
//!
//! Ports are the boundaries between the host core and integrations. They are
//! defined here (in `app`) so that both sides can depend on them without
//! creating circular dependencies.

pub mod entity;
pub mod platform;
pub mod registry;

pub use entity::ToggleEntity;
pub use platform::EntityPlatform;
pub use registry::EntityRegistry;
