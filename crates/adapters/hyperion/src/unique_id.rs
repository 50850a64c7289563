//! Unique id derivation for Hyperion switches.
//!
//! Format: `{server_id}_{instance_id}_hyperion_switch_{COMPONENT}`, e.g.
//! `abc_1_hyperion_switch_LEDDEVICE`. For a fixed server id the instance id
//! is the run of digits right after the server id and the component is the
//! remainder after the constant infix, so distinct `(instance, component)`
//! pairs never collide.

use lumahub_domain::error::ValidationError;
use lumahub_domain::unique_id::UniqueId;

use crate::model::ComponentType;

/// Entity type prefix of switch unique ids.
pub const TYPE_HYPERION_SWITCH: &str = "hyperion_switch";

/// Derive the unique id of the switch for `component` on `instance_id`.
///
/// # Errors
///
/// Returns a validation error if the derived id is empty.
pub fn switch_unique_id(
    server_id: &str,
    instance_id: u32,
    component: ComponentType,
) -> Result<UniqueId, ValidationError> {
    UniqueId::new(format!(
        "{server_id}_{instance_id}_{TYPE_HYPERION_SWITCH}_{component}"
    ))
}
