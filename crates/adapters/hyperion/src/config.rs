//! Hyperion integration configuration.

use serde::Deserialize;

use crate::model::ComponentType;

/// Configuration for the Hyperion integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HyperionConfig {
    /// Remove switches whose instance stopped running or disappeared.
    ///
    /// Off by default: switches of instances that go away stay registered.
    pub remove_stale_entities: bool,
    /// Components exposed as switches on every running instance.
    ///
    /// Defaults to every external source followed by the LED output.
    pub components: Vec<ComponentType>,
}

impl Default for HyperionConfig {
    fn default() -> Self {
        Self {
            remove_stale_entities: false,
            components: ComponentType::EXTERNAL_SOURCES
                .into_iter()
                .chain([ComponentType::LedDevice])
                .collect(),
        }
    }
}
