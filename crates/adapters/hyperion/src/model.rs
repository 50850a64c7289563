//! Hyperion server data model: instances and their components.
//!
//! Snapshots arrive as JSON from the client collaborator and are read-only
//! to the integration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A switchable Hyperion component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentType {
    #[serde(rename = "BOBLIGHTSERVER")]
    BoblightServer,
    #[serde(rename = "GRABBER")]
    Grabber,
    #[serde(rename = "V4L")]
    V4l,
    #[serde(rename = "USB_CAPTURE")]
    UsbCapture,
    #[serde(rename = "LEDDEVICE")]
    LedDevice,
}

impl ComponentType {
    /// Components that feed an external video/light source into an instance.
    pub const EXTERNAL_SOURCES: [Self; 4] =
        [Self::BoblightServer, Self::Grabber, Self::V4l, Self::UsbCapture];

    /// Every component exposed as a switch: external sources, then the LED output.
    pub const SWITCHABLE: [Self; 5] = [
        Self::BoblightServer,
        Self::Grabber,
        Self::V4l,
        Self::UsbCapture,
        Self::LedDevice,
    ];

    /// Wire name of the component.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BoblightServer => "BOBLIGHTSERVER",
            Self::Grabber => "GRABBER",
            Self::V4l => "V4L",
            Self::UsbCapture => "USB_CAPTURE",
            Self::LedDevice => "LEDDEVICE",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component name the integration does not know how to switch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component {0:?}")]
pub struct UnknownComponent(pub String);

impl FromStr for ComponentType {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SWITCHABLE
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

/// A component as reported by one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub component_type: ComponentType,
    pub enabled: bool,
    pub instance_id: u32,
}

/// A Hyperion instance (one LED setup driven by the server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: u32,
    pub running: bool,
    pub friendly_name: Option<String>,
    /// `None` when the snapshot did not list components at all.
    pub components: Option<Vec<Component>>,
}

#[derive(Deserialize)]
struct RawInstance {
    instance: Option<u32>,
    #[serde(default)]
    running: bool,
    friendly_name: Option<String>,
    components: Option<Vec<RawComponent>>,
}

#[derive(Deserialize)]
struct RawComponent {
    name: String,
    #[serde(default)]
    enabled: bool,
}

impl Instance {
    #[must_use]
    pub fn new(instance_id: u32, running: bool) -> Self {
        Self {
            instance_id,
            running,
            friendly_name: None,
            components: None,
        }
    }

    /// Attach a component list to the snapshot.
    #[must_use]
    pub fn with_components(
        mut self,
        components: impl IntoIterator<Item = (ComponentType, bool)>,
    ) -> Self {
        let instance_id = self.instance_id;
        self.components = Some(
            components
                .into_iter()
                .map(|(component_type, enabled)| Component {
                    component_type,
                    enabled,
                    instance_id,
                })
                .collect(),
        );
        self
    }

    /// Parse one entry of the server's instance list.
    ///
    /// Returns `None` for entries without an `instance` id or with malformed
    /// fields. `running` defaults to `false`; unknown component names are
    /// dropped.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let raw: RawInstance = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed instance entry");
                return None;
            }
        };
        let instance_id = raw.instance?;
        let components = raw.components.map(|list| {
            list.into_iter()
                .filter_map(|c| {
                    let component_type = c.name.parse().ok()?;
                    Some(Component {
                        component_type,
                        enabled: c.enabled,
                        instance_id,
                    })
                })
                .collect()
        });
        Some(Self {
            instance_id,
            running: raw.running,
            friendly_name: raw.friendly_name,
            components,
        })
    }

    /// Parse an instance-list response of the form `{ "data": [...] }`.
    ///
    /// Returns `None` when the response is empty or has no `data` array, in
    /// which case the update must be ignored rather than treated as "no
    /// instances".
    #[must_use]
    pub fn list_from_response(response: &serde_json::Value) -> Option<Vec<Self>> {
        let data = response.as_object()?.get("data")?.as_array()?;
        Some(data.iter().filter_map(Self::from_json).collect())
    }

    /// Whether the snapshot reports `component` (absent lists report nothing).
    #[must_use]
    pub fn reports(&self, component: ComponentType) -> bool {
        self.components
            .as_ref()
            .is_some_and(|list| list.iter().any(|c| c.component_type == component))
    }
}
