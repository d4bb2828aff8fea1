//! Hook-carrying message shapes.
//!
//! The device service publishes an event once per registered hook. Each copy carries
//! the hook it was produced for, and the hook carries the tenant's secret.

use serde::{Deserialize, Serialize};

use hooksink_core::{DeviceEvent, TenantSecret};

/// A tenant's registered analytics hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub name: String,
    pub google_client_secret: TenantSecret,
}

impl Hook {
    pub fn secret(&self) -> &TenantSecret {
        &self.google_client_secret
    }
}

/// Direct event hook: a device event paired with the hook to deliver it to.
///
/// This is the canonical shape the ingestion client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHook {
    pub device_event: DeviceEvent,
    pub hook: Hook,
}

impl EventHook {
    pub fn new(device_event: DeviceEvent, hook: Hook) -> Self {
        Self { device_event, hook }
    }
}

/// Change envelope emitted when a device's state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceChangeEvent {
    pub device_event: DeviceEvent,
}

/// Change-event hook: wraps a device event in a change envelope, with its own hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEventHook {
    pub device_change_event: DeviceChangeEvent,
    pub hook: Hook,
}

impl ChangeEventHook {
    /// Extract the inner event and pair it with this envelope's own (outer) hook.
    pub fn into_event_hook(self) -> EventHook {
        EventHook {
            device_event: self.device_change_event.device_event,
            hook: self.hook,
        }
    }
}
