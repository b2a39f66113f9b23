//! Hardware and driver change events published by the system monitor.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventKind {
    DeviceConnected,
    DeviceRemoved,
    DriverChanged,
}

impl SystemEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventKind::DeviceConnected => "device_connected",
            SystemEventKind::DeviceRemoved => "device_removed",
            SystemEventKind::DriverChanged => "driver_changed",
        }
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient notification; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub event_id: String,
    pub kind: SystemEventKind,
    pub payload: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SystemEvent {
    pub fn new(kind: SystemEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            payload: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builder-style payload entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    pub fn device_connected(id: &str, description: &str) -> Self {
        Self::new(SystemEventKind::DeviceConnected)
            .with("id", id)
            .with("description", description)
    }

    pub fn device_removed(id: &str, description: &str) -> Self {
        Self::new(SystemEventKind::DeviceRemoved)
            .with("id", id)
            .with("description", description)
    }

    pub fn driver_changed(name: &str, old_status: &str, new_status: &str) -> Self {
        Self::new(SystemEventKind::DriverChanged)
            .with("name", name)
            .with("old_status", old_status)
            .with("new_status", new_status)
    }

    /// One-line human description, used for logs and announcements.
    pub fn summary(&self) -> String {
        match self.kind {
            SystemEventKind::DeviceConnected => {
                format!("USB connected: {}", self.get("description").unwrap_or("unknown device"))
            }
            SystemEventKind::DeviceRemoved => {
                format!("USB disconnected: {}", self.get("description").unwrap_or("unknown device"))
            }
            SystemEventKind::DriverChanged => format!(
                "Driver changed: {} ({} -> {})",
                self.get("name").unwrap_or("unknown driver"),
                self.get("old_status").unwrap_or("?"),
                self.get("new_status").unwrap_or("?"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let event = SystemEvent::device_connected("usb-1", "Keyboard");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "device_connected");
        assert_eq!(json["payload"]["description"], "Keyboard");
    }

    #[test]
    fn test_summary() {
        let event = SystemEvent::driver_changed("Audio", "OK", "Error");
        assert_eq!(event.summary(), "Driver changed: Audio (OK -> Error)");
        assert_eq!(
            SystemEvent::device_removed("usb-2", "Flash drive").summary(),
            "USB disconnected: Flash drive"
        );
    }
}
