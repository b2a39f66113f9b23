//! Where device and driver snapshots come from.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A device currently attached to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub description: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// A driver and its reported status string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub name: String,
    pub status: String,
}

impl DriverInfo {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }
}

/// Enumerates attached devices. Called from a blocking thread.
pub trait DeviceSource: Send + Sync {
    fn devices(&self) -> anyhow::Result<Vec<DeviceInfo>>;
}

/// Enumerates drivers and their status. Called from a blocking thread.
pub trait DriverSource: Send + Sync {
    fn drivers(&self) -> anyhow::Result<Vec<DriverInfo>>;
}

pub const SYSFS_USB_ROOT: &str = "/sys/bus/usb/devices";

/// Reads USB devices from the Linux sysfs tree.
#[derive(Debug, Clone)]
pub struct SysfsUsbSource {
    root: PathBuf,
}

impl Default for SysfsUsbSource {
    fn default() -> Self {
        Self::new(SYSFS_USB_ROOT)
    }
}

impl SysfsUsbSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn describe(dir: &Path) -> String {
        let read = |name: &str| {
            fs::read_to_string(dir.join(name))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        match (read("manufacturer"), read("product")) {
            (Some(m), Some(p)) => format!("{} {}", m, p),
            (None, Some(p)) => p,
            (Some(m), None) => m,
            (None, None) => match (read("idVendor"), read("idProduct")) {
                (Some(v), Some(p)) => format!("USB device {}:{}", v, p),
                _ => "USB device".to_string(),
            },
        }
    }
}

impl DeviceSource for SysfsUsbSource {
    fn devices(&self) -> anyhow::Result<Vec<DeviceInfo>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("reading {}", self.root.display()))?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry?;
            let id = entry.file_name().to_string_lossy().into_owned();
            // "1-1:1.0" style names are interfaces of a device, not devices.
            if id.contains(':') {
                continue;
            }
            let description = Self::describe(&entry.path());
            devices.push(DeviceInfo { id, description });
        }
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }
}

/// A fixed driver list, used where the host offers no driver enumeration.
#[derive(Debug, Clone)]
pub struct StaticDriverSource {
    drivers: Vec<DriverInfo>,
}

impl Default for StaticDriverSource {
    fn default() -> Self {
        Self::new(vec![
            DriverInfo::new("Simulated Driver 1", "OK"),
            DriverInfo::new("Simulated Driver 2", "OK"),
        ])
    }
}

impl StaticDriverSource {
    pub fn new(drivers: Vec<DriverInfo>) -> Self {
        Self { drivers }
    }
}

impl DriverSource for StaticDriverSource {
    fn drivers(&self) -> anyhow::Result<Vec<DriverInfo>> {
        Ok(self.drivers.clone())
    }
}
