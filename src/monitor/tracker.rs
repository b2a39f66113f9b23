//! Snapshot diffing.
//!
//! Both trackers treat their first observation as the baseline and report
//! nothing for it.

use std::collections::BTreeMap;

use super::sources::{DeviceInfo, DriverInfo};
use crate::events::SystemEvent;

#[derive(Debug, Default)]
pub struct DeviceTracker {
    previous: Option<BTreeMap<String, DeviceInfo>>,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `devices` with the previous snapshot, keyed by device id.
    pub fn observe(&mut self, devices: Vec<DeviceInfo>) -> Vec<SystemEvent> {
        let current: BTreeMap<String, DeviceInfo> =
            devices.into_iter().map(|d| (d.id.clone(), d)).collect();

        let events = match &self.previous {
            None => Vec::new(),
            Some(previous) => {
                let connected = current
                    .iter()
                    .filter(|(id, _)| !previous.contains_key(*id))
                    .map(|(id, d)| SystemEvent::device_connected(id, &d.description));
                let removed = previous
                    .iter()
                    .filter(|(id, _)| !current.contains_key(*id))
                    .map(|(id, d)| SystemEvent::device_removed(id, &d.description));
                connected.chain(removed).collect()
            }
        };

        self.previous = Some(current);
        events
    }

    pub fn known(&self) -> usize {
        self.previous.as_ref().map_or(0, BTreeMap::len)
    }
}

#[derive(Debug, Default)]
pub struct DriverTracker {
    statuses: Option<BTreeMap<String, String>>,
}

impl DriverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report status changes of already known drivers.
    ///
    /// Newly seen drivers are recorded silently. Drivers missing from a
    /// snapshot keep their last known status.
    pub fn observe(&mut self, drivers: Vec<DriverInfo>) -> Vec<SystemEvent> {
        let baseline = self.statuses.is_none();
        let statuses = self.statuses.get_or_insert_with(BTreeMap::new);

        let mut events = Vec::new();
        for driver in drivers {
            match statuses.insert(driver.name.clone(), driver.status.clone()) {
                Some(old) if !baseline && old != driver.status => {
                    events.push(SystemEvent::driver_changed(&driver.name, &old, &driver.status));
                }
                _ => {}
            }
        }
        events
    }

    pub fn status_of(&self, name: &str) -> Option<&str> {
        self.statuses.as_ref()?.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SystemEventKind;

    fn kinds(events: &[SystemEvent]) -> Vec<(SystemEventKind, String)> {
        events
            .iter()
            .map(|e| {
                let key = e.get("id").or(e.get("name")).unwrap_or_default().to_string();
                (e.kind, key)
            })
            .collect()
    }

    #[test]
    fn test_device_baseline_is_silent() {
        let mut tracker = DeviceTracker::new();
        let events = tracker.observe(vec![DeviceInfo::new("1-1", "Keyboard")]);
        assert!(events.is_empty());
        assert_eq!(tracker.known(), 1);
    }

    #[test]
    fn test_device_connect_and_remove() {
        let mut tracker = DeviceTracker::new();
        tracker.observe(vec![
            DeviceInfo::new("1-1", "Keyboard"),
            DeviceInfo::new("1-2", "Mouse"),
        ]);

        let events = tracker.observe(vec![
            DeviceInfo::new("1-1", "Keyboard"),
            DeviceInfo::new("2-1", "Flash drive"),
        ]);
        assert_eq!(
            kinds(&events),
            vec![
                (SystemEventKind::DeviceConnected, "2-1".to_string()),
                (SystemEventKind::DeviceRemoved, "1-2".to_string()),
            ]
        );
        assert_eq!(events[1].get("description"), Some("Mouse"));

        assert!(tracker
            .observe(vec![
                DeviceInfo::new("1-1", "Keyboard"),
                DeviceInfo::new("2-1", "Flash drive"),
            ])
            .is_empty());
    }

    #[test]
    fn test_empty_baseline_then_device_appears() {
        let mut tracker = DeviceTracker::new();
        assert!(tracker.observe(Vec::new()).is_empty());
        let events = tracker.observe(vec![DeviceInfo::new("3-1", "Webcam")]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SystemEventKind::DeviceConnected);
    }

    #[test]
    fn test_driver_status_change() {
        let mut tracker = DriverTracker::new();
        assert!(tracker.observe(vec![DriverInfo::new("Audio", "OK")]).is_empty());

        let events = tracker.observe(vec![DriverInfo::new("Audio", "Error")]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("old_status"), Some("OK"));
        assert_eq!(events[0].get("new_status"), Some("Error"));
        assert_eq!(tracker.status_of("Audio"), Some("Error"));
    }

    #[test]
    fn test_new_driver_is_recorded_without_event() {
        let mut tracker = DriverTracker::new();
        tracker.observe(vec![DriverInfo::new("Audio", "OK")]);

        let events = tracker.observe(vec![
            DriverInfo::new("Audio", "OK"),
            DriverInfo::new("Network", "Degraded"),
        ]);
        assert!(events.is_empty());
        assert_eq!(tracker.status_of("Network"), Some("Degraded"));
    }

    #[test]
    fn test_missing_driver_keeps_last_status() {
        let mut tracker = DriverTracker::new();
        tracker.observe(vec![DriverInfo::new("Audio", "OK")]);
        tracker.observe(Vec::new());

        let events = tracker.observe(vec![DriverInfo::new("Audio", "OK")]);
        assert!(events.is_empty());
    }
}
