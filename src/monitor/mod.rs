//! Device and driver polling.
//!
//! Each enabled loop periodically takes a snapshot from its source on a
//! blocking thread, diffs it against the previous one and publishes the
//! resulting [`SystemEvent`]s on the [`EventBus`].

pub mod probe;
pub mod sources;
pub mod tracker;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use probe::{HostProbe, ProcfsProbe, SystemInfo};
pub use sources::{
    DeviceInfo, DeviceSource, DriverInfo, DriverSource, StaticDriverSource, SysfsUsbSource,
};
pub use tracker::{DeviceTracker, DriverTracker};

use crate::config::SystemSection;
use crate::events::{EventBus, SystemEvent};
use crate::supervisor::Supervisor;

pub struct SystemMonitor {
    bus: Arc<EventBus>,
    devices: Arc<dyn DeviceSource>,
    drivers: Arc<dyn DriverSource>,
    monitor_devices: bool,
    monitor_drivers: bool,
    device_interval: Duration,
    driver_interval: Duration,
}

impl SystemMonitor {
    pub fn new(
        bus: Arc<EventBus>,
        devices: Arc<dyn DeviceSource>,
        drivers: Arc<dyn DriverSource>,
        config: &SystemSection,
    ) -> Self {
        Self {
            bus,
            devices,
            drivers,
            monitor_devices: config.monitor_usb,
            monitor_drivers: config.monitor_drivers,
            device_interval: Duration::from_secs(config.usb_interval_secs.max(1)),
            driver_interval: Duration::from_secs(config.driver_interval_secs.max(1)),
        }
    }

    pub fn with_intervals(mut self, devices: Duration, drivers: Duration) -> Self {
        self.device_interval = devices;
        self.driver_interval = drivers;
        self
    }

    /// Start the enabled polling loops under `supervisor`.
    pub fn spawn(self, supervisor: &mut Supervisor) {
        if self.monitor_devices {
            let source = Arc::clone(&self.devices);
            let bus = Arc::clone(&self.bus);
            let period = self.device_interval;
            supervisor.spawn("usb-monitor", move |token| async move {
                let mut tracker = DeviceTracker::new();
                poll_loop(
                    "usb",
                    period,
                    token,
                    bus,
                    move || source.devices(),
                    move |snapshot| tracker.observe(snapshot),
                )
                .await
            });
        } else {
            log::info!("USB monitoring disabled");
        }

        if self.monitor_drivers {
            let source = Arc::clone(&self.drivers);
            let bus = Arc::clone(&self.bus);
            let period = self.driver_interval;
            supervisor.spawn("driver-monitor", move |token| async move {
                let mut tracker = DriverTracker::new();
                poll_loop(
                    "driver",
                    period,
                    token,
                    bus,
                    move || source.drivers(),
                    move |snapshot| tracker.observe(snapshot),
                )
                .await
            });
        } else {
            log::info!("Driver monitoring disabled");
        }
    }
}

async fn poll_loop<T, F, D>(
    label: &'static str,
    period: Duration,
    token: CancellationToken,
    bus: Arc<EventBus>,
    fetch: F,
    mut diff: D,
) where
    T: Send + 'static,
    F: Fn() -> anyhow::Result<Vec<T>> + Send + Sync + 'static,
    D: FnMut(Vec<T>) -> Vec<SystemEvent>,
{
    let fetch = Arc::new(fetch);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    log::info!("Started {} monitor (every {:?})", label, period);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetch = Arc::clone(&fetch);
        let snapshot = match tokio::task::spawn_blocking(move || fetch()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                log::warn!("{} poll failed: {:#}", label, e);
                continue;
            }
            Err(e) => {
                log::error!("{} poll task failed: {}", label, e);
                continue;
            }
        };

        for event in diff(snapshot) {
            log::info!("{}", event.summary());
            bus.publish(&event);
        }
    }
    log::info!("Stopped {} monitor", label);
}
