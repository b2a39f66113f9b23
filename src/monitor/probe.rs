//! Host resource readings.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Resource snapshot. Readings the host cannot provide are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_usage: Option<f64>,
    pub boot_time: Option<DateTime<Utc>>,
    /// Seconds since boot.
    pub running_time: Option<f64>,
}

pub trait HostProbe: Send + Sync {
    fn system_info(&self) -> SystemInfo;
}

/// A fixed reading.
impl HostProbe for SystemInfo {
    fn system_info(&self) -> SystemInfo {
        self.clone()
    }
}

/// Reads `/proc` on Linux and asks `df` for root filesystem usage.
#[derive(Debug)]
pub struct ProcfsProbe {
    root: PathBuf,
    /// (idle, total) jiffies from the previous reading.
    last_cpu: Mutex<Option<(u64, u64)>>,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_cpu: Mutex::new(None),
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.root.join(name)).ok()
    }

    /// CPU usage since the previous call, or since boot on the first call.
    fn cpu_percent(&self, stat: &str) -> Option<f64> {
        let (idle, total) = parse_cpu_times(stat)?;
        let mut last = self.last_cpu.lock();
        let (prev_idle, prev_total) = last.replace((idle, total)).unwrap_or((0, 0));
        let total_delta = total.saturating_sub(prev_total);
        if total_delta == 0 {
            return None;
        }
        let busy = total_delta.saturating_sub(idle.saturating_sub(prev_idle));
        Some(round1(busy as f64 * 100.0 / total_delta as f64))
    }
}

impl HostProbe for ProcfsProbe {
    fn system_info(&self) -> SystemInfo {
        let stat = self.read("stat");
        let boot_time = stat
            .as_deref()
            .and_then(parse_boot_time)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let running_time = boot_time
            .map(|boot| (Utc::now() - boot).num_milliseconds() as f64 / 1000.0);

        SystemInfo {
            cpu_percent: stat.as_deref().and_then(|s| self.cpu_percent(s)),
            memory_percent: self.read("meminfo").as_deref().and_then(parse_memory_percent),
            disk_usage: root_disk_usage(),
            boot_time,
            running_time,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// (idle, total) from the aggregate `cpu` line of `/proc/stat`.
fn parse_cpu_times(stat: &str) -> Option<(u64, u64)> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some((idle, fields.iter().sum()))
}

fn parse_boot_time(stat: &str) -> Option<i64> {
    stat.lines()
        .find_map(|l| l.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let field = |key: &str| -> Option<f64> {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(key))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some(round1((total - available) * 100.0 / total))
}

/// "Capacity" column of POSIX `df -P` output for the second line.
fn parse_df_capacity(output: &str) -> Option<f64> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .nth(4)?
        .trim_end_matches('%')
        .parse()
        .ok()
}

fn root_disk_usage() -> Option<f64> {
    let output = Command::new("df").args(["-P", "/"]).output().ok()?;
    if !output.status.success() {
        log::debug!("df exited with {}", output.status);
        return None;
    }
    parse_df_capacity(&String::from_utf8_lossy(&output.stdout))
}
