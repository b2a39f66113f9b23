//! The bounded affinity scalar and its change history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_LEVEL: f64 = 0.0;
pub const MAX_LEVEL: f64 = 100.0;

/// Number of changes kept in the persisted history.
pub const HISTORY_LIMIT: usize = 200;

/// One applied affinity change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityChange {
    pub timestamp: DateTime<Utc>,
    /// Signed amount requested; the resulting level may differ when clamped.
    pub delta: f64,
    /// Level after the change was applied.
    pub level: f64,
    pub cause: String,
}

/// Clamp `level` into `[MIN_LEVEL, MAX_LEVEL]`.
pub fn clamp_level(level: f64) -> f64 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

/// Qualitative band for an affinity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffinityStatus {
    #[serde(rename = "infatuated")]
    Infatuated,
    #[serde(rename = "very warm")]
    VeryWarm,
    #[serde(rename = "warm")]
    Warm,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "distant")]
    Distant,
}

impl AffinityStatus {
    pub fn from_level(level: f64) -> Self {
        if level >= 90.0 {
            AffinityStatus::Infatuated
        } else if level >= 70.0 {
            AffinityStatus::VeryWarm
        } else if level >= 50.0 {
            AffinityStatus::Warm
        } else if level >= 30.0 {
            AffinityStatus::Neutral
        } else {
            AffinityStatus::Distant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AffinityStatus::Infatuated => "infatuated",
            AffinityStatus::VeryWarm => "very warm",
            AffinityStatus::Warm => "warm",
            AffinityStatus::Neutral => "neutral",
            AffinityStatus::Distant => "distant",
        }
    }
}

impl fmt::Display for AffinityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(AffinityStatus::from_level(100.0), AffinityStatus::Infatuated);
        assert_eq!(AffinityStatus::from_level(90.0), AffinityStatus::Infatuated);
        assert_eq!(AffinityStatus::from_level(89.999), AffinityStatus::VeryWarm);
        assert_eq!(AffinityStatus::from_level(70.0), AffinityStatus::VeryWarm);
        assert_eq!(AffinityStatus::from_level(69.9), AffinityStatus::Warm);
        assert_eq!(AffinityStatus::from_level(50.0), AffinityStatus::Warm);
        assert_eq!(AffinityStatus::from_level(30.0), AffinityStatus::Neutral);
        assert_eq!(AffinityStatus::from_level(29.99), AffinityStatus::Distant);
        assert_eq!(AffinityStatus::from_level(0.0), AffinityStatus::Distant);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(AffinityStatus::VeryWarm.to_string(), "very warm");
        assert_eq!(
            serde_json::to_value(AffinityStatus::Infatuated).unwrap(),
            serde_json::json!("infatuated")
        );
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_level(120.0), 100.0);
        assert_eq!(clamp_level(-3.0), 0.0);
        assert_eq!(clamp_level(42.5), 42.5);
    }
}
