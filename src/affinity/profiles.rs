//! Voice fingerprints and the identity records keyed by them.

use std::fmt;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::store::timestamp;

/// Length of the hex fingerprint derived from raw audio.
const FINGERPRINT_LEN: usize = 16;

/// Opaque identifier derived deterministically from raw voice audio.
///
/// Used as the join key between voice detections and registered users.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a raw audio buffer: the first 16 hex digits of its MD5.
    pub fn from_audio(audio: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(audio);
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FINGERPRINT_LEN);
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A voice that has been heard at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
    #[serde(alias = "first_detected", deserialize_with = "timestamp::deserialize")]
    pub first_seen: DateTime<Utc>,
    #[serde(alias = "last_detected", deserialize_with = "timestamp::deserialize")]
    pub last_seen: DateTime<Utc>,
    pub detection_count: u64,
}

impl VoiceProfile {
    pub(crate) fn first_detection(fingerprint: &Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint: Some(fingerprint.clone()),
            first_seen: now,
            last_seen: now,
            detection_count: 1,
        }
    }

    pub(crate) fn record_detection(&mut self, now: DateTime<Utc>) {
        self.detection_count += 1;
        self.last_seen = now;
    }
}

/// A named user bound to one voice fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Sequential id of the form `user_NNN`.
    pub id: String,
    pub name: String,
    #[serde(alias = "voice_hash")]
    pub fingerprint: Fingerprint,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub registered_at: DateTime<Utc>,
    pub interaction_count: u64,
}

/// Id assigned to the `n`-th registered user (1-based).
pub(crate) fn user_id(n: usize) -> String {
    format!("user_{:03}", n)
}
