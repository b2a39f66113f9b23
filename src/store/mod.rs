//! Persistence for the assistant's state document.
//!
//! The whole state (voice profiles, user profiles, emotional memory and the
//! affinity level) is stored as one JSON document and rewritten in full on
//! every mutation. [`StateStore`] is the seam; [`JsonFileStore`] is the
//! on-disk implementation and [`MemoryStore`] keeps the document in memory.

pub mod json_file;
pub mod timestamp;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::affinity::profiles::{Fingerprint, UserProfile, VoiceProfile};
use crate::affinity::state::{clamp_level, AffinityChange};

pub use json_file::JsonFileStore;

/// Errors raised while reading or writing the state document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The document could not be decoded and could not be moved aside.
    #[error("Corrupt state document {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Storage backend refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot of everything the assistant persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub voice_profiles: BTreeMap<Fingerprint, VoiceProfile>,
    #[serde(default)]
    pub user_profiles: BTreeMap<Fingerprint, UserProfile>,
    /// Free-form memory; stored and round-tripped untouched.
    #[serde(default)]
    pub emotional_memory: serde_json::Map<String, Value>,
    #[serde(default = "default_love_level")]
    pub love_level: f64,
    #[serde(default)]
    pub affinity_history: Vec<AffinityChange>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

fn default_love_level() -> f64 {
    50.0
}

impl PersistedState {
    /// Fresh document with the given starting affinity.
    pub fn new(base_level: f64) -> Self {
        let now = Utc::now();
        Self {
            voice_profiles: BTreeMap::new(),
            user_profiles: BTreeMap::new(),
            emotional_memory: serde_json::Map::new(),
            love_level: sanitize_level(base_level),
            affinity_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Repair values that would violate invariants after a hand edit.
    pub(crate) fn normalize(mut self) -> Self {
        self.love_level = sanitize_level(self.love_level);
        self
    }
}

fn sanitize_level(level: f64) -> f64 {
    if level.is_finite() {
        clamp_level(level)
    } else {
        default_love_level()
    }
}

/// Backend that can load and atomically replace the state document.
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Load the stored document, or `None` if nothing has been stored yet.
    fn load(&self) -> Result<Option<PersistedState>, StoreError>;

    /// Replace the stored document with `state`.
    ///
    /// Either the whole document is written or the previous one is left in
    /// place; readers never observe a partial write.
    fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

/// Store that keeps the document in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently saved document.
    pub fn last_saved(&self) -> Option<PersistedState> {
        self.document.lock().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        Ok(self.document.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        *self.document.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_clamps_base_level() {
        assert_eq!(PersistedState::new(250.0).love_level, 100.0);
        assert_eq!(PersistedState::new(f64::NAN).love_level, 50.0);
    }

    #[test]
    fn test_legacy_document_loads() {
        let json = r#"{
            "voice_profiles": {
                "a1b2c3d4e5f60718": {
                    "first_detected": "2024-03-01T09:00:00.000001",
                    "detection_count": 2,
                    "last_detected": "2024-03-02T09:00:00.000001"
                }
            },
            "user_profiles": {
                "a1b2c3d4e5f60718": {
                    "id": "user_001",
                    "name": "Ana",
                    "voice_hash": "a1b2c3d4e5f60718",
                    "registered_at": "2024-03-01T09:05:00",
                    "interaction_count": 1
                }
            },
            "emotional_memory": {"last_topic": "music"},
            "love_level": 57.5,
            "created_at": "2024-03-01T08:00:00"
        }"#;

        let state: PersistedState = serde_json::from_str(json).unwrap();
        let fp = Fingerprint::from("a1b2c3d4e5f60718");
        assert_eq!(state.voice_profiles[&fp].detection_count, 2);
        assert_eq!(state.user_profiles[&fp].name, "Ana");
        assert_eq!(state.emotional_memory["last_topic"], "music");
        assert_eq!(state.love_level, 57.5);
        assert!(state.affinity_history.is_empty());
    }

    #[test]
    fn test_normalize_out_of_range_level() {
        let mut state = PersistedState::new(50.0);
        state.love_level = -12.0;
        assert_eq!(state.normalize().love_level, 0.0);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        let state = PersistedState::new(61.0);
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
    }
}
