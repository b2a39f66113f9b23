//! Engine errors.

use thiserror::Error;

use super::profiles::{Fingerprint, UserProfile};
use crate::store::StoreError;

/// Errors returned by mutating [`AffinityEngine`](super::AffinityEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A user is already registered for this voice.
    #[error("Fingerprint {fingerprint} is already registered to {} ({})", .existing.name, .existing.id)]
    DuplicateFingerprint {
        fingerprint: Fingerprint,
        existing: Box<UserProfile>,
    },

    /// Affinity amounts must be finite and non-negative.
    #[error("Invalid affinity amount: {0}")]
    InvalidAmount(f64),

    /// The new state could not be written; nothing was changed.
    #[error("Failed to persist state: {0}")]
    Persistence(#[from] StoreError),
}
