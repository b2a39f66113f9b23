//! Affinity, emotion and voice identity tracking.
//!
//! [`AffinityEngine`] is the only path through which the persisted
//! assistant state changes. It classifies utterances into an
//! [`EmotionLabel`], nudges the bounded affinity level accordingly, and
//! keeps the voice and user tables keyed by [`Fingerprint`].

pub mod emotion;
pub mod engine;
pub mod error;
pub mod profiles;
pub mod state;

pub use emotion::{detect_emotion, EmotionLabel};
pub use engine::{AffinityEngine, RECOGNITION_REWARD};
pub use error::EngineError;
pub use profiles::{Fingerprint, UserProfile, VoiceProfile};
pub use state::{AffinityChange, AffinityStatus};
