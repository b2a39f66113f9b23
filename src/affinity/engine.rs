//! The affinity engine: sole owner of the persisted assistant state.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use super::emotion::{detect_emotion, EmotionLabel};
use super::error::EngineError;
use super::profiles::{user_id, Fingerprint, UserProfile, VoiceProfile};
use super::state::{clamp_level, AffinityChange, AffinityStatus, HISTORY_LIMIT};
use crate::store::{PersistedState, StateStore};

/// Affinity reward for recognising a registered user's voice.
pub const RECOGNITION_REWARD: f64 = 1.0;

/// Tracks affinity, voices and users, writing every change through to a
/// [`StateStore`].
///
/// Every mutation runs under a single lock: the change is applied to a copy
/// of the state, the copy is saved, and only then does it replace the live
/// state. A failed save therefore leaves both memory and disk untouched.
#[derive(Debug)]
pub struct AffinityEngine {
    state: Mutex<PersistedState>,
    store: Arc<dyn StateStore>,
}

impl AffinityEngine {
    /// Load the stored document, or initialise and save a fresh one at
    /// `base_level`.
    pub fn open(store: Arc<dyn StateStore>, base_level: f64) -> Result<Self, EngineError> {
        let state = match store.load()? {
            Some(state) => {
                log::info!(
                    "Loaded state: {} voices, {} users, affinity {:.1}",
                    state.voice_profiles.len(),
                    state.user_profiles.len(),
                    state.love_level
                );
                state
            }
            None => {
                let state = PersistedState::new(base_level);
                store.save(&state)?;
                log::info!("Initialised new state document at affinity {:.1}", state.love_level);
                state
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            store,
        })
    }

    /// Apply `f` to a copy of the state, persist it, then commit it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut PersistedState) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        next.updated_at = Utc::now();
        self.store.save(&next)?;
        *guard = next;
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Affinity
    // -----------------------------------------------------------------------

    /// Raise affinity by `amount`, saturating at 100. Returns the new level.
    pub fn increase(&self, amount: f64, cause: &str) -> Result<f64, EngineError> {
        check_amount(amount)?;
        self.mutate(|state| Ok(apply_delta(state, amount, cause)))
    }

    /// Lower affinity by `amount`, saturating at 0. Returns the new level.
    pub fn decrease(&self, amount: f64, cause: &str) -> Result<f64, EngineError> {
        check_amount(amount)?;
        self.mutate(|state| Ok(apply_delta(state, -amount, cause)))
    }

    pub fn affinity_level(&self) -> f64 {
        self.state.lock().love_level
    }

    pub fn affinity_status(&self) -> AffinityStatus {
        AffinityStatus::from_level(self.affinity_level())
    }

    // -----------------------------------------------------------------------
    // Emotion
    // -----------------------------------------------------------------------

    /// Classify `text` and apply the matching emotion's affinity delta once.
    ///
    /// Neutral text changes nothing and is not persisted.
    pub fn classify_emotion(&self, text: &str) -> Result<EmotionLabel, EngineError> {
        let emotion = detect_emotion(text);
        if let Some(delta) = emotion.affinity_delta() {
            let cause = format!("emotion:{}", emotion);
            self.mutate(|state| Ok(apply_delta(state, delta, &cause)))?;
            log::debug!("Detected {} (delta {:+})", emotion, delta);
        }
        Ok(emotion)
    }

    // -----------------------------------------------------------------------
    // Voices and users
    // -----------------------------------------------------------------------

    /// Record a detection of `fingerprint`, creating its profile on first sight.
    pub fn register_voice(&self, fingerprint: &Fingerprint) -> Result<VoiceProfile, EngineError> {
        self.mutate(|state| {
            let now = Utc::now();
            let profile = state
                .voice_profiles
                .entry(fingerprint.clone())
                .and_modify(|p| p.record_detection(now))
                .or_insert_with(|| VoiceProfile::first_detection(fingerprint, now));
            Ok(profile.clone())
        })
    }

    /// Fingerprint raw audio and register the voice.
    pub fn detect_voice(&self, audio: &[u8]) -> Result<(Fingerprint, VoiceProfile), EngineError> {
        let fingerprint = Fingerprint::from_audio(audio);
        let profile = self.register_voice(&fingerprint)?;
        Ok((fingerprint, profile))
    }

    /// Look up the user registered for `fingerprint`.
    ///
    /// A hit bumps the user's interaction count and applies the recognition
    /// reward; a miss changes nothing.
    pub fn recognize_user(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<UserProfile>, EngineError> {
        if !self.state.lock().user_profiles.contains_key(fingerprint) {
            return Ok(None);
        }

        self.mutate(|state| {
            let user = match state.user_profiles.get_mut(fingerprint) {
                Some(user) => {
                    user.interaction_count += 1;
                    user.clone()
                }
                None => return Ok(None),
            };
            apply_delta(state, RECOGNITION_REWARD, &format!("recognized:{}", user.id));
            Ok(Some(user))
        })
    }

    /// Register a new user for `fingerprint`.
    ///
    /// Fails with [`EngineError::DuplicateFingerprint`] if the voice already
    /// belongs to a user; the existing profile is left untouched.
    pub fn register_user(
        &self,
        fingerprint: &Fingerprint,
        name: &str,
    ) -> Result<UserProfile, EngineError> {
        self.mutate(|state| {
            if let Some(existing) = state.user_profiles.get(fingerprint) {
                return Err(EngineError::DuplicateFingerprint {
                    fingerprint: fingerprint.clone(),
                    existing: Box::new(existing.clone()),
                });
            }
            let user = UserProfile {
                id: user_id(state.user_profiles.len() + 1),
                name: name.to_string(),
                fingerprint: fingerprint.clone(),
                registered_at: Utc::now(),
                interaction_count: 1,
            };
            state.user_profiles.insert(fingerprint.clone(), user.clone());
            log::info!("Registered {} ({}) for voice {}", user.name, user.id, fingerprint.short());
            Ok(user)
        })
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn voice_count(&self) -> usize {
        self.state.lock().voice_profiles.len()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().user_profiles.len()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().clone()
    }
}

fn check_amount(amount: f64) -> Result<(), EngineError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(amount))
    }
}

fn apply_delta(state: &mut PersistedState, delta: f64, cause: &str) -> f64 {
    state.love_level = clamp_level(state.love_level + delta);
    state.affinity_history.push(AffinityChange {
        timestamp: Utc::now(),
        delta,
        level: state.love_level,
        cause: cause.to_string(),
    });
    if state.affinity_history.len() > HISTORY_LIMIT {
        let excess = state.affinity_history.len() - HISTORY_LIMIT;
        state.affinity_history.drain(..excess);
    }
    state.love_level
}
