//! The assistant: engine, voice output, host probe and the on/off switch.
//!
//! Everything a bridge or the listen loop can ask of the assistant goes
//! through [`Assistant`]. State mutations are delegated to the
//! [`AffinityEngine`]; the assistant itself only holds the active flag and
//! the emotion of the last command.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::watch;

use crate::affinity::emotion::{contains_phrase, words};
use crate::affinity::{
    AffinityEngine, AffinityStatus, EmotionLabel, EngineError, Fingerprint, UserProfile,
};
use crate::events::{EventBus, HandlerId, SystemEvent, SystemEventKind};
use crate::monitor::{HostProbe, SystemInfo};
use crate::voice::Speaker;

pub const FALLBACK_REPLY: &str = "Sorry, I didn't understand. Could you repeat?";

/// Reply to a processed voice command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReply {
    pub response: String,
    pub emotion: EmotionLabel,
}

/// Point-in-time view of the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantStatus {
    pub active: bool,
    pub love_level: f64,
    pub affinity_status: AffinityStatus,
    pub emotion: EmotionLabel,
    /// Known voice fingerprints.
    pub voices: usize,
    /// Registered users.
    pub users: usize,
    pub uptime_secs: u64,
}

/// Topics the assistant has canned replies for, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Greeting,
    HowAreYou,
    Love,
    Time,
    Date,
}

impl Topic {
    const ALL: [Topic; 5] = [
        Topic::Greeting,
        Topic::HowAreYou,
        Topic::Love,
        Topic::Time,
        Topic::Date,
    ];

    fn phrases(&self) -> &'static [&'static str] {
        match self {
            Topic::Greeting => &["hello", "hi", "olá", "ola", "oi"],
            Topic::HowAreYou => &["how are you", "como você está", "como voce esta", "tudo bem"],
            Topic::Love => &["love you", "te amo"],
            Topic::Time => &["time", "hora", "horas"],
            Topic::Date => &["date", "data"],
        }
    }

    fn detect(haystack: &[String]) -> Option<Topic> {
        Topic::ALL
            .into_iter()
            .find(|t| t.phrases().iter().any(|p| contains_phrase(haystack, p)))
    }

    fn replies(&self) -> Vec<String> {
        let now = Local::now();
        match self {
            Topic::Greeting => vec![
                "Hello! How are you?".into(),
                "Hi! All good?".into(),
                "Hello, I'm here!".into(),
            ],
            Topic::HowAreYou => vec![
                "I'm fine, thank you!".into(),
                "I feel great today!".into(),
                "I'm happy to see you!".into(),
            ],
            Topic::Love => vec![
                "I love you too!".into(),
                "That makes me so happy!".into(),
                "My heart feels warm!".into(),
            ],
            Topic::Time => vec![
                format!("It's {}", now.format("%H:%M")),
                format!("The clock says {}", now.format("%H:%M:%S")),
            ],
            Topic::Date => vec![
                format!("Today is {}", now.format("%d/%m/%Y")),
                format!("It's {}", now.format("%B %-d, %Y")),
            ],
        }
    }
}

/// Canned reply for `text`, or [`FALLBACK_REPLY`].
pub fn reply_for(text: &str) -> String {
    Topic::detect(&words(text))
        .and_then(|topic| topic.replies().choose(&mut rand::thread_rng()).cloned())
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}

pub struct Assistant {
    engine: Arc<AffinityEngine>,
    speaker: Arc<dyn Speaker>,
    host: Arc<dyn HostProbe>,
    active: watch::Sender<bool>,
    emotion: RwLock<EmotionLabel>,
    started: Instant,
}

impl Assistant {
    pub fn new(
        engine: Arc<AffinityEngine>,
        speaker: Arc<dyn Speaker>,
        host: Arc<dyn HostProbe>,
        active: bool,
    ) -> Self {
        let (active, _) = watch::channel(active);
        Self {
            engine,
            speaker,
            host,
            active,
            emotion: RwLock::new(EmotionLabel::Neutral),
            started: Instant::now(),
        }
    }

    pub fn engine(&self) -> &Arc<AffinityEngine> {
        &self.engine
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Classify `text`, remember its emotion, reply and speak the reply.
    pub fn process_voice_command(&self, text: &str) -> Result<CommandReply, EngineError> {
        log::info!("Voice command: {}", text);
        let emotion = self.engine.classify_emotion(text)?;
        *self.emotion.write() = emotion;

        let response = reply_for(text);
        self.speaker.speak(&response, emotion);
        log::info!("Replied: {}", response);
        Ok(CommandReply { response, emotion })
    }

    pub fn speak(&self, text: &str, emotion: EmotionLabel) {
        self.speaker.speak(text, emotion);
    }

    /// Fingerprint `audio`, record the voice and look up its user.
    pub fn identify_speaker(
        &self,
        audio: &[u8],
    ) -> Result<(Fingerprint, Option<UserProfile>), EngineError> {
        let (fingerprint, profile) = self.engine.detect_voice(audio)?;
        let user = self.engine.recognize_user(&fingerprint)?;
        match &user {
            Some(user) => log::info!("Recognized {} ({})", user.name, user.id),
            None => log::debug!(
                "Unknown voice {} (seen {} times)",
                fingerprint.short(),
                profile.detection_count
            ),
        }
        Ok((fingerprint, user))
    }

    // -----------------------------------------------------------------------
    // System events
    // -----------------------------------------------------------------------

    /// Log the event and, while active, announce it.
    pub fn handle_system_event(&self, event: &SystemEvent) -> anyhow::Result<()> {
        log::info!("System event: {}", event.summary());
        if self.is_active() {
            self.speaker
                .speak(&format!("System event: {}", subject(event)), EmotionLabel::Neutral);
        }
        Ok(())
    }

    /// Route system events from `bus` to [`Assistant::handle_system_event`].
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> HandlerId {
        let assistant = Arc::clone(self);
        bus.subscribe("assistant", move |event| assistant.handle_system_event(event))
    }

    // -----------------------------------------------------------------------
    // Activity
    // -----------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Flip the active flag and return the new value.
    pub fn toggle(&self) -> bool {
        let mut now = false;
        self.active.send_modify(|active| {
            *active = !*active;
            now = *active;
        });
        log::info!("Assistant {}", if now { "activated" } else { "deactivated" });
        now
    }

    pub fn set_active(&self, active: bool) {
        self.active.send_replace(active);
    }

    /// Receiver that observes every change of the active flag.
    pub fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn current_emotion(&self) -> EmotionLabel {
        *self.emotion.read()
    }

    /// Snapshot for the bridges. Reads the engine, so it may wait on an
    /// in-flight save.
    pub fn status(&self) -> AssistantStatus {
        let love_level = self.engine.affinity_level();
        AssistantStatus {
            active: self.is_active(),
            love_level,
            affinity_status: AffinityStatus::from_level(love_level),
            emotion: self.current_emotion(),
            voices: self.engine.voice_count(),
            users: self.engine.user_count(),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    /// One sentence describing mood and affinity.
    pub fn emotional_status(&self) -> String {
        let level = self.engine.affinity_level();
        format!(
            "I'm feeling {}, and my affinity is {} ({:.0}/100)",
            self.current_emotion(),
            AffinityStatus::from_level(level),
            level
        )
    }

    pub fn system_info(&self) -> SystemInfo {
        self.host.system_info()
    }
}

/// What an announcement names: the device description or driver name.
fn subject(event: &SystemEvent) -> &str {
    let key = match event.kind {
        SystemEventKind::DeviceConnected | SystemEventKind::DeviceRemoved => "description",
        SystemEventKind::DriverChanged => "name",
    };
    event.get(key).unwrap_or_else(|| event.kind.as_str())
}
