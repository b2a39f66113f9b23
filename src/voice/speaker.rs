//! Speech output.

use crate::affinity::EmotionLabel;

/// Words per minute for an utterance spoken with a given emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechRate(pub u32);

impl SpeechRate {
    pub const DEFAULT: SpeechRate = SpeechRate(180);

    pub fn for_emotion(emotion: EmotionLabel) -> Self {
        match emotion {
            EmotionLabel::Excited => SpeechRate(220),
            EmotionLabel::Happy => SpeechRate(200),
            EmotionLabel::Sad => SpeechRate(150),
            EmotionLabel::Love => SpeechRate(170),
            EmotionLabel::Neutral | EmotionLabel::Angry => Self::DEFAULT,
        }
    }
}

/// A text-to-speech backend.
///
/// `speak` must return promptly; a backend that blocks while audio plays
/// should hand the work to its own thread.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str, emotion: EmotionLabel);
}

/// Writes utterances to the log instead of a sound device.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str, emotion: EmotionLabel) {
        let rate = SpeechRate::for_emotion(emotion);
        log::info!("[speak {} @{}wpm] {}", emotion, rate.0, text);
    }
}

/// Remembers everything it was asked to say.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSpeaker {
    pub spoken: parking_lot::Mutex<Vec<(String, EmotionLabel)>>,
}

#[cfg(test)]
impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str, emotion: EmotionLabel) {
        self.spoken.lock().push((text.to_string(), emotion));
    }
}
