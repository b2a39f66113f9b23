//! Voice input and output.
//!
//! Speech engines are external collaborators behind the [`Speaker`] and
//! [`Listener`] traits. [`run_listen_loop`] ties a listener to the
//! assistant.

pub mod listener;
pub mod speaker;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use listener::{Listener, RecognitionError, StdinListener, Utterance};
pub use speaker::{LogSpeaker, SpeechRate, Speaker};

use crate::assistant::Assistant;
use crate::config::VoiceSection;

/// Pause after a recognition service failure before listening again.
const SERVICE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Result of checking an utterance for the wake word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeWord {
    /// The wake word was present; the rest of the utterance, possibly empty.
    Command(String),
    /// The utterance was not addressed to the assistant.
    Absent,
}

/// Remove every occurrence of `wake_word` from `text`.
///
/// Matching is per whitespace-separated token, ignoring case and
/// surrounding punctuation, so "Luna, what time is it?" yields
/// "what time is it?".
pub fn strip_wake_word(text: &str, wake_word: &str) -> WakeWord {
    let wake_word = wake_word.trim().to_lowercase();
    if wake_word.is_empty() {
        return WakeWord::Command(text.trim().to_string());
    }

    let mut found = false;
    let rest: Vec<&str> = text
        .split_whitespace()
        .filter(|token| {
            let bare = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            let is_wake = bare == wake_word;
            found |= is_wake;
            !is_wake
        })
        .collect();

    if found {
        WakeWord::Command(rest.join(" "))
    } else {
        WakeWord::Absent
    }
}

/// Listen continuously while the assistant is active and forward commands
/// addressed to it.
///
/// Returns when `token` is cancelled, when the listener reports
/// [`RecognitionError::Closed`], or immediately if voice recognition is
/// disabled.
pub async fn run_listen_loop(
    listener: Arc<dyn Listener>,
    assistant: Arc<Assistant>,
    settings: VoiceSection,
    token: CancellationToken,
) {
    if !settings.voice_recognition {
        log::info!("Voice recognition disabled");
        return;
    }

    let timeout = Duration::from_secs(settings.listen_timeout_secs.max(1));
    let mut active = assistant.watch_active();
    log::info!("Listening for wake word '{}'", settings.wake_word);

    loop {
        let is_active = *active.borrow_and_update();
        if !is_active {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = active.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        let heard = tokio::select! {
            _ = token.cancelled() => break,
            heard = listener.listen(timeout) => heard,
        };

        let utterance = match heard {
            Ok(utterance) => utterance,
            Err(RecognitionError::Timeout) => continue,
            Err(RecognitionError::Unintelligible) => {
                log::debug!("Didn't understand");
                continue;
            }
            Err(RecognitionError::Closed) => {
                log::info!("Voice input closed, listen loop stopped");
                return;
            }
            Err(e) => {
                log::warn!("{}", e);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(SERVICE_RETRY_DELAY) => continue,
                }
            }
        };

        let assistant = Arc::clone(&assistant);
        let settings = settings.clone();
        let handled =
            tokio::task::spawn_blocking(move || handle_utterance(&assistant, &settings, utterance))
                .await;
        if let Err(e) = handled {
            log::error!("Voice command task failed: {}", e);
        }
    }
    log::info!("Listen loop stopped");
}

fn handle_utterance(assistant: &Assistant, settings: &VoiceSection, utterance: Utterance) {
    if let Some(audio) = &utterance.audio {
        if let Err(e) = assistant.identify_speaker(audio) {
            log::warn!("Voice identification failed: {}", e);
        }
    }

    match strip_wake_word(&utterance.text, &settings.wake_word) {
        WakeWord::Command(command) if command.is_empty() => {}
        WakeWord::Command(command) => {
            if let Err(e) = assistant.process_voice_command(&command) {
                log::error!("Failed to process '{}': {}", command, e);
            }
        }
        WakeWord::Absent => {
            if settings.record_unknown_voices {
                log::info!("Unaddressed speech: {}", utterance.text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::tests::assistant_with;
    use crate::monitor::SystemInfo;
    use crate::voice::speaker::RecordingSpeaker;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedListener(Mutex<VecDeque<Result<Utterance, RecognitionError>>>);

    #[async_trait]
    impl Listener for ScriptedListener {
        async fn listen(&self, timeout: Duration) -> Result<Utterance, RecognitionError> {
            let next = self.0.lock().pop_front();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(timeout).await;
                    Err(RecognitionError::Timeout)
                }
            }
        }
    }

    #[test]
    fn test_strip_wake_word() {
        assert_eq!(
            strip_wake_word("Luna, what time is it?", "luna"),
            WakeWord::Command("what time is it?".to_string())
        );
        assert_eq!(strip_wake_word("luna", "luna"), WakeWord::Command(String::new()));
        assert_eq!(strip_wake_word("lunar eclipse tonight", "luna"), WakeWord::Absent);
        assert_eq!(
            strip_wake_word("hello there", ""),
            WakeWord::Command("hello there".to_string())
        );
    }

    #[tokio::test]
    async fn test_listen_loop_forwards_addressed_commands_only() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let assistant = assistant_with(Arc::clone(&speaker), SystemInfo::default());
        assistant.set_active(true);

        let listener = Arc::new(ScriptedListener(Mutex::new(VecDeque::from(vec![
            Ok(Utterance::text("what time is it")),
            Err(RecognitionError::Unintelligible),
            Ok(Utterance::text("luna I love you").with_audio(b"pcm".to_vec())),
        ]))));

        let token = CancellationToken::new();
        let task = tokio::spawn(run_listen_loop(
            listener,
            Arc::clone(&assistant),
            VoiceSection::default(),
            token.clone(),
        ));

        for _ in 0..200 {
            if !speaker.spoken.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        task.await.unwrap();

        let spoken = speaker.spoken.lock();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].1, crate::affinity::EmotionLabel::Love);
        assert_eq!(assistant.engine().voice_count(), 1);
    }

    #[tokio::test]
    async fn test_listen_loop_idles_while_inactive() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let assistant = assistant_with(Arc::clone(&speaker), SystemInfo::default());

        let listener = Arc::new(ScriptedListener(Mutex::new(VecDeque::from(vec![Ok(
            Utterance::text("luna hello"),
        )]))));
        let token = CancellationToken::new();
        let task = tokio::spawn(run_listen_loop(
            Arc::clone(&listener) as Arc<dyn Listener>,
            Arc::clone(&assistant),
            VoiceSection::default(),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(speaker.spoken.lock().is_empty());
        assert_eq!(listener.0.lock().len(), 1);

        assistant.toggle();
        for _ in 0..200 {
            if !speaker.spoken.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        task.await.unwrap();
        assert_eq!(speaker.spoken.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_listen_loop_ends_when_input_closes() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let assistant = assistant_with(Arc::clone(&speaker), SystemInfo::default());
        assistant.set_active(true);

        let listener = Arc::new(ScriptedListener(Mutex::new(VecDeque::from(vec![
            Ok(Utterance::text("luna hello")),
            Err(RecognitionError::Closed),
            Ok(Utterance::text("luna are you still there")),
        ]))));
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            run_listen_loop(
                Arc::clone(&listener) as Arc<dyn Listener>,
                assistant,
                VoiceSection::default(),
                CancellationToken::new(),
            ),
        )
        .await;

        assert!(finished.is_ok());
        assert_eq!(speaker.spoken.lock().len(), 1);
        assert_eq!(listener.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_recognition_returns_immediately() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let assistant = assistant_with(speaker, SystemInfo::default());
        let settings = VoiceSection {
            voice_recognition: false,
            ..VoiceSection::default()
        };
        let listener = Arc::new(ScriptedListener(Mutex::new(VecDeque::new())));
        run_listen_loop(listener, assistant, settings, CancellationToken::new()).await;
    }
}
