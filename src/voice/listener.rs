//! Speech input.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Why a listen attempt produced no text.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("No speech within the listen timeout")]
    Timeout,

    #[error("Speech could not be understood")]
    Unintelligible,

    #[error("Recognition service error: {0}")]
    Service(String),

    /// The input source has ended and will produce nothing more.
    #[error("Voice input closed")]
    Closed,
}

/// One recognised phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utterance {
    /// Lower-cased transcript.
    pub text: String,
    /// Raw audio, when the backend exposes it.
    pub audio: Option<Vec<u8>>,
}

impl Utterance {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into().to_lowercase(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }
}

/// A speech-to-text backend.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Wait at most `timeout` for the next phrase.
    async fn listen(&self, timeout: Duration) -> Result<Utterance, RecognitionError>;
}

/// Treats each line typed on standard input as a spoken phrase.
pub struct StdinListener {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for StdinListener {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinListener {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl Listener for StdinListener {
    async fn listen(&self, timeout: Duration) -> Result<Utterance, RecognitionError> {
        let mut lines = self.lines.lock().await;
        match tokio::time::timeout(timeout, lines.next_line()).await {
            Err(_) => Err(RecognitionError::Timeout),
            Ok(Err(e)) => Err(RecognitionError::Service(e.to_string())),
            Ok(Ok(None)) => Err(RecognitionError::Closed),
            Ok(Ok(Some(line))) => {
                let line = line.trim();
                if line.is_empty() {
                    Err(RecognitionError::Unintelligible)
                } else {
                    Ok(Utterance::text(line))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl Listener for Silent {
        async fn listen(&self, _timeout: Duration) -> Result<Utterance, RecognitionError> {
            Err(RecognitionError::Timeout)
        }
    }

    #[test]
    fn test_utterance_text_is_lowercased() {
        let utterance = Utterance::text("Luna, QUE HORAS SÃO?");
        assert_eq!(utterance.text, "luna, que horas são?");
        assert!(utterance.audio.is_none());
        assert_eq!(utterance.with_audio(vec![1, 2]).audio, Some(vec![1, 2]));
    }

    #[test]
    fn test_listener_as_trait_object() {
        let listener: Box<dyn Listener> = Box::new(Silent);
        let result = tokio_test::block_on(listener.listen(Duration::from_millis(1)));
        assert!(matches!(result, Err(RecognitionError::Timeout)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RecognitionError::Service("offline".into()).to_string(),
            "Recognition service error: offline"
        );
        assert_eq!(RecognitionError::Closed.to_string(), "Voice input closed");
    }
}
