//! Keyword-based emotion classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of emotions the assistant can detect and express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Love,
    Angry,
    Excited,
    #[default]
    Neutral,
}

impl EmotionLabel {
    /// Detectable emotions, highest priority first. When several categories
    /// match one utterance, the earliest entry here wins.
    pub const PRIORITY: [EmotionLabel; 5] = [
        EmotionLabel::Love,
        EmotionLabel::Excited,
        EmotionLabel::Happy,
        EmotionLabel::Angry,
        EmotionLabel::Sad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Love => "love",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Excited => "excited",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Signed affinity change applied when this emotion is detected.
    pub fn affinity_delta(&self) -> Option<f64> {
        match self {
            EmotionLabel::Love => Some(2.0),
            EmotionLabel::Excited => Some(1.0),
            EmotionLabel::Happy => Some(0.5),
            EmotionLabel::Angry => Some(-1.0),
            EmotionLabel::Sad => Some(-0.5),
            EmotionLabel::Neutral => None,
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            EmotionLabel::Love => &[
                "amor", "amo", "apaixonado", "apaixonada", "carinho", "querido", "querida",
                "amada", "amado", "love",
            ],
            EmotionLabel::Excited => &[
                "empolgad", "incrivel", "incrível", "maravilhos", "uau", "wow", "amazing",
            ],
            EmotionLabel::Happy => &[
                "feliz", "felic", "alegr", "contente", "animad", "adoro", "happy", "glad",
            ],
            EmotionLabel::Angry => &[
                "raiva", "raivos", "bravo", "brava", "irritad", "odio", "ódio", "puto", "puta",
                "angry",
            ],
            EmotionLabel::Sad => &[
                "triste", "chateado", "chateada", "deprimido", "deprimida", "mal", "pessimo",
                "péssimo", "sad",
            ],
            EmotionLabel::Neutral => &[],
        }
    }

    /// Keywords are stems: a word matches when it starts with one, so
    /// "tristeza" and "amorzinho" count while "normal" does not.
    fn matches(&self, words: &[String]) -> bool {
        let keywords = self.keywords();
        words.iter().any(|w| keywords.iter().any(|k| w.starts_with(k)))
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(EmotionLabel::Happy),
            "sad" => Ok(EmotionLabel::Sad),
            "love" => Ok(EmotionLabel::Love),
            "angry" => Ok(EmotionLabel::Angry),
            "excited" => Ok(EmotionLabel::Excited),
            "neutral" => Ok(EmotionLabel::Neutral),
            other => Err(format!("unknown emotion '{}'", other)),
        }
    }
}

/// Lower-case `text` and split it into alphanumeric words.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if the words of `phrase` appear consecutively in `haystack`.
pub(crate) fn contains_phrase(haystack: &[String], phrase: &str) -> bool {
    let phrase = words(phrase);
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|w| w == phrase.as_slice())
}

/// Detect the dominant emotion in `text` without touching any state.
pub fn detect_emotion(text: &str) -> EmotionLabel {
    let words = words(text);
    EmotionLabel::PRIORITY
        .into_iter()
        .find(|emotion| emotion.matches(&words))
        .unwrap_or(EmotionLabel::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_love_beats_angry() {
        assert_eq!(detect_emotion("eu te amo e estou com raiva"), EmotionLabel::Love);
    }

    #[test]
    fn test_priority_is_independent_of_word_order() {
        assert_eq!(detect_emotion("triste mas feliz"), EmotionLabel::Happy);
        assert_eq!(detect_emotion("uau, que raiva, amor"), EmotionLabel::Love);
        assert_eq!(detect_emotion("raiva e triste"), EmotionLabel::Angry);
    }

    #[test]
    fn test_single_categories() {
        assert_eq!(detect_emotion("hoje estou triste"), EmotionLabel::Sad);
        assert_eq!(detect_emotion("Que dia INCRÍVEL"), EmotionLabel::Excited);
        assert_eq!(detect_emotion("estou feliz!"), EmotionLabel::Happy);
    }

    #[test]
    fn test_neutral_when_nothing_matches() {
        assert_eq!(detect_emotion("oi"), EmotionLabel::Neutral);
        assert_eq!(detect_emotion(""), EmotionLabel::Neutral);
    }

    #[test]
    fn test_keywords_match_word_starts_only() {
        // "mal" is a sad keyword but must not fire inside "normal" or "animal".
        assert_eq!(detect_emotion("um dia normal com meu animal"), EmotionLabel::Neutral);
    }

    #[test]
    fn test_inflected_forms() {
        assert_eq!(detect_emotion("que tristeza"), EmotionLabel::Sad);
        assert_eq!(detect_emotion("estamos apaixonados"), EmotionLabel::Love);
        assert_eq!(detect_emotion("meu amorzinho"), EmotionLabel::Love);
        assert_eq!(detect_emotion("estou felicíssima"), EmotionLabel::Happy);
        assert_eq!(detect_emotion("que raivoso"), EmotionLabel::Angry);
        assert_eq!(detect_emotion("ficamos empolgadíssimos"), EmotionLabel::Excited);
        assert_eq!(detect_emotion("ela está irritadinha"), EmotionLabel::Angry);
    }

    #[test]
    fn test_deltas() {
        assert_eq!(EmotionLabel::Love.affinity_delta(), Some(2.0));
        assert_eq!(EmotionLabel::Sad.affinity_delta(), Some(-0.5));
        assert_eq!(EmotionLabel::Neutral.affinity_delta(), None);
    }

    #[test]
    fn test_parse_label() {
        assert_eq!("Excited".parse::<EmotionLabel>(), Ok(EmotionLabel::Excited));
        assert!("bored".parse::<EmotionLabel>().is_err());
    }
}
