//! Assistant configuration.
//!
//! Loaded from a JSON file (`config.json` by default). The file and every
//! key in it are optional: anything missing falls back to the defaults
//! below, and a file that cannot be parsed is ignored with a warning.
//!
//! Section names written by older versions of the assistant (`luna`,
//! `alexa`, `mobile`) are accepted as aliases.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    #[serde(alias = "luna")]
    pub assistant: AssistantSection,
    pub emotions: EmotionsSection,
    pub voice: VoiceSection,
    pub system: SystemSection,
    #[serde(alias = "alexa")]
    pub websocket: BridgeSection,
    #[serde(alias = "mobile")]
    pub http: BridgeSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    /// Whether the assistant starts in the active (listening) state.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionsSection {
    /// Affinity level given to a freshly initialised state document.
    pub base_love: f64,
}

impl Default for EmotionsSection {
    fn default() -> Self {
        Self { base_love: 50.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSection {
    pub voice_recognition: bool,
    pub record_unknown_voices: bool,
    pub wake_word: String,
    /// Upper bound for a single blocking listen call.
    pub listen_timeout_secs: u64,
}

impl Default for VoiceSection {
    fn default() -> Self {
        Self {
            voice_recognition: true,
            record_unknown_voices: true,
            wake_word: "luna".to_string(),
            listen_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    pub monitor_usb: bool,
    pub monitor_drivers: bool,
    pub usb_interval_secs: u64,
    pub driver_interval_secs: u64,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            monitor_usb: true,
            monitor_drivers: true,
            usb_interval_secs: 2,
            driver_interval_secs: 5,
        }
    }
}

/// Listener settings shared by the WebSocket and HTTP bridges.
///
/// The two sections only differ in their default port, so the parent
/// struct fills those in after deserialisation (see [`AssistantConfig::load`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0".to_string(),
            port: 0,
        }
    }
}

impl BridgeSection {
    /// `bind:port` string suitable for `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// True when the listener accepts connections from any host.
    pub fn is_public(&self) -> bool {
        self.bind == "0.0.0.0" || self.bind == "::"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("database.json"),
        }
    }
}

pub const DEFAULT_WEBSOCKET_PORT: u16 = 8765;
pub const DEFAULT_HTTP_PORT: u16 = 8888;

impl AssistantConfig {
    /// Load the configuration at `path`, substituting defaults for a
    /// missing file, missing keys, or an unreadable document.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<AssistantConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!(
                        "Ignoring unparseable config {}: {}; using defaults",
                        path.display(),
                        e
                    );
                    AssistantConfig::default()
                }
            },
            Err(e) => {
                log::debug!("No config at {} ({}); using defaults", path.display(), e);
                AssistantConfig::default()
            }
        };
        config.fill_default_ports();
        config
    }

    /// Configuration with every default applied, ports included.
    pub fn defaults() -> Self {
        let mut config = Self::default();
        config.fill_default_ports();
        config
    }

    fn fill_default_ports(&mut self) {
        if self.websocket.port == 0 {
            self.websocket.port = DEFAULT_WEBSOCKET_PORT;
        }
        if self.http.port == 0 {
            self.http.port = DEFAULT_HTTP_PORT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AssistantConfig::load("/nonexistent/luna/config.json");
        assert_eq!(config, AssistantConfig::defaults());
        assert_eq!(config.websocket.port, 8765);
        assert_eq!(config.http.port, 8888);
        assert_eq!(config.voice.wake_word, "luna");
        assert_eq!(config.emotions.base_love, 50.0);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"voice": {"wake_word": "aurora"}, "system": {"monitor_usb": false}}"#,
        )
        .unwrap();

        let config = AssistantConfig::load(&path);
        assert_eq!(config.voice.wake_word, "aurora");
        assert!(config.voice.voice_recognition);
        assert!(!config.system.monitor_usb);
        assert_eq!(config.system.driver_interval_secs, 5);
    }

    #[test]
    fn test_legacy_section_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"luna": {"active": true}, "alexa": {"enabled": false, "port": 9001}}"#,
        )
        .unwrap();

        let config = AssistantConfig::load(&path);
        assert!(config.assistant.active);
        assert!(!config.websocket.enabled);
        assert_eq!(config.websocket.port, 9001);
        assert_eq!(config.http.port, 8888);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AssistantConfig::load(&path), AssistantConfig::defaults());
    }

    #[test]
    fn test_bridge_address() {
        let config = AssistantConfig::defaults();
        assert_eq!(config.http.address(), "0.0.0.0:8888");
        assert!(config.http.is_public());
    }
}
