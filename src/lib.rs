//! # Luna
//!
//! Core of a voice-driven desktop assistant: affinity and emotion
//! bookkeeping, voice identity tracking, host device monitoring and two
//! network bridges (WebSocket and HTTP) for remote clients.
//!
//! The [`AffinityEngine`] owns the persisted state. Everything else reaches
//! it through the [`Assistant`], which background workers and bridges share
//! by `Arc`.

pub mod affinity;
pub mod assistant;
pub mod config;
pub mod events;
pub mod monitor;
pub mod server;
pub mod store;
pub mod supervisor;
pub mod voice;

pub use affinity::{AffinityEngine, AffinityStatus, EmotionLabel, EngineError, Fingerprint};
pub use assistant::{Assistant, CommandReply};
pub use config::AssistantConfig;
pub use events::{EventBus, SystemEvent, SystemEventKind};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError};
pub use supervisor::Supervisor;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
