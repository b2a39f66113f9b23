//! Luna assistant process.
//!
//! Loads the configuration, opens the state document, starts the device
//! monitors, the listen loop and both network bridges, then runs until
//! Ctrl-C.
//!
//! # Environment Variables
//!
//! - `LUNA_CONFIG`: configuration file (default: `config.json`)
//! - `RUST_LOG`: tracing filter (default: `info,luna=debug`)
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin luna-server
//! ```
//!
//! Lines typed on standard input are treated as speech.

use std::sync::Arc;

use anyhow::Context;

use luna::config::{AssistantConfig, DEFAULT_CONFIG_PATH};
use luna::monitor::{ProcfsProbe, StaticDriverSource, SysfsUsbSource, SystemMonitor};
use luna::server::{start_bridges, AppState};
use luna::voice::{run_listen_loop, LogSpeaker, StdinListener};
use luna::{AffinityEngine, Assistant, EventBus, JsonFileStore, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,luna=debug".into()),
        )
        .init();

    let config_path =
        std::env::var("LUNA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AssistantConfig::load(&config_path);
    tracing::info!("Luna {} starting (config: {})", luna::VERSION, config_path);

    let store = Arc::new(JsonFileStore::new(&config.storage.database_path));
    let engine = AffinityEngine::open(store, config.emotions.base_love)
        .with_context(|| format!("opening {}", config.storage.database_path.display()))?;
    tracing::info!(
        "Affinity {:.1} ({}), {} voice(s), {} user(s)",
        engine.affinity_level(),
        engine.affinity_status(),
        engine.voice_count(),
        engine.user_count()
    );

    let assistant = Arc::new(Assistant::new(
        Arc::new(engine),
        Arc::new(LogSpeaker),
        Arc::new(ProcfsProbe::default()),
        config.assistant.active,
    ));

    let bus = Arc::new(EventBus::new());
    assistant.attach(&bus);

    let mut supervisor = Supervisor::new();
    let state = AppState::new(Arc::clone(&assistant), supervisor.token());
    state.forward_events(&bus);

    SystemMonitor::new(
        Arc::clone(&bus),
        Arc::new(SysfsUsbSource::default()),
        Arc::new(StaticDriverSource::default()),
        &config.system,
    )
    .spawn(&mut supervisor);

    let listener = Arc::new(StdinListener::new());
    let voice = config.voice.clone();
    let listen_assistant = Arc::clone(&assistant);
    supervisor.spawn("listen-loop", move |token| {
        run_listen_loop(listener, listen_assistant, voice, token)
    });

    if let Err(e) = start_bridges(&config, &state, &mut supervisor).await {
        tracing::error!("Failed to start bridges: {:#}", e);
        supervisor.shutdown().await;
        return Err(e);
    }

    tracing::info!(
        "Ready ({}); press Ctrl-C to stop",
        if assistant.is_active() { "active" } else { "inactive" }
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }

    supervisor.shutdown().await;
    tracing::info!("Bye");
    Ok(())
}
