//! Network bridges.
//!
//! Two listeners expose the assistant to other devices on the network:
//!
//! - a WebSocket bridge (default port 8765) answering `{ "command": ... }`
//!   queries and pushing system notifications to every connected client;
//! - an HTTP API (default port 8888) under `/api`.
//!
//! Neither bridge authenticates its clients.

pub mod routes;
pub mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub use routes::app_router;
pub use websocket::websocket_router;

use crate::assistant::Assistant;
use crate::config::{AssistantConfig, BridgeSection};
use crate::events::{EventBus, HandlerId};
use crate::supervisor::Supervisor;

/// Notifications buffered per WebSocket client before it starts lagging.
pub const NOTIFICATION_CAPACITY: usize = 64;

/// Message pushed to WebSocket clients outside of a request/reply exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub from: String,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            from: "luna".to_string(),
            message: message.into(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Shared state for both bridges.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub notifications: broadcast::Sender<Notification>,
    /// Cancelled when the process shuts down; open sockets close on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, shutdown: CancellationToken) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            assistant,
            notifications,
            shutdown,
        }
    }

    /// Push `message` to every connected WebSocket client.
    ///
    /// Returns the number of clients it was queued for.
    pub fn notify(&self, message: impl Into<String>) -> usize {
        self.notifications.send(Notification::new(message)).unwrap_or(0)
    }

    /// Relay every system event published on `bus` to WebSocket clients.
    pub fn forward_events(&self, bus: &EventBus) -> HandlerId {
        let state = self.clone();
        bus.subscribe("websocket", move |event| {
            state.notify(event.summary());
            Ok(())
        })
    }
}

async fn bind(section: &BridgeSection, label: &str) -> anyhow::Result<TcpListener> {
    let address = section.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {} bridge to {}", label, address))?;
    if section.is_public() {
        log::warn!(
            "{} bridge listens on all interfaces ({}) without authentication",
            label,
            address
        );
    }
    Ok(listener)
}

fn spawn_server(supervisor: &mut Supervisor, name: &str, listener: TcpListener, router: Router) {
    supervisor.spawn(name, move |token| async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            log::error!("Server error: {}", e);
        }
    });
}

/// Bind and start every enabled bridge. Returns the bound addresses.
pub async fn start_bridges(
    config: &AssistantConfig,
    state: &AppState,
    supervisor: &mut Supervisor,
) -> anyhow::Result<Vec<SocketAddr>> {
    let mut bound = Vec::new();

    if config.websocket.enabled {
        let listener = bind(&config.websocket, "WebSocket").await?;
        let addr = listener.local_addr()?;
        log::info!("WebSocket bridge on ws://{}/", addr);
        spawn_server(supervisor, "websocket-bridge", listener, websocket_router(state.clone()));
        bound.push(addr);
    }

    if config.http.enabled {
        let listener = bind(&config.http, "HTTP").await?;
        let addr = listener.local_addr()?;
        log::info!("HTTP bridge on http://{}/api", addr);
        spawn_server(supervisor, "http-bridge", listener, app_router(state.clone()));
        bound.push(addr);
    }

    Ok(bound)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assistant::tests::assistant_with;
    use crate::events::SystemEvent;
    use crate::monitor::SystemInfo;
    use crate::voice::speaker::RecordingSpeaker;

    pub(crate) fn test_state() -> (AppState, Arc<RecordingSpeaker>) {
        let speaker = Arc::new(RecordingSpeaker::default());
        let host = SystemInfo {
            cpu_percent: Some(12.5),
            memory_percent: Some(40.0),
            ..SystemInfo::default()
        };
        let assistant = assistant_with(Arc::clone(&speaker), host);
        (AppState::new(assistant, CancellationToken::new()), speaker)
    }

    #[tokio::test]
    async fn test_forward_events_reaches_subscribers() {
        let (state, _) = test_state();
        let mut rx = state.notifications.subscribe();
        let bus = EventBus::new();
        state.forward_events(&bus);

        bus.publish(&SystemEvent::device_connected("1-1", "Keyboard"));
        let note = rx.recv().await.unwrap();
        assert_eq!(note.from, "luna");
        assert_eq!(note.message, "USB connected: Keyboard");
        assert!(note.timestamp > 0.0);
    }

    #[test]
    fn test_notify_without_clients_is_not_an_error() {
        let (state, _) = test_state();
        assert_eq!(state.notify("nobody listening"), 0);
    }

    #[tokio::test]
    async fn test_start_bridges_on_ephemeral_ports() {
        let (state, _) = test_state();
        let mut config = AssistantConfig::defaults();
        config.websocket.bind = "127.0.0.1".to_string();
        config.websocket.port = 0;
        config.http.bind = "127.0.0.1".to_string();
        config.http.port = 0;

        let mut supervisor = Supervisor::new();
        let bound = start_bridges(&config, &state, &mut supervisor).await.unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(supervisor.worker_names(), vec!["websocket-bridge", "http-bridge"]);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_bridges_bind_nothing() {
        let (state, _) = test_state();
        let mut config = AssistantConfig::defaults();
        config.websocket.enabled = false;
        config.http.enabled = false;

        let mut supervisor = Supervisor::new();
        let bound = start_bridges(&config, &state, &mut supervisor).await.unwrap();
        assert!(bound.is_empty());
    }
}
