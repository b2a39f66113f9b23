//! WebSocket bridge.
//!
//! Each inbound text frame is a JSON object `{ "command": "..." }` and gets
//! exactly one `{ "status": "ok", "response": "..." }` frame back. Frames
//! that cannot be parsed, or commands that match no query, are answered
//! with [`NOT_UNDERSTOOD`]; the bridge never replies with an error frame.
//!
//! Between replies the server pushes [`Notification`](super::Notification)s
//! for system events.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use chrono::Local;
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

use super::AppState;
use crate::affinity::emotion::{contains_phrase, words};
use crate::assistant::Assistant;

pub const NOT_UNDERSTOOD: &str = "Command received, but I didn't quite understand";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Inbound {
    command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: String,
    pub response: String,
}

impl Reply {
    fn ok(response: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            response: response.into(),
        }
    }
}

/// Queries answered over the WebSocket, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Query {
    Status,
    Time,
    Date,
    Affinity,
    System,
}

impl Query {
    const ALL: [Query; 5] = [
        Query::Status,
        Query::Time,
        Query::Date,
        Query::Affinity,
        Query::System,
    ];

    fn phrases(&self) -> &'static [&'static str] {
        match self {
            Query::Status => &[
                "como você está",
                "como voce esta",
                "tudo bem",
                "how are you",
                "status",
            ],
            Query::Time => &["hora", "horas", "time"],
            Query::Date => &["data", "date"],
            Query::Affinity => &["amor", "gosta", "love", "affinity"],
            Query::System => &["sistema", "computador", "system"],
        }
    }

    fn detect(command: &str) -> Option<Query> {
        let haystack = words(command);
        Query::ALL
            .into_iter()
            .find(|q| q.phrases().iter().any(|p| contains_phrase(&haystack, p)))
    }

    fn answer(&self, assistant: &Assistant) -> String {
        match self {
            Query::Status => assistant.emotional_status(),
            Query::Time => format!("It's {}", Local::now().format("%H:%M")),
            Query::Date => format!("Today is {}", Local::now().format("%d/%m/%Y")),
            Query::Affinity => format!("I'm feeling {}", assistant.status().affinity_status),
            Query::System => match assistant.system_info().cpu_percent {
                Some(cpu) => format!("System running at {:.1}% CPU", cpu),
                None => "CPU usage is not available".to_string(),
            },
        }
    }
}

/// Answer one raw inbound frame.
pub fn answer_frame(assistant: &Assistant, frame: &str) -> Reply {
    let command = match serde_json::from_str::<Inbound>(frame) {
        Ok(inbound) => inbound.command,
        Err(e) => {
            log::debug!("Malformed WebSocket frame: {}", e);
            return Reply::ok(NOT_UNDERSTOOD);
        }
    };
    match Query::detect(&command) {
        Some(query) => Reply::ok(query.answer(assistant)),
        None => Reply::ok(NOT_UNDERSTOOD),
    }
}

/// Build the WebSocket bridge router. Clients connect to `/`.
pub fn websocket_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one frame. Returns `false` once the client is gone.
async fn send_json<S, T>(sender: &mut S, value: &T) -> bool
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(value) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            log::error!("Encoding frame: {}", e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut notifications = state.notifications.subscribe();
    log::info!("WebSocket client connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let assistant = state.assistant.clone();
                    let answered =
                        tokio::task::spawn_blocking(move || answer_frame(&assistant, &text)).await;
                    let reply = match answered {
                        Ok(reply) => reply,
                        Err(e) => {
                            log::error!("WebSocket query failed: {}", e);
                            Reply::ok(NOT_UNDERSTOOD)
                        }
                    };
                    if !send_json(&mut sender, &reply).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    log::debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
            pushed = notifications.recv() => match pushed {
                Ok(note) => {
                    if !send_json(&mut sender, &note).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagged, dropped {} notification(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    log::info!("WebSocket client disconnected");
}
