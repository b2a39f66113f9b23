//! Axum route handlers for the HTTP bridge.
//!
//! # Routes
//!
//! - `GET  /health`      liveness probe
//! - `GET  /api/status`  activity, affinity and current emotion
//! - `POST /api/voice`   process a typed voice command
//! - `POST /api/speak`   speak arbitrary text
//! - `GET  /api/system`  host resource snapshot
//! - `POST /api/toggle`  flip the active flag
//! - `POST /api/users`   register a user for a voice fingerprint

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use crate::affinity::{EmotionLabel, EngineError, Fingerprint, UserProfile};
use crate::monitor::SystemInfo;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({"status": "error", "message": message.into()})),
    )
}

/// Build the HTTP bridge router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/voice", post(voice_handler))
        .route("/api/speak", post(speak_handler))
        .route("/api/system", get(system_handler))
        .route("/api/toggle", post(toggle_handler))
        .route("/api/users", post(register_user_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "luna",
    }))
}

/// GET /api/status
async fn status_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    // Engine reads wait for any save in progress.
    let assistant = state.assistant.clone();
    let status = tokio::task::spawn_blocking(move || assistant.status())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({
        "status": "online",
        "active": status.active,
        "love_level": status.love_level,
        "affinity_status": status.affinity_status,
        "emotion": status.emotion,
        "voices": status.voices,
        "users": status.users,
        "uptime_secs": status.uptime_secs,
        "timestamp": Utc::now().timestamp_millis() as f64 / 1000.0,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VoiceRequest {
    command: String,
}

/// POST /api/voice
///
/// Request: `{ "command": "..." }`. The command is classified and answered
/// exactly as if it had been spoken after the wake word.
async fn voice_handler(
    State(state): State<AppState>,
    Json(request): Json<VoiceRequest>,
) -> Result<Json<Value>, ApiError> {
    let command = request.command.trim().to_string();
    if command.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No command"));
    }

    // The engine writes the state file synchronously.
    let assistant = state.assistant.clone();
    let result = tokio::task::spawn_blocking(move || assistant.process_voice_command(&command))
        .await
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Command processing panicked: {}", e),
            )
        })?;

    match result {
        Ok(reply) => Ok(Json(json!({
            "status": "processed",
            "response": reply.response,
            "emotion": reply.emotion,
        }))),
        Err(e) => {
            log::error!("Voice command failed: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpeakRequest {
    text: String,
    emotion: Option<String>,
}

/// POST /api/speak
///
/// Request: `{ "text": "...", "emotion": "happy" }`. Unknown or missing
/// emotions are spoken as neutral.
async fn speak_handler(
    State(state): State<AppState>,
    Json(request): Json<SpeakRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({"status": "error"}))));
    }
    let emotion = request
        .emotion
        .as_deref()
        .and_then(|e| e.parse::<EmotionLabel>().ok())
        .unwrap_or_default();

    state.assistant.speak(&request.text, emotion);
    Ok(Json(json!({"status": "speaking"})))
}

/// GET /api/system
async fn system_handler(State(state): State<AppState>) -> Result<Json<SystemInfo>, ApiError> {
    let assistant = state.assistant.clone();
    let info = tokio::task::spawn_blocking(move || assistant.system_info())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(info))
}

/// POST /api/toggle
async fn toggle_handler(State(state): State<AppState>) -> Json<Value> {
    let active = state.assistant.toggle();
    Json(json!({"active": active}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterUserRequest {
    fingerprint: String,
    name: String,
}

/// POST /api/users
///
/// Request: `{ "fingerprint": "...", "name": "..." }`. Responds 201 with the
/// new profile, or 409 if the voice already belongs to a user.
async fn register_user_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let fingerprint = request.fingerprint.trim();
    let name = request.name.trim();
    if fingerprint.is_empty() || name.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Both 'fingerprint' and 'name' are required",
        ));
    }

    let fingerprint = Fingerprint::from(fingerprint);
    let name = name.to_string();
    let engine = state.assistant.engine().clone();
    let result = tokio::task::spawn_blocking(move || engine.register_user(&fingerprint, &name))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(e @ EngineError::DuplicateFingerprint { .. }) => {
            Err(api_error(StatusCode::CONFLICT, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
