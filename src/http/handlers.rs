use super::state::AppState;
use crate::dialogue::HttpDialogue;
use crate::playback::NullPlayer;
use crate::session::{CallConfig, CallSession, CallStatus, ManualInput, Turn};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// Driver the call belongs to
    pub driver_id: String,

    /// Optional session ID (if not provided, generate one)
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SayRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SayResponse {
    pub session_id: String,
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub session_id: String,
    pub status: String,
    pub stats: CallStatus,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /calls/start
/// Start a new call session against the configured dialogue backend
pub async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> impl IntoResponse {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("call-{}", uuid::Uuid::new_v4()));

    info!("Starting call {} for driver {}", session_id, req.driver_id);

    // Check if this session already exists
    {
        let calls = state.calls.read().await;
        if calls.contains_key(&session_id) {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Call {} already exists", session_id),
                }),
            )
                .into_response();
        }
    }

    let config = CallConfig {
        driver_id: req.driver_id.clone(),
        session_id: session_id.clone(),
        ..CallConfig::default()
    }
    .with_timings(&state.config.call);

    let dialogue = match HttpDialogue::new(
        state.config.backend.base_url.clone(),
        req.driver_id,
        session_id.clone(),
        Duration::from_secs(state.config.backend.request_timeout_secs),
    ) {
        Ok(dialogue) => dialogue,
        Err(e) => {
            error!("Failed to create dialogue client: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create dialogue client: {}", e),
                }),
            )
                .into_response();
        }
    };

    // Server-hosted calls are driven by /say and render no audio
    let handle = match CallSession::start(
        config,
        Arc::new(dialogue),
        Arc::new(NullPlayer),
        Box::new(ManualInput::new()),
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start call: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to start call: {}", e),
                }),
            )
                .into_response();
        }
    };

    {
        let mut calls = state.calls.write().await;
        calls.insert(session_id.clone(), handle);
    }

    (
        StatusCode::OK,
        Json(StartCallResponse {
            session_id,
            status: "active".to_string(),
            message: "Call started".to_string(),
        }),
    )
        .into_response()
}

/// POST /calls/:session_id/say
/// Inject a typed utterance into the call
pub async fn say(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SayRequest>,
) -> impl IntoResponse {
    let handle = {
        let calls = state.calls.read().await;
        calls.get(&session_id).cloned()
    };

    let Some(handle) = handle else {
        return not_found(&session_id);
    };

    let accepted = handle.say(req.text).await;

    let status = if accepted {
        StatusCode::OK
    } else {
        // The call was processing, speaking, or already over; the input
        // was dropped, not queued
        StatusCode::CONFLICT
    };

    (
        status,
        Json(SayResponse {
            session_id,
            accepted,
        }),
    )
        .into_response()
}

/// POST /calls/:session_id/end
/// End a call session
pub async fn end_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let handle = {
        let mut calls = state.calls.write().await;
        calls.remove(&session_id)
    };

    let Some(handle) = handle else {
        return not_found(&session_id);
    };

    handle.end().await;

    info!("Call {} ended", session_id);

    (
        StatusCode::OK,
        Json(EndCallResponse {
            session_id,
            status: "ended".to_string(),
            stats: handle.status(),
        }),
    )
        .into_response()
}

/// GET /calls/:session_id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let calls = state.calls.read().await;

    match calls.get(&session_id) {
        Some(handle) => (StatusCode::OK, Json(handle.status())).into_response(),
        None => not_found(&session_id),
    }
}

/// GET /calls/:session_id/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let calls = state.calls.read().await;

    match calls.get(&session_id) {
        Some(handle) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                session_id,
                turns: handle.transcript(),
            }),
        )
            .into_response(),
        None => not_found(&session_id),
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service.name,
    }))
}

fn not_found(session_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No call with session ID {}", session_id),
        }),
    )
        .into_response()
}
