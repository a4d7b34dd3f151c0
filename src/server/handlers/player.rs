use crate::error::{Result, ZapperError};
use crate::launcher::{LaunchRequest, Launched};
use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

/// The bridge method: launch playback for a stream URL.
///
/// Responds 400 when the URL is missing, 503 when neither the built-in
/// engine nor any external player could take the stream.
pub async fn launch(
    State(state): State<AppState>,
    Json(request): Json<LaunchRequest>,
) -> Result<Json<Value>> {
    let launched = state.launcher.launch(&request).await?;
    let player = launched.player_name();

    // Replacing the slot disposes the previous session: the handle cancels
    // its controller on drop.
    let mut active = state.active.lock().await;
    *active = match launched {
        Launched::BuiltIn(handle) => Some(handle),
        Launched::External(_) => None,
    };

    Ok(Json(json!({ "status": "playing", "player": player })))
}

/// Select/confirm key: flip play/pause on the active session.
pub async fn toggle_play_pause(State(state): State<AppState>) -> Result<Json<Value>> {
    let active = state.active.lock().await;
    let handle = active.as_ref().ok_or(ZapperError::NoActiveSession)?;
    handle.toggle_play_pause().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Host went to the background.
pub async fn pause(State(state): State<AppState>) -> Result<Json<Value>> {
    let active = state.active.lock().await;
    let handle = active.as_ref().ok_or(ZapperError::NoActiveSession)?;
    handle.pause().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Host came back to the foreground.
pub async fn resume(State(state): State<AppState>) -> Result<Json<Value>> {
    let active = state.active.lock().await;
    let handle = active.as_ref().ok_or(ZapperError::NoActiveSession)?;
    handle.resume().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Back/cancel: dispose the active session. Idempotent.
pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    let mut active = state.active.lock().await;
    match active.take() {
        Some(handle) => {
            handle.dispose();
            info!("Session dismissed");
            Json(json!({ "status": "stopped" }))
        }
        None => Json(json!({ "status": "idle" })),
    }
}
