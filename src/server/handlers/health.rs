use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// Liveness plus current playback state, for the shell's status polling.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let session = match state.active.lock().await.as_ref() {
        Some(handle) => handle.state().as_str(),
        None => "idle",
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "session": session,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
