use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZapperError>;

/// All errors surfaced by the launcher.
///
/// Stream-level failures (stalls, mid-play errors) are *not* represented
/// here; they are absorbed by the session's recovery gate and never
/// propagate as crate errors. Only launch-time and control-surface failures
/// reach the caller.
#[derive(Error, Debug)]
pub enum ZapperError {
    /// The launch request carried no URL (or only whitespace).
    #[error("url is required")]
    UrlRequired,

    /// The URL could not be parsed or uses a scheme no player understands.
    #[error("invalid stream url: {0}")]
    InvalidUrl(String),

    /// Built-in engine failed and every fallback candidate was unavailable.
    #[error("no player available")]
    NoPlayerAvailable,

    /// A control request (toggle/pause/resume) arrived with no live session.
    #[error("no active playback session")]
    NoActiveSession,

    /// The media engine rejected a command or could not be started.
    #[error("media engine error: {0}")]
    Engine(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ZapperError {
    fn into_response(self) -> Response {
        let status = match &self {
            ZapperError::UrlRequired | ZapperError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ZapperError::NoPlayerAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ZapperError::NoActiveSession => StatusCode::NOT_FOUND,
            ZapperError::Engine(_) | ZapperError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
