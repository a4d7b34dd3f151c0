use crate::error::{Result, ZapperError};
use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct CookieUpdate {
    pub host: String,
    /// Omitting the value clears the cookie for the host.
    #[serde(default)]
    pub value: Option<String>,
}

/// Seed or clear the session cookie for a host.
///
/// The shell calls this after (re)authenticating against the portal; the
/// next source rebuild (launch or recovery restart) picks the value up.
pub async fn put_cookie(
    State(state): State<AppState>,
    Json(update): Json<CookieUpdate>,
) -> Result<Json<Value>> {
    let host = update.host.trim();
    if host.is_empty() {
        return Err(ZapperError::InvalidUrl("cookie host is required".into()));
    }

    match update.value {
        Some(value) => {
            debug!("Cookie seeded for {host}");
            state.cookies.set(host.to_string(), value);
        }
        None => {
            debug!("Cookie cleared for {host}");
            state.cookies.remove(host);
        }
    }

    Ok(Json(json!({ "status": "ok" })))
}
