pub mod handlers;
pub mod state;

use crate::config::Config;
use crate::metrics;
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Build the bridge router with production wiring.
pub fn build_router(config: Config) -> Router {
    build_router_with_state(AppState::new(config))
}

/// Build the bridge router over a prepared state (tests inject mocks here).
pub fn build_router_with_state(state: AppState) -> Router {
    let prometheus = metrics::prometheus_handle();

    // The hybrid shell is served from a WebView origin; without CORS the
    // bridge is unreachable from it.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/player/launch", post(handlers::player::launch))
        .route("/player/toggle", post(handlers::player::toggle_play_pause))
        .route("/player/pause", post(handlers::player::pause))
        .route("/player/resume", post(handlers::player::resume))
        .route("/player", delete(handlers::player::stop))
        .route("/cookies", put(handlers::cookies::put_cookie))
        .route(
            "/metrics",
            get(move || async move { prometheus.render() }),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let app = build_router(config);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Bridge listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
