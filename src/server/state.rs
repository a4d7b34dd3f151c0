use crate::config::Config;
use crate::cookies::{CookieStore, MemoryCookieStore};
use crate::engine::mpv::MpvEngineFactory;
use crate::fallback::FallbackChain;
use crate::launcher::Launcher;
use crate::session::SessionHandle;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Launch orchestration (engine factory + fallback chain)
    pub launcher: Arc<Launcher>,
    /// Cookie store seeded by the shell, consulted at source construction
    pub cookies: Arc<dyn CookieStore>,
    /// The single active built-in session, if any
    pub active: Arc<Mutex<Option<SessionHandle>>>,
    /// Server start time, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Production wiring: mpv engine factory and the stock player chain.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let cookies: Arc<dyn CookieStore> = Arc::new(MemoryCookieStore::new());
        let engines = Arc::new(MpvEngineFactory::new(config.clone()));
        let fallback = FallbackChain::default_chain(&config.mpv_bin);
        let launcher = Arc::new(Launcher::new(
            config.clone(),
            engines,
            cookies.clone(),
            fallback,
        ));

        Self {
            config,
            launcher,
            cookies,
            active: Arc::new(Mutex::new(None)),
            started_at: Instant::now(),
        }
    }

    /// Custom wiring for tests and embedders that bring their own engine.
    pub fn with_launcher(
        config: Config,
        launcher: Launcher,
        cookies: Arc<dyn CookieStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            launcher: Arc::new(launcher),
            cookies,
            active: Arc::new(Mutex::new(None)),
            started_at: Instant::now(),
        }
    }
}
