use std::env;

/// Live-edge tuning handed to the media engine with every source.
///
/// Mirrors the player's live configuration: stay a comfortable distance
/// behind the live edge and catch up / fall back gently instead of jumping.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveTuning {
    /// Preferred distance from the live edge, in milliseconds.
    pub target_offset_ms: u64,
    /// Closest the engine should ride to the live edge.
    pub min_offset_ms: u64,
    /// Furthest drift behind the edge before the engine catches up.
    pub max_offset_ms: u64,
    /// Slow-down bound while ahead of the target offset.
    pub min_playback_speed: f32,
    /// Catch-up bound while behind the target offset.
    pub max_playback_speed: f32,
}

impl Default for LiveTuning {
    fn default() -> Self {
        Self {
            target_offset_ms: 15_000,
            min_offset_ms: 10_000,
            max_offset_ms: 60_000,
            min_playback_speed: 0.98,
            max_playback_speed: 1.02,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Binary used for the built-in engine (default: "mpv" on PATH)
    pub mpv_bin: String,
    /// User agent attached when the caller does not supply one
    pub default_user_agent: String,
    /// Connect/read timeout for the engine's HTTP transport, in seconds
    pub network_timeout_secs: u64,
    /// Forward buffer the engine should keep, in seconds
    pub cache_secs: u64,
    /// Live-edge tuning forwarded with every source
    pub live: LiveTuning,
}

impl Config {
    /// Load configuration from environment variables.
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 8700 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "8700".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let mpv_bin = env::var("MPV_BIN").unwrap_or_else(|_| "mpv".to_string());

        let default_user_agent = env::var("DEFAULT_USER_AGENT")
            .unwrap_or_else(|_| format!("zapper/{}", env!("CARGO_PKG_VERSION")));

        let network_timeout_secs = env::var("NETWORK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let cache_secs = env::var("CACHE_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .unwrap_or(120);

        let live = LiveTuning {
            target_offset_ms: env::var("LIVE_TARGET_OFFSET_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15_000),
            min_offset_ms: env::var("LIVE_MIN_OFFSET_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            max_offset_ms: env::var("LIVE_MAX_OFFSET_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60_000),
            ..LiveTuning::default()
        };

        Ok(Config {
            port,
            is_dev,
            mpv_bin,
            default_user_agent,
            network_timeout_secs,
            cache_secs,
            live,
        })
    }
}
