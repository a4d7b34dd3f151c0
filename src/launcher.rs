//! Launch orchestration: validate the request, try the built-in engine,
//! fall through to external players.

use crate::config::Config;
use crate::cookies::CookieStore;
use crate::engine::{EngineFactory, SourceBuilder};
use crate::error::{Result, ZapperError};
use crate::fallback::FallbackChain;
use crate::metrics;
use crate::session::SessionHandle;
use crate::session::controller::SessionController;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Inbound launch request from the hybrid shell.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "userAgent")]
    pub user_agent: Option<String>,
}

/// Where the stream ended up playing.
pub enum Launched {
    /// Built-in engine took it; the handle controls the session.
    BuiltIn(SessionHandle),
    /// An external player application took it (by name).
    External(&'static str),
}

impl Launched {
    pub fn player_name(&self) -> &'static str {
        match self {
            Launched::BuiltIn(_) => "builtin",
            Launched::External(name) => name,
        }
    }
}

pub struct Launcher {
    config: Arc<Config>,
    engines: Arc<dyn EngineFactory>,
    cookies: Arc<dyn CookieStore>,
    fallback: FallbackChain,
}

impl Launcher {
    pub fn new(
        config: Arc<Config>,
        engines: Arc<dyn EngineFactory>,
        cookies: Arc<dyn CookieStore>,
        fallback: FallbackChain,
    ) -> Self {
        Self {
            config,
            engines,
            cookies,
            fallback,
        }
    }

    /// Handle one launch request.
    ///
    /// The URL is trimmed once here; the session sees it immutable from
    /// then on. An empty URL is rejected before any engine or session
    /// exists.
    pub async fn launch(&self, request: &LaunchRequest) -> Result<Launched> {
        let url = request.url.trim();
        if url.is_empty() {
            metrics::record_launch_rejected("url_required");
            return Err(ZapperError::UrlRequired);
        }
        if let Err(e) = validate_stream_url(url) {
            metrics::record_launch_rejected("invalid_url");
            return Err(e);
        }

        info!("Launching player for {url}");
        let user_agent = request.user_agent.as_deref();

        match self.start_builtin(url, user_agent).await {
            Ok(handle) => {
                metrics::record_launch("builtin");
                Ok(Launched::BuiltIn(handle))
            }
            Err(e) => {
                warn!("Built-in player failed: {e}");
                match self.fallback.launch(url, user_agent) {
                    Ok(name) => {
                        metrics::record_launch(name);
                        Ok(Launched::External(name))
                    }
                    Err(err) => {
                        metrics::record_launch_rejected("no_player");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn start_builtin(&self, url: &str, user_agent: Option<&str>) -> Result<SessionHandle> {
        let engine = self.engines.create().await?;
        let source = SourceBuilder::new(url, user_agent, Arc::clone(&self.cookies), &self.config);
        SessionController::start(engine, source).await
    }
}

/// Accept the schemes IPTV sources actually use.
///
/// HTTP(S) must carry a host; raw transport schemes (rtmp/rtsp/udp/rtp)
/// pass through untouched, the players sort those out themselves. No
/// private-range blocking here: IPTV sources routinely live on the LAN
/// and nothing is fetched server-side.
pub fn validate_stream_url(url: &str) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|_| ZapperError::InvalidUrl(format!("not a valid URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {
            if parsed.host().is_none() {
                return Err(ZapperError::InvalidUrl(format!("no host in URL: {url}")));
            }
        }
        "rtmp" | "rtsp" | "udp" | "rtp" => {}
        scheme => {
            return Err(ZapperError::InvalidUrl(format!(
                "scheme '{scheme}' is not a playable stream"
            )));
        }
    }

    Ok(())
}
