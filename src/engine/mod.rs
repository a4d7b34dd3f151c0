//! Media engine abstraction.
//!
//! The engine is a black-box collaborator: it owns decoding, buffering and
//! network I/O. The session controller only issues commands and consumes the
//! playback-state events defined here, so any engine that can honor this
//! contract can sit behind the launcher.

pub mod mock;
pub mod mpv;

use crate::config::{Config, LiveTuning};
use crate::cookies::CookieStore;
use crate::error::Result;
use crate::headers;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Playback-state callbacks emitted by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback is flowing with sufficient buffered data.
    Ready,
    /// The engine stalled to refill its buffer.
    Buffering,
    /// The stream reached its end. For a live feed this is abnormal.
    Ended,
    /// Unrecoverable engine-internal error.
    FatalError(String),
}

/// Container format chosen by URL inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hls,
    Progressive,
}

impl SourceKind {
    /// Anything mentioning m3u8 is treated as HLS; everything else plays as
    /// a progressive stream.
    pub fn detect(url: &str) -> Self {
        if url.contains("m3u8") {
            SourceKind::Hls
        } else {
            SourceKind::Progressive
        }
    }
}

/// Everything an engine needs to (re)open one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSourceSpec {
    pub url: String,
    pub kind: SourceKind,
    /// Extra request headers (keep-alive, session cookie).
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub live: LiveTuning,
}

/// Rebuilds the source spec for a session.
///
/// Kept by the controller and re-run on every recovery restart: the cookie
/// store may hold a refreshed value by then, and the rebuilt spec picks it
/// up without any session-level special casing.
#[derive(Clone)]
pub struct SourceBuilder {
    url: String,
    host: Option<String>,
    user_agent: Option<String>,
    default_user_agent: String,
    cookies: Arc<dyn CookieStore>,
    live: LiveTuning,
}

impl SourceBuilder {
    pub fn new(
        url: &str,
        user_agent: Option<&str>,
        cookies: Arc<dyn CookieStore>,
        config: &Config,
    ) -> Self {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned));

        Self {
            url: url.to_string(),
            host,
            user_agent: user_agent.map(str::to_owned),
            default_user_agent: config.default_user_agent.clone(),
            cookies,
            live: config.live.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Construct the spec, consulting the cookie store for the current value.
    pub fn build(&self) -> MediaSourceSpec {
        let user_agent = headers::resolve_user_agent(
            self.user_agent.as_deref(),
            &self.default_user_agent,
        )
        .to_string();

        MediaSourceSpec {
            url: self.url.clone(),
            kind: SourceKind::detect(&self.url),
            headers: headers::playback_headers(self.host.as_deref(), self.cookies.as_ref()),
            user_agent,
            live: self.live.clone(),
        }
    }
}

/// Command surface of a media engine.
///
/// All methods are driven from the session controller's single event loop,
/// so implementations never see concurrent commands.
#[async_trait]
pub trait MediaEngine: Send {
    /// Point the engine at a source. Does not start loading.
    async fn configure(&mut self, source: &MediaSourceSpec) -> Result<()>;

    /// Begin loading the configured source.
    async fn prepare(&mut self) -> Result<()>;

    /// Flip the "should play" flag (play/pause) without touching the source.
    async fn set_should_play(&mut self, should_play: bool) -> Result<()>;

    /// Halt playback, keeping the engine alive for a restart.
    async fn stop(&mut self) -> Result<()>;

    /// Drop the loaded media so a fresh source can be issued.
    async fn clear_media(&mut self) -> Result<()>;

    /// Tear the engine down. Must be safe to call after failures.
    async fn release(&mut self);

    /// Hand over the event stream. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>>;
}

/// Creates a fresh engine per session.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn MediaEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::MemoryCookieStore;

    fn test_config() -> Config {
        Config {
            port: 0,
            is_dev: true,
            mpv_bin: "mpv".into(),
            default_user_agent: "zapper/test".into(),
            network_timeout_secs: 15,
            cache_secs: 120,
            live: LiveTuning::default(),
        }
    }

    #[test]
    fn m3u8_urls_are_hls() {
        assert_eq!(
            SourceKind::detect("http://tv.example.com/live/1.m3u8"),
            SourceKind::Hls
        );
        assert_eq!(
            SourceKind::detect("http://tv.example.com/get.php?type=m3u8"),
            SourceKind::Hls
        );
    }

    #[test]
    fn plain_streams_are_progressive() {
        assert_eq!(
            SourceKind::detect("http://tv.example.com/live/1.ts"),
            SourceKind::Progressive
        );
    }

    #[test]
    fn builder_picks_up_refreshed_cookie() {
        let cookies = Arc::new(MemoryCookieStore::new());
        let builder = SourceBuilder::new(
            "http://tv.example.com/live/1.m3u8",
            None,
            cookies.clone(),
            &test_config(),
        );

        let first = builder.build();
        assert!(!first.headers.iter().any(|(k, _)| k == "Cookie"));

        // Shell refreshes the portal cookie mid-session; the next rebuild
        // (i.e. the next restart) must carry it.
        cookies.set("tv.example.com".into(), "sid=fresh".into());
        let second = builder.build();
        assert!(
            second
                .headers
                .contains(&("Cookie".to_string(), "sid=fresh".to_string()))
        );
    }

    #[test]
    fn builder_applies_user_agent_default() {
        let cookies = Arc::new(MemoryCookieStore::new());
        let config = test_config();

        let explicit = SourceBuilder::new("http://x/s.m3u8", Some("MyTV/1.0"), cookies.clone(), &config);
        assert_eq!(explicit.build().user_agent, "MyTV/1.0");

        let defaulted = SourceBuilder::new("http://x/s.m3u8", None, cookies, &config);
        assert_eq!(defaulted.build().user_agent, "zapper/test");
    }
}
