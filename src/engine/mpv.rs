//! Built-in engine: an mpv subprocess driven over its JSON IPC socket.
//!
//! mpv is spawned idle with a private IPC socket. Commands are one-line
//! JSON requests; playback state comes back as events and observed
//! property changes, mapped onto [`EngineEvent`]s:
//!
//! - `playback-restart` and `paused-for-cache=false` -> `Ready`
//! - `paused-for-cache=true` -> `Buffering`
//! - `end-file` with reason `eof` -> `Ended`
//! - `end-file` with reason `error` -> `FatalError`
//!
//! `end-file` with reason `stop` or `quit` is our own stop/teardown and is
//! not reported.

use super::{EngineEvent, EngineFactory, MediaEngine, MediaSourceSpec};
use crate::config::Config;
use crate::error::{Result, ZapperError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};
use tracing::debug;

/// Distinguishes sockets when several sessions run in one process lifetime.
static SOCKET_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct MpvEngine {
    child: Child,
    ipc: OwnedWriteHalf,
    events: Option<mpsc::Receiver<EngineEvent>>,
    pending_url: Option<String>,
    request_id: u64,
    socket_path: PathBuf,
    released: bool,
}

impl MpvEngine {
    /// Spawn mpv and connect to its IPC socket.
    ///
    /// A missing binary is reported as an engine error so the launcher can
    /// fall through to the external player chain.
    pub async fn spawn(config: &Config) -> Result<Self> {
        let socket_path = std::env::temp_dir().join(format!(
            "zapper-mpv-{}-{}.sock",
            std::process::id(),
            SOCKET_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let mut command = Command::new(&config.mpv_bin);
        command
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg("--force-window=yes")
            .arg("--fullscreen")
            .arg("--keep-open=no")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                ZapperError::Engine(format!("mpv binary '{}' not found", config.mpv_bin))
            }
            _ => ZapperError::Engine(format!("failed to spawn mpv: {e}")),
        })?;

        debug!("mpv started, waiting for IPC socket at {}", socket_path.display());
        let stream = connect_with_retry(&socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        let (event_tx, event_rx) = mpsc::channel(32);
        tokio::spawn(read_events(read_half, event_tx));

        let mut engine = Self {
            child,
            ipc: write_half,
            events: Some(event_rx),
            pending_url: None,
            request_id: 0,
            socket_path,
            released: false,
        };

        // Buffering detection rides on this property.
        engine
            .send_command(json!(["observe_property", 1, "paused-for-cache"]))
            .await?;

        engine
            .set_property("network-timeout", json!(config.network_timeout_secs))
            .await?;
        engine
            .set_property("cache-secs", json!(config.cache_secs))
            .await?;

        Ok(engine)
    }

    async fn send_command(&mut self, command: Value) -> Result<()> {
        self.request_id += 1;
        let request = json!({ "command": command, "request_id": self.request_id });
        let mut line =
            serde_json::to_vec(&request).map_err(|e| ZapperError::Engine(e.to_string()))?;
        line.push(b'\n');
        self.ipc
            .write_all(&line)
            .await
            .map_err(|e| ZapperError::Engine(format!("mpv IPC write failed: {e}")))
    }

    async fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.send_command(json!(["set_property", name, value])).await
    }
}

#[async_trait]
impl MediaEngine for MpvEngine {
    async fn configure(&mut self, source: &MediaSourceSpec) -> Result<()> {
        self.set_property("user-agent", json!(source.user_agent))
            .await?;

        let fields: Vec<String> = source
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        self.set_property("http-header-fields", json!(fields))
            .await?;

        // Loading starts paused; the controller owns the should-play flag.
        self.set_property("pause", json!(true)).await?;
        self.pending_url = Some(source.url.clone());
        Ok(())
    }

    async fn prepare(&mut self) -> Result<()> {
        let url = self
            .pending_url
            .clone()
            .ok_or_else(|| ZapperError::Engine("prepare() called before configure()".into()))?;
        self.send_command(json!(["loadfile", url, "replace"])).await
    }

    async fn set_should_play(&mut self, should_play: bool) -> Result<()> {
        self.set_property("pause", json!(!should_play)).await
    }

    async fn stop(&mut self) -> Result<()> {
        self.send_command(json!(["stop"])).await
    }

    async fn clear_media(&mut self) -> Result<()> {
        self.pending_url = None;
        self.send_command(json!(["playlist-clear"])).await
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Ask nicely first; the kill_on_drop guard is the backstop.
        let _ = self.send_command(json!(["quit"])).await;
        if timeout(Duration::from_millis(500), self.child.wait())
            .await
            .is_err()
        {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
        let _ = tokio::fs::remove_file(&self.socket_path).await;
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }
}

/// mpv creates the socket some time after startup; poll until it accepts.
async fn connect_with_retry(path: &Path) -> Result<UnixStream> {
    for _ in 0..50 {
        match UnixStream::connect(path).await {
            Ok(stream) => return Ok(stream),
            Err(_) => sleep(Duration::from_millis(100)).await,
        }
    }
    Err(ZapperError::Engine(
        "mpv IPC socket did not come up".into(),
    ))
}

/// Reads IPC lines until the socket closes. Dropping the sender afterwards
/// closes the engine's event stream, which the controller treats as fatal.
async fn read_events(read_half: OwnedReadHalf, events: mpsc::Sender<EngineEvent>) {
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if let Some(event) = map_event(&message)
            && events.send(event).await.is_err()
        {
            break;
        }
    }
    debug!("mpv IPC socket closed");
}

fn map_event(message: &Value) -> Option<EngineEvent> {
    match message.get("event")?.as_str()? {
        "playback-restart" => Some(EngineEvent::Ready),

        "property-change" => {
            if message.get("name")?.as_str()? != "paused-for-cache" {
                return None;
            }
            match message.get("data")?.as_bool()? {
                true => Some(EngineEvent::Buffering),
                false => Some(EngineEvent::Ready),
            }
        }

        "end-file" => match message.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(EngineEvent::Ended),
            Some("error") => Some(EngineEvent::FatalError(
                message
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("playback error")
                    .to_string(),
            )),
            // stop/quit/redirect are consequences of our own commands
            _ => None,
        },

        _ => None,
    }
}

/// Creates one mpv engine per session.
pub struct MpvEngineFactory {
    config: Arc<Config>,
}

impl MpvEngineFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for MpvEngineFactory {
    async fn create(&self) -> Result<Box<dyn MediaEngine>> {
        Ok(Box::new(MpvEngine::spawn(&self.config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_stall_maps_to_buffering() {
        let msg = json!({"event": "property-change", "id": 1, "name": "paused-for-cache", "data": true});
        assert_eq!(map_event(&msg), Some(EngineEvent::Buffering));
    }

    #[test]
    fn cache_refill_maps_to_ready() {
        let msg = json!({"event": "property-change", "id": 1, "name": "paused-for-cache", "data": false});
        assert_eq!(map_event(&msg), Some(EngineEvent::Ready));
    }

    #[test]
    fn playback_restart_maps_to_ready() {
        let msg = json!({"event": "playback-restart"});
        assert_eq!(map_event(&msg), Some(EngineEvent::Ready));
    }

    #[test]
    fn eof_maps_to_ended() {
        let msg = json!({"event": "end-file", "reason": "eof"});
        assert_eq!(map_event(&msg), Some(EngineEvent::Ended));
    }

    #[test]
    fn error_end_maps_to_fatal_with_cause() {
        let msg = json!({"event": "end-file", "reason": "error", "file_error": "loading failed"});
        assert_eq!(
            map_event(&msg),
            Some(EngineEvent::FatalError("loading failed".into()))
        );
    }

    #[test]
    fn own_stop_is_not_an_event() {
        let msg = json!({"event": "end-file", "reason": "stop"});
        assert_eq!(map_event(&msg), None);
        let msg = json!({"event": "end-file", "reason": "quit"});
        assert_eq!(map_event(&msg), None);
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        assert_eq!(map_event(&json!({"event": "tick"})), None);
        assert_eq!(map_event(&json!({"request_id": 3, "error": "success"})), None);
        assert_eq!(
            map_event(&json!({"event": "property-change", "name": "volume", "data": 55.0})),
            None
        );
    }
}
