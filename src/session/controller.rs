//! The session controller: converts low-level playback events into recovery
//! actions and drives the engine through stop/reset/restart cycles.
//!
//! All session state lives inside one tokio task. Engine events, user
//! commands, and the pending restart timer are multiplexed with `select!`,
//! so handlers run strictly one at a time in arrival order and no locking
//! is needed. Disposal cancels the pending restart before the engine handle
//! is released: a stale timer must never restart a session whose engine is
//! gone.

use crate::engine::{EngineEvent, MediaEngine, SourceBuilder};
use crate::error::{Result, ZapperError};
use crate::metrics;
use crate::session::SessionState;
use crate::session::policy::{Decision, MAX_RECONNECT_ATTEMPTS, RecoveryPolicy};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// User-facing controls forwarded into the event loop.
#[derive(Debug)]
enum SessionCommand {
    TogglePlayPause,
    Pause,
    Resume,
}

/// Owner-side handle to a running session.
///
/// Dropping the handle disposes the session, so replacing the active
/// session cannot leak a playing engine.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Current lifecycle state, as last published by the controller.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Select/confirm key: flip play/pause.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.send(SessionCommand::TogglePlayPause).await
    }

    /// Host went to the background.
    pub async fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause).await
    }

    /// Host came back to the foreground.
    pub async fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume).await
    }

    /// Tear the session down. Idempotent; safe after the session already
    /// ended on its own.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ZapperError::NoActiveSession)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Drives one engine for one URL until disposal or terminal failure.
pub struct SessionController {
    engine: Box<dyn MediaEngine>,
    source: SourceBuilder,
    policy: RecoveryPolicy,
    should_play: bool,
    state: watch::Sender<SessionState>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Receiver<EngineEvent>,
    events_open: bool,
    cancel: CancellationToken,
    restart_at: Option<Instant>,
}

impl SessionController {
    /// Configure the engine with the first source and start the event loop.
    ///
    /// Fails fast (no session, no task) when the URL is empty or the
    /// engine rejects the initial source. Launch-time failures here are
    /// what sends the launcher down the external-player chain.
    pub async fn start(
        mut engine: Box<dyn MediaEngine>,
        source: SourceBuilder,
    ) -> Result<SessionHandle> {
        if source.url().trim().is_empty() {
            return Err(ZapperError::UrlRequired);
        }

        let events = engine
            .take_events()
            .ok_or_else(|| ZapperError::Engine("engine event stream already taken".into()))?;

        let spec = source.build();
        engine.configure(&spec).await?;
        engine.prepare().await?;
        engine.set_should_play(true).await?;

        info!("Playing: {}", source.url());

        let (state_tx, state_rx) = watch::channel(SessionState::Starting);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let controller = SessionController {
            engine,
            source,
            policy: RecoveryPolicy::new(),
            should_play: true,
            state: state_tx,
            commands: cmd_rx,
            events,
            events_open: true,
            cancel: cancel.clone(),
            restart_at: None,
        };
        tokio::spawn(controller.run());

        Ok(SessionHandle {
            commands: cmd_tx,
            state: state_rx,
            cancel,
        })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Session disposed, releasing engine");
                    self.teardown(SessionState::Ended).await;
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // Every handle is gone: nobody can control or observe
                    // this session anymore.
                    None => {
                        self.teardown(SessionState::Ended).await;
                        break;
                    }
                },

                event = self.events.recv(), if self.events_open => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            self.events_open = false;
                            self.handle_event(EngineEvent::FatalError(
                                "engine event stream closed".into(),
                            ))
                            .await;
                        }
                    }
                    if self.state() == SessionState::Failed {
                        break;
                    }
                }

                _ = wait_until(self.restart_at), if self.restart_at.is_some() => {
                    self.restart_at = None;
                    self.restart().await;
                    if self.state() == SessionState::Failed {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let target = match command {
            SessionCommand::TogglePlayPause => !self.should_play,
            SessionCommand::Pause => false,
            SessionCommand::Resume => true,
        };

        match self.engine.set_should_play(target).await {
            Ok(()) => self.should_play = target,
            Err(e) => warn!("Failed to set should-play flag: {e}"),
        }
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready => {
                debug!("Playback ready");
                self.policy.on_ready();
                self.set_state(SessionState::Ready);
            }

            EngineEvent::Buffering => {
                self.set_state(SessionState::Buffering);
                if let Decision::Restart { delay } = self.policy.on_buffering(Instant::now()) {
                    info!("Too many stalls, reconnecting stream");
                    metrics::record_restart("buffering");
                    self.schedule_restart(delay);
                }
            }

            EngineEvent::Ended => {
                info!("Stream ended, reconnecting...");
                self.handle_stream_error().await;
            }

            EngineEvent::FatalError(cause) => {
                warn!("Playback error: {cause}");
                self.handle_stream_error().await;
            }
        }
    }

    /// The shared recovery gate for playback errors and unexpected ends.
    async fn handle_stream_error(&mut self) {
        match self.policy.on_error() {
            Decision::GiveUp => {
                error!(
                    "Stream did not recover after {} attempts, giving up",
                    MAX_RECONNECT_ATTEMPTS
                );
                metrics::record_terminal_failure();
                self.teardown(SessionState::Failed).await;
            }
            Decision::Restart { delay } => {
                info!(
                    "Reconnecting in {}ms (attempt {})",
                    delay.as_millis(),
                    self.policy.reconnect_attempts()
                );
                metrics::record_restart("error");
                self.schedule_restart(delay);
            }
            Decision::Continue => {}
        }
    }

    /// At most one restart is ever pending; the latest decision wins.
    fn schedule_restart(&mut self, delay: Duration) {
        self.restart_at = Some(Instant::now() + delay);
        self.set_state(SessionState::Recovering);
    }

    async fn restart(&mut self) {
        debug!("Restarting stream");
        match self.reissue_source().await {
            Ok(()) => self.set_state(SessionState::Starting),
            Err(e) => {
                // A failed restart is just another playback error; the gate
                // bounds how often this can happen.
                warn!("Restart failed: {e}");
                self.handle_stream_error().await;
            }
        }
    }

    /// Stop, clear, and re-issue the same URL. The source spec is rebuilt
    /// from scratch so refreshed auth headers are applied.
    async fn reissue_source(&mut self) -> Result<()> {
        self.engine.stop().await?;
        self.engine.clear_media().await?;

        let spec = self.source.build();
        self.engine.configure(&spec).await?;
        self.engine.prepare().await?;
        self.engine.set_should_play(self.should_play).await
    }

    /// Cancel any pending restart, then release the engine.
    async fn teardown(&mut self, final_state: SessionState) {
        self.restart_at = None;
        self.engine.release().await;
        self.set_state(final_state);
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state() != next {
            debug!("Session state: {} -> {}", self.state().as_str(), next.as_str());
            self.state.send_replace(next);
        }
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LiveTuning};
    use crate::cookies::MemoryCookieStore;
    use crate::engine::mock::{EngineCommand, MockEngine};
    use std::sync::Arc;

    fn test_source(url: &str) -> SourceBuilder {
        let config = Config {
            port: 0,
            is_dev: true,
            mpv_bin: "mpv".into(),
            default_user_agent: "zapper/test".into(),
            network_timeout_secs: 15,
            cache_secs: 120,
            live: LiveTuning::default(),
        };
        SourceBuilder::new(url, None, Arc::new(MemoryCookieStore::new()), &config)
    }

    #[tokio::test]
    async fn empty_url_creates_no_session() {
        let (engine, handle) = MockEngine::new();
        let result = SessionController::start(Box::new(engine), test_source("   ")).await;

        assert!(matches!(result, Err(ZapperError::UrlRequired)));
        assert!(
            handle.commands().is_empty(),
            "no engine command may be issued for a rejected launch"
        );
    }

    #[tokio::test]
    async fn start_issues_configure_prepare_play() {
        let (engine, mock) = MockEngine::new();
        let handle = SessionController::start(Box::new(engine), test_source("http://x/s.m3u8"))
            .await
            .expect("start");

        assert_eq!(handle.state(), SessionState::Starting);
        assert_eq!(
            mock.commands(),
            vec![
                EngineCommand::Configure("http://x/s.m3u8".into()),
                EngineCommand::Prepare,
                EngineCommand::SetShouldPlay(true),
            ]
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_engine() {
        let (engine, mock) = MockEngine::new();
        let handle = SessionController::start(Box::new(engine), test_source("http://x/s.m3u8"))
            .await
            .expect("start");

        drop(handle);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(
            mock.commands().last(),
            Some(&EngineCommand::Release),
            "dropping the handle must release the engine"
        );
    }
}
