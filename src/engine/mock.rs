//! Scripted engine for exercising the session controller without a real
//! player process. Test support; not wired into any production path.

use super::{EngineEvent, EngineFactory, MediaEngine, MediaSourceSpec};
use crate::error::{Result, ZapperError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One recorded engine command, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Configure(String),
    Prepare,
    SetShouldPlay(bool),
    Stop,
    ClearMedia,
    Release,
}

/// Engine double that records every command and plays back whatever events
/// the test injects through its [`MockEngineHandle`].
pub struct MockEngine {
    log: Arc<Mutex<Vec<EngineCommand>>>,
    events: Option<mpsc::Receiver<EngineEvent>>,
    fail_prepare: bool,
}

/// Test-side handle paired with a [`MockEngine`].
#[derive(Clone)]
pub struct MockEngineHandle {
    events: mpsc::Sender<EngineEvent>,
    log: Arc<Mutex<Vec<EngineCommand>>>,
}

impl MockEngineHandle {
    /// Snapshot of all commands the controller has issued so far.
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.log.lock().unwrap().clone()
    }

    /// Inject a playback-state event as if the engine emitted it.
    pub async fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event).await;
    }
}

impl MockEngine {
    pub fn new() -> (Self, MockEngineHandle) {
        Self::with_options(false)
    }

    /// An engine whose `prepare()` fails, for driving the fallback path.
    pub fn failing_prepare() -> (Self, MockEngineHandle) {
        Self::with_options(true)
    }

    fn with_options(fail_prepare: bool) -> (Self, MockEngineHandle) {
        let (tx, rx) = mpsc::channel(32);
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Self {
            log: log.clone(),
            events: Some(rx),
            fail_prepare,
        };
        let handle = MockEngineHandle { events: tx, log };
        (engine, handle)
    }

    fn record(&self, command: EngineCommand) {
        self.log.lock().unwrap().push(command);
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn configure(&mut self, source: &MediaSourceSpec) -> Result<()> {
        self.record(EngineCommand::Configure(source.url.clone()));
        Ok(())
    }

    async fn prepare(&mut self) -> Result<()> {
        self.record(EngineCommand::Prepare);
        if self.fail_prepare {
            return Err(ZapperError::Engine("mock prepare failure".into()));
        }
        Ok(())
    }

    async fn set_should_play(&mut self, should_play: bool) -> Result<()> {
        self.record(EngineCommand::SetShouldPlay(should_play));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.record(EngineCommand::Stop);
        Ok(())
    }

    async fn clear_media(&mut self) -> Result<()> {
        self.record(EngineCommand::ClearMedia);
        Ok(())
    }

    async fn release(&mut self) {
        self.record(EngineCommand::Release);
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }
}

/// Factory producing mock engines; created handles are collected for the
/// test to drive.
#[derive(Clone, Default)]
pub struct MockEngineFactory {
    fail_create: bool,
    fail_prepare: bool,
    handles: Arc<Mutex<Vec<MockEngineHandle>>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose `create()` fails, as when the engine binary is missing.
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Factory whose engines fail on `prepare()`.
    pub fn failing_prepare() -> Self {
        Self {
            fail_prepare: true,
            ..Self::default()
        }
    }

    /// Handles for every engine created so far, in creation order.
    pub fn handles(&self) -> Vec<MockEngineHandle> {
        self.handles.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(&self) -> Result<Box<dyn MediaEngine>> {
        if self.fail_create {
            return Err(ZapperError::Engine("mock engine unavailable".into()));
        }
        let (engine, handle) = MockEngine::with_options(self.fail_prepare);
        self.handles.lock().unwrap().push(handle);
        Ok(Box::new(engine))
    }
}
