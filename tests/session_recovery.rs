//! Recovery-loop scenarios driven against the mock engine with a paused
//! clock, so every timer fires exactly when the test advances time.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;
use zapper::config::{Config, LiveTuning};
use zapper::cookies::MemoryCookieStore;
use zapper::engine::SourceBuilder;
use zapper::engine::mock::{EngineCommand, MockEngine, MockEngineHandle};
use zapper::engine::EngineEvent;
use zapper::error::ZapperError;
use zapper::session::SessionState;
use zapper::session::controller::SessionController;
use zapper::session::SessionHandle;

const URL: &str = "http://tv.example.com/live/1.m3u8";

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

async fn start_session(url: &str) -> (SessionHandle, MockEngineHandle) {
    let (engine, mock) = MockEngine::new();
    let source = SourceBuilder::new(
        url,
        None,
        Arc::new(MemoryCookieStore::new()),
        &test_config(),
    );
    let handle = SessionController::start(Box::new(engine), source)
        .await
        .expect("session start");
    (handle, mock)
}

/// Let the controller task drain everything queued for it.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn stops(commands: &[EngineCommand]) -> usize {
    commands.iter().filter(|c| **c == EngineCommand::Stop).count()
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ── Launch ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_url_never_creates_a_session() {
    let (engine, mock) = MockEngine::new();
    let source = SourceBuilder::new(
        "",
        None,
        Arc::new(MemoryCookieStore::new()),
        &test_config(),
    );

    let result = SessionController::start(Box::new(engine), source).await;
    assert!(matches!(result, Err(ZapperError::UrlRequired)));
    assert!(mock.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ready_event_marks_session_ready() {
    let (handle, mock) = start_session(URL).await;
    assert_eq!(handle.state(), SessionState::Starting);

    mock.emit(EngineEvent::Ready).await;
    settle().await;

    assert_eq!(handle.state(), SessionState::Ready);
}

// ── Buffering bursts ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn second_stall_within_window_restarts_after_one_second() {
    let (handle, mock) = start_session(URL).await;

    mock.emit(EngineEvent::Buffering).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Buffering);

    advance(secs(5)).await;
    mock.emit(EngineEvent::Buffering).await;
    settle().await;

    // Restart decided but not yet executed: it runs one second out.
    assert_eq!(handle.state(), SessionState::Recovering);
    assert_eq!(stops(&mock.commands()), 0);

    advance(secs(1)).await;
    settle().await;

    let commands = mock.commands();
    assert_eq!(stops(&commands), 1);
    // Full re-issue cycle: stop, clear, configure same URL, prepare, play.
    assert_eq!(
        &commands[3..],
        &[
            EngineCommand::Stop,
            EngineCommand::ClearMedia,
            EngineCommand::Configure(URL.into()),
            EngineCommand::Prepare,
            EngineCommand::SetShouldPlay(true),
        ]
    );
    assert_eq!(handle.state(), SessionState::Starting);
}

#[tokio::test(start_paused = true)]
async fn stalls_outside_the_window_never_restart() {
    let (handle, mock) = start_session(URL).await;

    for _ in 0..4 {
        mock.emit(EngineEvent::Buffering).await;
        settle().await;
        advance(secs(25)).await;
        settle().await;
    }

    assert_eq!(stops(&mock.commands()), 0);
    assert_eq!(handle.state(), SessionState::Buffering);
}

#[tokio::test(start_paused = true)]
async fn burst_restarts_exactly_once_per_burst() {
    // Stalls at t=0, t=5s, t=9s: one restart for the pair, the third stall
    // starts a fresh count instead of triggering again.
    let (_handle, mock) = start_session(URL).await;

    mock.emit(EngineEvent::Buffering).await;
    settle().await;

    advance(secs(5)).await;
    mock.emit(EngineEvent::Buffering).await;
    settle().await;

    advance(secs(1)).await; // restart from the second stall executes at t=6s
    settle().await;
    assert_eq!(stops(&mock.commands()), 1);

    advance(secs(3)).await; // t=9s
    mock.emit(EngineEvent::Buffering).await;
    settle().await;

    advance(secs(15)).await;
    settle().await;
    assert_eq!(
        stops(&mock.commands()),
        1,
        "third stall must not schedule a second restart"
    );
}

// ── Error back-off ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stream_end_reconnects_with_backoff() {
    let (handle, mock) = start_session(URL).await;

    mock.emit(EngineEvent::Ended).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Recovering);

    // First attempt waits 2000ms; just before the deadline nothing runs.
    advance(Duration::from_millis(1999)).await;
    settle().await;
    assert_eq!(stops(&mock.commands()), 0);

    advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(stops(&mock.commands()), 1);
    assert_eq!(handle.state(), SessionState::Starting);
}

#[tokio::test(start_paused = true)]
async fn backoff_caps_at_ten_seconds() {
    let (_handle, mock) = start_session(URL).await;

    // Nine failures, letting each scheduled restart run: attempt N waits
    // min(N * 2s, 10s).
    for attempt in 1..=9u64 {
        mock.emit(EngineEvent::FatalError("network down".into())).await;
        settle().await;
        advance(Duration::from_millis((attempt * 2000).min(10_000))).await;
        settle().await;
        assert_eq!(stops(&mock.commands()), attempt as usize);
    }

    // Tenth failure: capped at 10s, not 20s.
    mock.emit(EngineEvent::FatalError("network down".into())).await;
    settle().await;
    advance(Duration::from_millis(9_999)).await;
    settle().await;
    assert_eq!(stops(&mock.commands()), 9);

    advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(stops(&mock.commands()), 10);
}

#[tokio::test(start_paused = true)]
async fn eleventh_failure_is_terminal() {
    let (handle, mock) = start_session(URL).await;

    for _ in 0..10 {
        mock.emit(EngineEvent::FatalError("dead source".into())).await;
        settle().await;
        advance(secs(10)).await;
        settle().await;
    }
    assert_eq!(handle.state(), SessionState::Starting);

    mock.emit(EngineEvent::FatalError("dead source".into())).await;
    settle().await;

    assert_eq!(handle.state(), SessionState::Failed);
    let commands = mock.commands();
    assert_eq!(commands.last(), Some(&EngineCommand::Release));

    // Terminal means terminal: later events reach a dead loop and change
    // nothing.
    mock.emit(EngineEvent::Ready).await;
    advance(secs(60)).await;
    settle().await;
    assert_eq!(mock.commands(), commands);
    assert_eq!(handle.state(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn ready_restores_the_retry_budget() {
    let (handle, mock) = start_session(URL).await;

    for _ in 0..10 {
        mock.emit(EngineEvent::FatalError("flaky".into())).await;
        settle().await;
        advance(secs(10)).await;
        settle().await;
    }

    // Playback comes good: the budget resets entirely.
    mock.emit(EngineEvent::Ready).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Ready);

    // The next failure is attempt 1 again (2s), not a terminal one.
    mock.emit(EngineEvent::FatalError("flaky again".into())).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Recovering);

    advance(secs(2)).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Starting);
}

// ── Disposal ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn dispose_cancels_the_pending_restart() {
    let (handle, mock) = start_session(URL).await;

    mock.emit(EngineEvent::FatalError("network blip".into())).await;
    settle().await;
    assert_eq!(handle.state(), SessionState::Recovering);

    handle.dispose();
    settle().await;

    let after_dispose = mock.commands();
    assert_eq!(after_dispose.last(), Some(&EngineCommand::Release));
    assert_eq!(stops(&after_dispose), 0);

    // The cancelled timer must not reach the released engine.
    advance(secs(30)).await;
    settle().await;
    assert_eq!(mock.commands(), after_dispose);
}

#[tokio::test(start_paused = true)]
async fn dispose_is_idempotent() {
    let (handle, mock) = start_session(URL).await;

    handle.dispose();
    settle().await;
    handle.dispose();
    settle().await;

    let commands = mock.commands();
    assert_eq!(
        commands.iter().filter(|c| **c == EngineCommand::Release).count(),
        1
    );
    assert_eq!(handle.state(), SessionState::Ended);
}

// ── Play/pause controls ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn toggle_pause_resume_flip_the_flag_only() {
    let (handle, mock) = start_session(URL).await;

    handle.toggle_play_pause().await.expect("toggle");
    settle().await;
    handle.pause().await.expect("pause");
    settle().await;
    handle.resume().await.expect("resume");
    settle().await;

    let commands = mock.commands();
    assert_eq!(
        &commands[3..],
        &[
            EngineCommand::SetShouldPlay(false), // toggle from playing
            EngineCommand::SetShouldPlay(false), // backgrounded
            EngineCommand::SetShouldPlay(true),  // foregrounded
        ]
    );

    // None of that touched the recovery counters: no restart ever fires.
    advance(secs(60)).await;
    settle().await;
    assert_eq!(stops(&mock.commands()), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_preserves_a_paused_should_play_flag() {
    let (_handle, mock) = start_session(URL).await;

    _handle.toggle_play_pause().await.expect("toggle");
    settle().await;

    mock.emit(EngineEvent::Ended).await;
    settle().await;
    advance(secs(2)).await;
    settle().await;

    // The re-issue ends with the flag as the viewer left it: paused.
    assert_eq!(
        mock.commands().last(),
        Some(&EngineCommand::SetShouldPlay(false))
    );
}
