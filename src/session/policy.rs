//! Recovery policy for a single playback session.
//!
//! Two independent counters cover two failure modes. Buffering events are
//! counted inside a sliding window to catch a live stream that is up but
//! unstable and needs a fresh connection. Reconnect attempts are counted
//! across the whole session to bound retries against a source that is
//! simply dead. Neither counter knows *why* the stream misbehaved; the
//! engine offers no richer signal, and the heuristic is kept as coarse as
//! the player it comes from.

use std::time::Duration;
use tokio::time::Instant;

/// Sliding window for detecting buffering bursts.
pub const BUFFERING_WINDOW: Duration = Duration::from_secs(20);

/// Buffering events inside the window before the stream counts as stuck.
pub const BUFFERING_BURST_THRESHOLD: u32 = 2;

/// Delay before the restart issued for a stuck stream.
pub const BURST_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Back-off added per reconnect attempt. Linear, not exponential: live
/// sources recover within tens of seconds or not at all, and a viewer is
/// waiting.
pub const BACKOFF_STEP: Duration = Duration::from_millis(2000);

/// Upper bound on the reconnect back-off.
pub const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Reconnect attempts before the session gives up for good.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// What the controller should do with the event it just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep waiting; the engine may recover on its own.
    Continue,
    /// Tear playback down and re-issue the source after `delay`.
    Restart { delay: Duration },
    /// Attempt ceiling reached; abandon the session.
    GiveUp,
}

/// The decision state machine. Pure: no timers, no engine handle, no I/O.
/// The controller feeds it events and executes whatever it decides.
#[derive(Debug, Default)]
pub struct RecoveryPolicy {
    reconnect_attempts: u32,
    buffering_count: u32,
    last_buffering: Option<Instant>,
}

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback reached a healthy ready state: both counters reset.
    pub fn on_ready(&mut self) {
        self.reconnect_attempts = 0;
        self.buffering_count = 0;
    }

    /// The engine stalled to refill its buffer at `now`.
    ///
    /// Two or more stalls inside the window mean the connection is stuck:
    /// the count resets and a short-delay restart is requested. A stall
    /// after the window expired starts a fresh count at 1. Reconnect
    /// attempts are never touched here; only [`on_error`](Self::on_error)
    /// spends them.
    pub fn on_buffering(&mut self, now: Instant) -> Decision {
        let decision = match self.last_buffering {
            Some(prev) if now.duration_since(prev) < BUFFERING_WINDOW => {
                self.buffering_count += 1;
                if self.buffering_count >= BUFFERING_BURST_THRESHOLD {
                    self.buffering_count = 0;
                    Decision::Restart {
                        delay: BURST_RESTART_DELAY,
                    }
                } else {
                    Decision::Continue
                }
            }
            _ => {
                self.buffering_count = 1;
                Decision::Continue
            }
        };

        self.last_buffering = Some(now);
        decision
    }

    /// The single recovery gate: playback errors and unexpected stream ends
    /// both land here.
    pub fn on_error(&mut self) -> Decision {
        if self.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
            return Decision::GiveUp;
        }

        self.reconnect_attempts += 1;
        let delay = (BACKOFF_STEP * self.reconnect_attempts).min(BACKOFF_CAP);
        Decision::Restart { delay }
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn buffering_count(&self) -> u32 {
        self.buffering_count
    }
}
