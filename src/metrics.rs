//! Counter wrappers around the `metrics` facade.
//!
//! Keeps metric names and labels in one place so call sites stay one-liners.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once and return a render handle.
///
/// Subsequent calls return the same handle, so tests building several
/// routers in one process do not trip the global-recorder guard.
pub fn prometheus_handle() -> PrometheusHandle {
    PROMETHEUS
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder");
            describe_metrics();
            handle
        })
        .clone()
}

fn describe_metrics() {
    describe_counter!("zapper_launches_total", "Playback launches by player");
    describe_counter!(
        "zapper_launch_rejected_total",
        "Launch requests rejected before a session was created"
    );
    describe_counter!(
        "zapper_restarts_total",
        "Stream restarts issued by the recovery loop, by trigger"
    );
    describe_counter!(
        "zapper_sessions_failed_total",
        "Sessions abandoned after exhausting the reconnect ceiling"
    );
}

/// Record a successful launch, labeled with the player that took it.
pub fn record_launch(player: &str) {
    counter!("zapper_launches_total", "player" => player.to_string()).increment(1);
}

/// Record a launch request rejected before any session existed.
pub fn record_launch_rejected(reason: &'static str) {
    counter!("zapper_launch_rejected_total", "reason" => reason).increment(1);
}

/// Record a recovery restart. `trigger` is "buffering" or "error".
pub fn record_restart(trigger: &'static str) {
    counter!("zapper_restarts_total", "trigger" => trigger).increment(1);
}

/// Record a session giving up after the reconnect ceiling.
pub fn record_terminal_failure() {
    counter!("zapper_sessions_failed_total").increment(1);
}
