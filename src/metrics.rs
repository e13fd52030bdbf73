//! Capture metrics, exported in Prometheus text format at `GET /metrics`.

use crate::error::CaptureError;
use metrics::{counter, decrement_gauge, histogram, increment_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const CAPTURES_SUCCEEDED: &str = "pageshot_captures_succeeded_total";
pub const CAPTURES_FAILED: &str = "pageshot_captures_failed_total";
pub const CAPTURE_DURATION: &str = "pageshot_capture_duration_seconds";
pub const LIVE_SESSIONS: &str = "pageshot_live_sessions";

/// Install the process-wide Prometheus recorder. Called once at startup;
/// the returned handle renders the exposition text for the HTTP route.
pub fn install() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_capture_success(elapsed: Duration) {
    counter!(CAPTURES_SUCCEEDED, 1);
    histogram!(CAPTURE_DURATION, elapsed.as_secs_f64());
}

pub fn record_capture_error(error: &CaptureError, elapsed: Duration) {
    counter!(CAPTURES_FAILED, 1, "stage" => error.stage().as_str());
    histogram!(CAPTURE_DURATION, elapsed.as_secs_f64());
}

pub fn session_opened() {
    increment_gauge!(LIVE_SESSIONS, 1.0);
}

pub fn session_closed() {
    decrement_gauge!(LIVE_SESSIONS, 1.0);
}
