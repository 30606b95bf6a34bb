//! Render metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const RENDERS_TOTAL: &str = "beatreel_renders_total";
    pub const RENDER_DURATION_SECONDS: &str = "beatreel_render_duration_seconds";
}

/// Record one render call (`frames` or `still`).
pub fn record_render(mode: &'static str, success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    let labels = [("mode", mode), ("outcome", outcome)];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, "mode" => mode).record(duration_secs);
}
