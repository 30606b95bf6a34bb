//! Metrics emitted by media operations.
//!
//! Only the `metrics` facade is used here; installing a recorder is left to
//! the binary.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FFMPEG_RUNS_TOTAL: &str = "beatreel_ffmpeg_runs_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "beatreel_ffmpeg_duration_seconds";
    pub const DOWNLOADS_TOTAL: &str = "beatreel_downloads_total";
    pub const DOWNLOAD_BYTES_TOTAL: &str = "beatreel_download_bytes_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "beatreel_download_duration_seconds";
    pub const COMPOSITIONS_TOTAL: &str = "beatreel_compositions_total";
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record one FFmpeg invocation.
pub fn record_ffmpeg_run(success: bool, duration_secs: f64) {
    let labels = [("outcome", outcome(success))];
    counter!(names::FFMPEG_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::FFMPEG_DURATION_SECONDS).record(duration_secs);
}

/// Record one HTTP download attempt.
pub fn record_download(success: bool, bytes: u64, duration_secs: f64) {
    let labels = [("outcome", outcome(success))];
    counter!(names::DOWNLOADS_TOTAL, &labels).increment(1);
    counter!(names::DOWNLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record one composition by path (`frames`, `still`, `convert`, ...).
pub fn record_composition(mode: &'static str, success: bool) {
    let labels = [("mode", mode), ("outcome", outcome(success))];
    counter!(names::COMPOSITIONS_TOTAL, &labels).increment(1);
}
