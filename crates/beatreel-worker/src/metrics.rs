//! Pipeline metrics.
//!
//! Only the `metrics` facade is used; the binary decides whether a recorder
//! is installed.

use metrics::{counter, histogram};

use beatreel_models::WorkflowStep;

pub mod names {
    pub const STEPS_TOTAL: &str = "beatreel_steps_total";
    pub const STEP_DURATION_SECONDS: &str = "beatreel_step_duration_seconds";
    pub const JOBS_TOTAL: &str = "beatreel_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "beatreel_job_duration_seconds";
    pub const FALLBACKS_TOTAL: &str = "beatreel_fallbacks_total";
    pub const SWEEP_FILES_REMOVED_TOTAL: &str = "beatreel_sweep_files_removed_total";
    pub const SWEEP_BYTES_FREED_TOTAL: &str = "beatreel_sweep_bytes_freed_total";
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

pub fn record_step(step: WorkflowStep, success: bool, duration_secs: f64) {
    let labels = [("step", step.as_str()), ("outcome", outcome(success))];
    counter!(names::STEPS_TOTAL, &labels).increment(1);
    histogram!(names::STEP_DURATION_SECONDS, "step" => step.as_str()).record(duration_secs);
}

/// `status` is `success`, `degraded` or `failure`.
pub fn record_job(status: &'static str, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "status" => status).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// `placeholder` is `static_color_video` or `metadata_only`.
pub fn record_fallback(placeholder: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "placeholder" => placeholder).increment(1);
}

pub fn record_sweep(files_removed: u64, bytes_freed: u64) {
    counter!(names::SWEEP_FILES_REMOVED_TOTAL).increment(files_removed);
    counter!(names::SWEEP_BYTES_FREED_TOTAL).increment(bytes_freed);
}
