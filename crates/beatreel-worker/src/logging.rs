//! Structured job logging and subscriber setup.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use beatreel_models::{JobId, WorkflowStep};

/// Install the global subscriber: JSON when `LOG_FORMAT=json`, ANSI text otherwise.
///
/// `RUST_LOG` is honoured; `default_directive` is added on top of it.
pub fn init_tracing(default_directive: &str) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = default_directive.parse() {
        env_filter = env_filter.add_directive(directive);
    }

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if use_json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
    };
    // Already installed (tests, embedding)
    let _ = result;
}

/// Consistent lifecycle lines for one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_step_start(&self, step: WorkflowStep) {
        info!(
            job_id = %self.job_id,
            step = step.as_str(),
            "Step started: {}", step.label()
        );
    }

    pub fn log_step_ok(&self, step: WorkflowStep, duration_ms: u64) {
        info!(
            job_id = %self.job_id,
            step = step.as_str(),
            duration_ms,
            "Step succeeded"
        );
    }

    pub fn log_step_failed(&self, step: WorkflowStep, kind: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            step = step.as_str(),
            kind,
            "Step failed: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job id for everything logged inside the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "media_generation");
        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "media_generation");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing("beatreel=debug");
        init_tracing("not a directive ===");
    }
}
