//! Execution reports returned by the workflow executor.

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::job::JobId;
use crate::plan::{StepFailure, StepStatus, WorkflowPlan, WorkflowStep};

/// Structured result of one workflow run.
///
/// A failing run is still a report, not an error: `steps` holds the statuses
/// up to and including the failed step and `failure` says where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub job_id: JobId,
    pub plan: WorkflowPlan,
    pub steps: Vec<StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

impl ExecutionReport {
    pub fn new(job_id: JobId, plan: WorkflowPlan) -> Self {
        Self {
            job_id,
            plan,
            steps: Vec::new(),
            artifact: None,
            failure: None,
        }
    }

    /// True when every planned step ran and succeeded.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
            && self.steps.len() == self.plan.steps.len()
            && self.steps.iter().all(|s| s.success)
    }

    /// True when a placeholder stands in for the real output.
    pub fn is_degraded(&self) -> bool {
        self.artifact.as_ref().is_some_and(Artifact::is_mock)
    }

    pub fn last_successful_step(&self) -> Option<WorkflowStep> {
        self.steps
            .iter()
            .take_while(|s| s.success)
            .last()
            .map(|s| s.step)
    }

    pub fn failed_step(&self) -> Option<WorkflowStep> {
        self.failure.as_ref().map(|f| f.step)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}
