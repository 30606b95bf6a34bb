//! Workflow plans and per-step status records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error_kind::ErrorKind;

/// One stage of the generation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Load artist/content metadata from the catalog
    LoadMetadata,
    /// Download, clip and fade a remote audio track
    AcquireRemoteAudio,
    /// Clip and fade an uploaded audio file
    ProcessUploadedAudio,
    /// Produce background art and the waveform amplitudes
    GenerateVisuals,
    /// Build the layout document and its animation directives
    BuildLayout,
    /// Re-tint the background and write a description via text completion
    AiBackgroundEnrichment,
    /// Render frames (or a still) and mux with the audio clip
    Compose,
    /// Extra encode pass with a slower preset
    QualityOptimization,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::LoadMetadata => "load_metadata",
            WorkflowStep::AcquireRemoteAudio => "acquire_remote_audio",
            WorkflowStep::ProcessUploadedAudio => "process_uploaded_audio",
            WorkflowStep::GenerateVisuals => "generate_visuals",
            WorkflowStep::BuildLayout => "build_layout",
            WorkflowStep::AiBackgroundEnrichment => "ai_background_enrichment",
            WorkflowStep::Compose => "compose",
            WorkflowStep::QualityOptimization => "quality_optimization",
        }
    }

    /// Human-readable label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowStep::LoadMetadata => "Load artist/content metadata",
            WorkflowStep::AcquireRemoteAudio => "Acquire remote audio",
            WorkflowStep::ProcessUploadedAudio => "Process uploaded audio",
            WorkflowStep::GenerateVisuals => "Generate visuals",
            WorkflowStep::BuildLayout => "Build layout",
            WorkflowStep::AiBackgroundEnrichment => "AI background enrichment",
            WorkflowStep::Compose => "Compose video",
            WorkflowStep::QualityOptimization => "Quality optimization pass",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory size class of a plan. Does not change execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Simple,
    Moderate,
    Comprehensive,
}

impl Classification {
    /// `>5` steps is comprehensive, `>3` moderate, anything else simple.
    pub fn from_step_count(count: usize) -> Self {
        if count > 5 {
            Classification::Comprehensive
        } else if count > 3 {
            Classification::Moderate
        } else {
            Classification::Simple
        }
    }
}

/// Ordered steps chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowPlan {
    pub steps: Vec<WorkflowStep>,
    pub classification: Classification,
    /// Steps included only because the request asked for them. A plan
    /// without them still yields a video; a failure in one still halts the run.
    pub skippable: Vec<WorkflowStep>,
}

impl WorkflowPlan {
    pub fn new(steps: Vec<WorkflowStep>, skippable: Vec<WorkflowStep>) -> Self {
        let classification = Classification::from_step_count(steps.len());
        Self {
            steps,
            classification,
            skippable,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step: WorkflowStep) -> bool {
        self.steps.contains(&step)
    }

    pub fn is_skippable(&self, step: WorkflowStep) -> bool {
        self.skippable.contains(&step)
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepStatus {
    pub step: WorkflowStep,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepStatus {
    pub fn succeeded(step: WorkflowStep, duration_ms: u64) -> Self {
        Self {
            step,
            success: true,
            timestamp: Utc::now(),
            duration_ms,
            error: None,
        }
    }

    pub fn failed(step: WorkflowStep, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            timestamp: Utc::now(),
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// Where and why execution stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepFailure {
    pub step: WorkflowStep,
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(Classification::from_step_count(0), Classification::Simple);
        assert_eq!(Classification::from_step_count(3), Classification::Simple);
        assert_eq!(Classification::from_step_count(4), Classification::Moderate);
        assert_eq!(Classification::from_step_count(5), Classification::Moderate);
        assert_eq!(Classification::from_step_count(6), Classification::Comprehensive);
        assert_eq!(Classification::from_step_count(7), Classification::Comprehensive);
    }

    #[test]
    fn test_step_serialization() {
        assert_eq!(
            serde_json::to_string(&WorkflowStep::AiBackgroundEnrichment).unwrap(),
            "\"ai_background_enrichment\""
        );
        assert_eq!(WorkflowStep::LoadMetadata.label(), "Load artist/content metadata");
    }

    #[test]
    fn test_plan_helpers() {
        let plan = WorkflowPlan::new(
            vec![WorkflowStep::LoadMetadata, WorkflowStep::Compose],
            vec![],
        );
        assert_eq!(plan.classification, Classification::Simple);
        assert!(plan.contains(WorkflowStep::Compose));
        assert!(!plan.is_skippable(WorkflowStep::Compose));
    }
}
