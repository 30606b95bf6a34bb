//! Workflow planning from the structured request.

use beatreel_models::{AudioSource, MediaRequest, Urgency, WorkflowPlan, WorkflowStep};

/// Builds the ordered step list for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowPlanner;

impl WorkflowPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan the steps for `request`.
    ///
    /// Enrichment is planned only for styles that ask for an AI background;
    /// the optimisation pass only for low-urgency requests. Both are skippable.
    pub fn plan(&self, request: &MediaRequest) -> WorkflowPlan {
        let mut steps = vec![WorkflowStep::LoadMetadata];
        let mut skippable = Vec::new();

        steps.push(match request.audio_source {
            AudioSource::Remote { .. } => WorkflowStep::AcquireRemoteAudio,
            AudioSource::Uploaded { .. } => WorkflowStep::ProcessUploadedAudio,
        });
        steps.push(WorkflowStep::GenerateVisuals);
        steps.push(WorkflowStep::BuildLayout);

        if request.visual_style.requests_ai_background() {
            steps.push(WorkflowStep::AiBackgroundEnrichment);
            skippable.push(WorkflowStep::AiBackgroundEnrichment);
        }

        steps.push(WorkflowStep::Compose);

        if request.urgency == Urgency::Low {
            steps.push(WorkflowStep::QualityOptimization);
            skippable.push(WorkflowStep::QualityOptimization);
        }

        WorkflowPlan::new(steps, skippable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatreel_models::{Classification, QualityTier, VisualStyle};

    #[test]
    fn test_classic_remote_plan() {
        let request = MediaRequest::new("random", 30.0)
            .with_style(VisualStyle::Classic)
            .with_quality(QualityTier::High);
        let plan = WorkflowPlanner::new().plan(&request);
        assert_eq!(
            plan.steps,
            vec![
                WorkflowStep::LoadMetadata,
                WorkflowStep::AcquireRemoteAudio,
                WorkflowStep::GenerateVisuals,
                WorkflowStep::BuildLayout,
                WorkflowStep::Compose,
            ]
        );
        assert_eq!(plan.classification, Classification::Moderate);
        assert!(plan.skippable.is_empty());
    }

    #[test]
    fn test_cinematic_low_urgency_plan() {
        let request = MediaRequest::new("Nova Lights", 20.0)
            .with_style(VisualStyle::Cinematic)
            .with_audio_source(AudioSource::uploaded("/music/a.mp3"))
            .with_urgency(Urgency::Low);
        let plan = WorkflowPlanner::new().plan(&request);
        assert_eq!(plan.len(), 7);
        assert_eq!(plan.steps[1], WorkflowStep::ProcessUploadedAudio);
        assert_eq!(plan.steps[4], WorkflowStep::AiBackgroundEnrichment);
        assert_eq!(plan.steps[6], WorkflowStep::QualityOptimization);
        assert!(plan.is_skippable(WorkflowStep::AiBackgroundEnrichment));
        assert!(plan.is_skippable(WorkflowStep::QualityOptimization));
        assert!(!plan.is_skippable(WorkflowStep::Compose));
        assert_eq!(plan.classification, Classification::Comprehensive);
    }

    #[test]
    fn test_high_urgency_skips_optimisation() {
        let request = MediaRequest::new("x", 10.0).with_urgency(Urgency::High);
        assert!(!WorkflowPlanner::new()
            .plan(&request)
            .contains(WorkflowStep::QualityOptimization));
    }
}
