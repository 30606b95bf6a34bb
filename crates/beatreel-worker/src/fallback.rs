//! Degraded-mode placeholders substituted after a pipeline failure.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use beatreel_media::{ComposeOptions, VideoComposer};
use beatreel_models::{MetadataTags, Placeholder, QualityTier, SyntheticArtifact, WorkflowStep};
use beatreel_render::Color;

use crate::metrics;

/// What the placeholder should describe.
#[derive(Debug, Clone)]
pub struct FallbackRequest {
    pub reason: String,
    pub failed_step: Option<WorkflowStep>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub duration_secs: f64,
    pub quality_tier: QualityTier,
    pub color: Color,
    /// File stem for the placeholder video
    pub output_name: String,
}

impl FallbackRequest {
    fn metadata_only(self) -> SyntheticArtifact {
        SyntheticArtifact {
            reason: self.reason,
            failed_step: self.failed_step,
            placeholder: Placeholder::MetadataOnly {
                artist: self.artist,
                title: self.title,
                duration_secs: self.duration_secs,
            },
        }
    }
}

/// Produce a static-colour video, or a metadata-only stub when even that
/// cannot be encoded. Never fails.
pub async fn synthesize(
    composer: &VideoComposer,
    request: FallbackRequest,
    work_dir: &Path,
    cancel: &CancellationToken,
) -> SyntheticArtifact {
    let profile = request.quality_tier.video_profile();
    let metadata = MetadataTags {
        artist: request.artist.clone(),
        title: request.title.clone(),
        description: Some(format!("placeholder: {}", request.reason)),
    };
    let options = ComposeOptions {
        quality_tier: request.quality_tier,
        metadata,
        output_name: Some(request.output_name.clone()),
    };

    let duration_secs = if request.duration_secs.is_finite() && request.duration_secs > 0.0 {
        request.duration_secs
    } else {
        1.0
    };

    match composer
        .compose_synthetic(
            duration_secs,
            profile.width,
            profile.height,
            &request.color.to_ffmpeg(),
            &options,
            work_dir,
            cancel,
        )
        .await
    {
        Ok(video) => {
            metrics::record_fallback("static_color_video");
            SyntheticArtifact {
                reason: request.reason,
                failed_step: request.failed_step,
                placeholder: Placeholder::StaticColorVideo {
                    path: video.path,
                    duration_secs: video.duration_secs,
                    width: video.width,
                    height: video.height,
                    color: request.color.to_string(),
                },
            }
        }
        Err(e) => {
            warn!(error = %e, "Placeholder video failed, returning metadata only");
            metrics::record_fallback("metadata_only");
            request.metadata_only()
        }
    }
}
