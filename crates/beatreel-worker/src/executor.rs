//! Workflow executor.
//!
//! Runs a plan's steps in order against one job's state. The first failure
//! of any step halts the run; the report carries the statuses so far and the
//! failure point. With fallback enabled a tagged placeholder replaces the
//! missing artifact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use beatreel_media::fs_utils::remove_dir_quietly;
use beatreel_media::{
    extract_waveform, AcquireOptions, AcquirerTimeouts, AudioAcquirer, ComposeOptions,
    ComposerConfig, Downloader, MediaError, VideoComposer, VisualInput,
};
use beatreel_models::{
    Artifact, Artist, ArtistSelector, AudioClip, AudioOrigin, AudioSource,
    ExecutionReport, JobId, MediaRequest, MetadataTags, StepFailure, StepStatus, Track,
    VideoArtifact, WorkflowPlan, WorkflowStep,
};
use beatreel_render::{
    FrameRenderer, LabelFont, RenderOptions, RendererConfig, StillOptions, SurfacePool,
    SurfacePoolOpts,
};
use beatreel_text::TextCompletion;

use crate::catalog::{pick_track, ArtistCatalog};
use crate::config::WorkerConfig;
use crate::enrichment::Enricher;
use crate::error::{WorkerError, WorkerResult};
use crate::fallback::{self, FallbackRequest};
use crate::layout_builder::{build_layout, write_layout_html, BuiltLayout, CardText};
use crate::logging::JobLogger;
use crate::metrics;
use crate::planner::WorkflowPlanner;
use crate::retry::{retry_async, RetryConfig};
use crate::visuals::{write_background, BackgroundSpec, Palette};

/// Sub-directory of the job scratch space that holds rendered frames.
const FRAMES_DIR: &str = "frames";

/// Everything one job accumulates while its steps run.
struct JobState {
    work_dir: PathBuf,
    artist: Option<Artist>,
    track: Option<Track>,
    audio: Option<AudioClip>,
    waveform: Vec<f32>,
    palette: Option<Palette>,
    background: Option<(BackgroundSpec, PathBuf)>,
    layout: Option<BuiltLayout>,
    description: Option<String>,
    video: Option<VideoArtifact>,
}

impl JobState {
    fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            artist: None,
            track: None,
            audio: None,
            waveform: Vec::new(),
            palette: None,
            background: None,
            layout: None,
            description: None,
            video: None,
        }
    }

    fn artist_name(&self) -> Option<String> {
        self.artist.as_ref().map(|a| a.name.clone())
    }

    fn track_title(&self) -> Option<String> {
        self.track.as_ref().map(|t| t.title.clone())
    }
}

/// The configured label font, else the first system font found.
fn label_font(config: &WorkerConfig) -> WorkerResult<Option<LabelFont>> {
    if let Some(path) = &config.label_font {
        return Ok(Some(LabelFont::open(path)?));
    }
    let font = LabelFont::discover();
    match &font {
        Some(font) => debug!(
            family = font.family(),
            path = %font.origin().display(),
            "Using system label font"
        ),
        None => warn!("No label font found; set BEATREEL_FONT to draw label text"),
    }
    Ok(font)
}

fn require<'a, T>(value: &'a Option<T>, what: &str) -> WorkerResult<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| WorkerError::internal(format!("{} not available", what)))
}

/// Plans and runs media requests.
pub struct WorkflowExecutor {
    config: WorkerConfig,
    catalog: Arc<dyn ArtistCatalog>,
    planner: WorkflowPlanner,
    acquirer: AudioAcquirer,
    renderer: FrameRenderer,
    composer: VideoComposer,
    text: Option<Arc<dyn TextCompletion>>,
    job_semaphore: Arc<Semaphore>,
}

impl WorkflowExecutor {
    pub fn new(config: WorkerConfig, catalog: Arc<dyn ArtistCatalog>) -> WorkerResult<Self> {
        let downloader = Downloader::new(config.download_timeout)?;
        let acquirer = AudioAcquirer::new(
            downloader,
            AcquirerTimeouts {
                probe: config.probe_timeout,
                encode: config.encode_timeout,
            },
        );
        let pool = SurfacePool::raster_with_font(
            SurfacePoolOpts {
                max_active: config.max_render_surfaces,
                max_idle_per_size: config.max_render_surfaces,
            },
            label_font(&config)?,
        );
        let renderer = FrameRenderer::new(
            pool,
            RendererConfig {
                settle_timeout: config.settle_timeout,
            },
        );
        let composer = VideoComposer::new(ComposerConfig {
            output_dir: config.output_dir.clone(),
            encode_timeout: config.encode_timeout,
            probe_timeout: config.probe_timeout,
            thumbnails: config.thumbnails,
        });
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Ok(Self {
            config,
            catalog,
            planner: WorkflowPlanner::new(),
            acquirer,
            renderer,
            composer,
            text: None,
            job_semaphore,
        })
    }

    /// Enable the AI background enrichment step.
    pub fn with_text_client(mut self, client: Arc<dyn TextCompletion>) -> Self {
        self.text = Some(client);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn surface_pool(&self) -> &Arc<SurfacePool> {
        self.renderer.pool()
    }

    pub fn plan(&self, request: &MediaRequest) -> WorkflowPlan {
        self.planner.plan(request)
    }

    /// Validate, plan and execute one request, substituting a placeholder
    /// on failure when fallback is enabled.
    ///
    /// Only an invalid request or cancellation while waiting for a job slot
    /// is an `Err`; pipeline failures are reported in the returned report.
    pub async fn run(
        &self,
        request: MediaRequest,
        cancel: &CancellationToken,
    ) -> WorkerResult<ExecutionReport> {
        request.validate()?;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            permit = self.job_semaphore.acquire() => {
                permit.map_err(|_| WorkerError::internal("job semaphore closed"))?
            }
        };

        let plan = self.plan(&request);
        let job_id = JobId::new();
        Ok(self
            .execute_job(&plan, &request, &job_id, cancel, self.config.fallback_enabled)
            .await)
    }

    /// Run independent requests concurrently, at most `max_concurrent_jobs`
    /// at a time. Results come back in request order.
    pub async fn run_many(
        self: &Arc<Self>,
        requests: Vec<MediaRequest>,
        cancel: &CancellationToken,
    ) -> Vec<WorkerResult<ExecutionReport>> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let executor = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move { executor.run(request, &cancel).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(WorkerError::internal(format!("job task failed: {}", e)))
                })
            })
            .collect()
    }

    /// Execute `plan` for `request` without fallback substitution.
    pub async fn execute(
        &self,
        plan: &WorkflowPlan,
        request: &MediaRequest,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        self.execute_job(plan, request, job_id, cancel, false).await
    }

    async fn execute_job(
        &self,
        plan: &WorkflowPlan,
        request: &MediaRequest,
        job_id: &JobId,
        cancel: &CancellationToken,
        with_fallback: bool,
    ) -> ExecutionReport {
        let logger = JobLogger::new(job_id, "workflow");
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!(
                "{} steps ({:?}) for artist {}",
                plan.len(),
                plan.classification,
                request.artist
            ));

            let mut state = JobState::new(self.config.scratch_dir.join(job_id.as_str()));
            let mut report = self
                .run_steps(plan, request, job_id, &mut state, &logger, cancel)
                .await;

            if with_fallback {
                if let Some(failure) = report.failure.clone() {
                    let placeholder = fallback::synthesize(
                        &self.composer,
                        FallbackRequest {
                            reason: failure.message,
                            failed_step: Some(failure.step),
                            artist: state.artist_name().or_else(|| match &request.artist {
                                ArtistSelector::Named(name) => Some(name.clone()),
                                ArtistSelector::Random => None,
                            }),
                            title: state.track_title(),
                            duration_secs: request.target_duration_secs,
                            quality_tier: request.quality_tier,
                            color: Palette::for_style(request.visual_style).gradient_from,
                            output_name: format!("{}-placeholder", job_id),
                        },
                        &state.work_dir,
                        cancel,
                    )
                    .await;
                    logger.log_warning(&format!(
                        "pipeline failed at {}, returning placeholder",
                        failure.step
                    ));
                    report.artifact = Some(Artifact::Synthetic(placeholder));
                }
            }

            if self.config.keep_scratch {
                debug!(path = %state.work_dir.display(), "Keeping scratch directory");
            } else {
                remove_dir_quietly(&state.work_dir).await;
            }

            let status = match (&report.failure, &report.artifact) {
                (None, _) => "success",
                (Some(_), Some(_)) => "degraded",
                (Some(_), None) => "failure",
            };
            metrics::record_job(status, started.elapsed().as_secs_f64());
            logger.log_completion(&format!(
                "{} after {} of {} steps",
                status,
                report.steps.len(),
                plan.len()
            ));
            report
        }
        .instrument(span)
        .await
    }

    async fn run_steps(
        &self,
        plan: &WorkflowPlan,
        request: &MediaRequest,
        job_id: &JobId,
        state: &mut JobState,
        logger: &JobLogger,
        cancel: &CancellationToken,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::new(job_id.clone(), plan.clone());
        let deadline = tokio::time::Instant::now() + self.config.job_timeout;

        for &step in &plan.steps {
            logger.log_step_start(step);
            let started = Instant::now();

            let result = if cancel.is_cancelled() {
                Err(WorkerError::Cancelled)
            } else {
                match tokio::time::timeout_at(
                    deadline,
                    self.run_step(step, request, job_id, state, cancel),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(WorkerError::Timeout(self.config.job_timeout)),
                }
            };

            let elapsed = started.elapsed();
            let duration_ms = elapsed.as_millis() as u64;
            metrics::record_step(step, result.is_ok(), elapsed.as_secs_f64());

            match result {
                Ok(()) => {
                    logger.log_step_ok(step, duration_ms);
                    report.steps.push(StepStatus::succeeded(step, duration_ms));
                }
                Err(e) => {
                    let kind = e.kind();
                    let message = e.to_string();
                    logger.log_step_failed(step, kind.as_str(), &message);
                    report
                        .steps
                        .push(StepStatus::failed(step, duration_ms, message.clone()));
                    report.failure = Some(StepFailure {
                        step,
                        kind,
                        message,
                    });
                    break;
                }
            }
        }

        if report.failure.is_none() {
            report.artifact = state.video.clone().map(Artifact::Real);
        }
        report
    }

    async fn run_step(
        &self,
        step: WorkflowStep,
        request: &MediaRequest,
        job_id: &JobId,
        state: &mut JobState,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        match step {
            WorkflowStep::LoadMetadata => self.load_metadata(request, state),
            WorkflowStep::AcquireRemoteAudio | WorkflowStep::ProcessUploadedAudio => {
                self.acquire_audio(request, state, cancel).await
            }
            WorkflowStep::GenerateVisuals => self.generate_visuals(request, state, cancel).await,
            WorkflowStep::BuildLayout => self.build_layout(request, state).await,
            WorkflowStep::AiBackgroundEnrichment => self.enrich_background(request, state).await,
            WorkflowStep::Compose => self.compose(request, job_id, state, cancel).await,
            WorkflowStep::QualityOptimization => self.optimize(state, cancel).await,
        }
    }

    fn load_metadata(&self, request: &MediaRequest, state: &mut JobState) -> WorkerResult<()> {
        let needs_url = matches!(request.audio_source, AudioSource::Remote { url: None });
        let mut rng = rand::rng();
        let artist = self.catalog.resolve(&request.artist, needs_url, &mut rng)?;
        let track = pick_track(&artist, needs_url, &mut rng).cloned();

        if needs_url && track.is_none() {
            return Err(WorkerError::validation(format!(
                "artist '{}' has no track with a source URL and the request names none",
                artist.name
            )));
        }

        info!(
            artist = %artist.name,
            track = track.as_ref().map(|t| t.title.as_str()).unwrap_or("-"),
            "Loaded metadata"
        );
        state.artist = Some(artist);
        state.track = track;
        Ok(())
    }

    async fn acquire_audio(
        &self,
        request: &MediaRequest,
        state: &mut JobState,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        let origin = match &request.audio_source {
            AudioSource::Remote { url: Some(url) } => AudioOrigin::Remote { url: url.clone() },
            AudioSource::Remote { url: None } => AudioOrigin::Remote {
                url: state
                    .track
                    .as_ref()
                    .and_then(|t| t.source_url.clone())
                    .ok_or_else(|| WorkerError::validation("no source URL for remote audio"))?,
            },
            AudioSource::Uploaded { path } => AudioOrigin::Uploaded { path: path.clone() },
        };

        let options = AcquireOptions::new(request.target_duration_secs, request.quality_tier)
            .with_fades(request.fade_in_secs, request.fade_out_secs)
            .with_start(request.start_time_secs)
            .with_gain(request.volume_gain);
        let work_dir = state.work_dir.clone();

        let clip = match &origin {
            AudioOrigin::Remote { .. } => {
                let retry = RetryConfig::new("acquire_remote_audio")
                    .with_max_retries(self.config.download_retries);
                let outcome = retry_async(
                    &retry,
                    |e: &MediaError| e.is_transient() && !cancel.is_cancelled(),
                    || self.acquirer.acquire(&origin, &options, &work_dir, cancel),
                )
                .await;
                if outcome.attempts > 1 {
                    debug!(attempts = outcome.attempts, "Remote audio needed retries");
                }
                outcome.result?
            }
            AudioOrigin::Uploaded { .. } => {
                self.acquirer
                    .acquire(&origin, &options, &work_dir, cancel)
                    .await?
            }
        };

        state.audio = Some(clip);
        Ok(())
    }

    async fn generate_visuals(
        &self,
        request: &MediaRequest,
        state: &mut JobState,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        let artist_name = require(&state.artist, "artist metadata")?.name.clone();
        let profile = request.quality_tier.video_profile();
        let palette = Palette::for_style(request.visual_style);
        let spec = BackgroundSpec::new(
            request.visual_style,
            &palette,
            profile.width,
            profile.height,
            &artist_name,
        );
        let path = write_background(&spec, &state.work_dir).await?;

        let waveform = match &state.audio {
            Some(audio) if self.config.waveform_bars > 0 => {
                extract_waveform(
                    &audio.local_path,
                    self.config.waveform_bars,
                    &state.work_dir,
                    self.config.encode_timeout,
                    cancel,
                )
                .await?
            }
            _ => Vec::new(),
        };

        state.palette = Some(palette);
        state.background = Some((spec, path));
        state.waveform = waveform;
        Ok(())
    }

    async fn build_layout(&self, request: &MediaRequest, state: &mut JobState) -> WorkerResult<()> {
        let profile = request.quality_tier.video_profile();
        let text = CardText {
            artist: require(&state.artist, "artist metadata")?.name.clone(),
            title: state.track_title(),
        };
        let palette = require(&state.palette, "palette")?;
        let (_, background) = require(&state.background, "background")?;

        let built = build_layout(
            request.visual_style,
            palette,
            background,
            &text,
            profile.width,
            profile.height,
        );
        write_layout_html(&built.document, &state.work_dir).await?;
        debug!(
            elements = built.document.elements.len(),
            directives = built.directives.len(),
            "Built layout"
        );
        state.layout = Some(built);
        Ok(())
    }

    async fn enrich_background(
        &self,
        request: &MediaRequest,
        state: &mut JobState,
    ) -> WorkerResult<()> {
        let client = self.text.as_ref().ok_or_else(|| {
            WorkerError::validation("AI background requested but no text service is configured")
        })?;
        let artist = require(&state.artist, "artist metadata")?;
        let enrichment = Enricher::new(Arc::clone(client))
            .enrich(artist, state.track.as_ref(), request.visual_style)
            .await?;

        let (spec, _) = require(&state.background, "background")?;
        let spec = spec.clone().with_colors(enrichment.from, enrichment.to);
        let path = write_background(&spec, &state.work_dir).await?;

        state.palette = state
            .palette
            .map(|p| p.with_gradient(enrichment.from, enrichment.to));
        state.background = Some((spec, path));
        if !enrichment.description.is_empty() {
            state.description = Some(enrichment.description);
        }
        Ok(())
    }

    async fn compose(
        &self,
        request: &MediaRequest,
        job_id: &JobId,
        state: &mut JobState,
        cancel: &CancellationToken,
    ) -> WorkerResult<()> {
        let audio = require(&state.audio, "audio clip")?;
        let built = require(&state.layout, "layout")?;
        let artist = require(&state.artist, "artist metadata")?;
        let profile = request.quality_tier.video_profile();

        let visual = if request.visual_style.prefers_still() {
            let mut options = StillOptions::new(profile.width, profile.height);
            if !state.waveform.is_empty() {
                options = options.with_waveform(state.waveform.clone());
            }
            let still = self
                .renderer
                .render_still(&built.document, &options, &state.work_dir, cancel)
                .await?;
            VisualInput::Still(still)
        } else {
            let mut options = RenderOptions::new(
                profile.width,
                profile.height,
                profile.fps,
                audio.clip_duration_secs,
            );
            if !state.waveform.is_empty() {
                options = options.with_waveform(state.waveform.clone());
            }
            let frames = self
                .renderer
                .render_frames(
                    &built.document,
                    &built.directives,
                    &options,
                    &state.work_dir.join(FRAMES_DIR),
                    cancel,
                )
                .await?;
            VisualInput::Frames(frames)
        };

        let title = state.track_title().unwrap_or_else(|| artist.name.clone());
        let mut metadata = MetadataTags::new(&artist.name, title);
        if let Some(description) = &state.description {
            metadata = metadata.with_description(description);
        }
        let options = ComposeOptions {
            quality_tier: request.quality_tier,
            metadata,
            output_name: Some(job_id.to_string()),
        };

        let video = self
            .composer
            .compose(visual, audio, &options, &state.work_dir, cancel)
            .await?;
        state.video = Some(video);
        Ok(())
    }

    async fn optimize(&self, state: &mut JobState, cancel: &CancellationToken) -> WorkerResult<()> {
        let video = require(&state.video, "composed video")?;
        let optimized = self.composer.optimize(video, cancel).await?;
        state.video = Some(optimized);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use beatreel_models::{ErrorKind, Placeholder, VisualStyle};
    use std::time::Duration;

    fn executor(base: &std::path::Path, fallback: bool) -> WorkflowExecutor {
        let mut config = WorkerConfig::default().with_base_dir(base);
        config.fallback_enabled = fallback;
        config.job_timeout = Duration::from_secs(30);
        WorkflowExecutor::new(config, Arc::new(StaticCatalog::builtin())).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = executor(dir.path(), false)
            .run(MediaRequest::new("random", 0.0), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unknown_artist_halts_at_first_step() {
        let dir = tempfile::tempdir().unwrap();
        let report = executor(dir.path(), false)
            .run(MediaRequest::new("Nobody", 10.0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 1);
        assert!(!report.steps[0].success);
        let failure = report.failure.unwrap();
        assert_eq!(failure.step, WorkflowStep::LoadMetadata);
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert!(report.artifact.is_none());
    }

    #[tokio::test]
    async fn test_missing_upload_fails_audio_step() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), false);
        let request = MediaRequest::new("Nova Lights", 10.0)
            .with_audio_source(AudioSource::uploaded(dir.path().join("missing.mp3")));
        let report = exec.run(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.last_successful_step(), Some(WorkflowStep::LoadMetadata));
        assert_eq!(report.failed_step(), Some(WorkflowStep::ProcessUploadedAudio));
        assert_eq!(report.failure.as_ref().unwrap().kind, ErrorKind::Validation);

        // Scratch space for the job is gone.
        let leftovers = std::fs::read_dir(&exec.config().scratch_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_optional_step_halts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), false);
        let plan = WorkflowPlan::new(
            vec![
                WorkflowStep::LoadMetadata,
                WorkflowStep::AiBackgroundEnrichment,
                WorkflowStep::Compose,
            ],
            vec![WorkflowStep::AiBackgroundEnrichment],
        );
        let request = MediaRequest::new("Nova Lights", 5.0).with_style(VisualStyle::Cinematic);
        let report = exec
            .execute(&plan, &request, &JobId::new(), &CancellationToken::new())
            .await;

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.last_successful_step(), Some(WorkflowStep::LoadMetadata));
        let failure = report.failure.as_ref().unwrap();
        assert_eq!(failure.step, WorkflowStep::AiBackgroundEnrichment);
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert!(report.steps.iter().all(|s| s.step != WorkflowStep::Compose));
        assert!(report.artifact.is_none());
    }

    #[tokio::test]
    async fn test_builtin_catalog_needs_explicit_url() {
        let dir = tempfile::tempdir().unwrap();
        let report = executor(dir.path(), false)
            .run(MediaRequest::new("Kilo Verse", 10.0), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed_step(), Some(WorkflowStep::LoadMetadata));
    }

    #[tokio::test]
    async fn test_fallback_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let request = MediaRequest::new("Nobody", 5.0).with_style(VisualStyle::Neon);
        let report = executor(dir.path(), true)
            .run(request, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_degraded());
        assert!(!report.succeeded());
        let synthetic = report.artifact.as_ref().unwrap().as_synthetic().unwrap();
        assert_eq!(synthetic.failed_step, Some(WorkflowStep::LoadMetadata));
        match &synthetic.placeholder {
            Placeholder::MetadataOnly { artist, .. } => {
                assert_eq!(artist.as_deref(), Some("Nobody"));
            }
            Placeholder::StaticColorVideo { path, .. } => assert!(path.exists()),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(dir.path(), false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = exec
            .run(MediaRequest::new("random", 10.0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Cancelled));

        let request = MediaRequest::new("random", 10.0);
        let plan = exec.plan(&request);
        let report = exec.execute(&plan, &request, &JobId::new(), &cancel).await;
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.failure.unwrap().kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_run_many_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(executor(dir.path(), false));
        let requests = vec![
            MediaRequest::new("Nobody", 5.0),
            MediaRequest::new("random", -1.0),
            MediaRequest::new("Also Nobody", 5.0),
        ];
        let results = exec.run_many(requests, &CancellationToken::new()).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().unwrap().failed_step(),
            Some(WorkflowStep::LoadMetadata)
        );
        assert_eq!(exec.job_semaphore.available_permits(), 2);
    }
}
