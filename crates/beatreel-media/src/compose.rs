//! Video composition: frames or a still plus an audio clip into one container.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beatreel_models::{AudioClip, FrameSequence, MetadataTags, QualityTier, VideoArtifact};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{drawtext_filter, gif_filter, scale_pad_filter, TextOverlayOptions};
use crate::fs_utils::{move_file, remove_dir_quietly, remove_quietly, unique_path};
use crate::metrics;
use crate::probe::probe_media;
use crate::thumbnail;

/// GIF exports are capped to this frame rate and width.
const GIF_FPS: u32 = 12;
const GIF_WIDTH: u32 = 480;

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Durable directory finished artifacts are moved into
    pub output_dir: PathBuf,
    pub encode_timeout: Duration,
    pub probe_timeout: Duration,
    /// Write a poster JPEG next to every composed video
    pub thumbnails: bool,
}

impl ComposerConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            encode_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(30),
            thumbnails: false,
        }
    }
}

/// Visual side of a composition.
#[derive(Debug, Clone)]
pub enum VisualInput {
    /// Ordered frames encoded at the sequence fps.
    Frames(FrameSequence),
    /// One image looped for the whole audio duration.
    Still(PathBuf),
}

/// Per-call composition options.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub quality_tier: QualityTier,
    pub metadata: MetadataTags,
    /// File stem for the output; a UUID when absent
    pub output_name: Option<String>,
}

/// Container formats `convert` can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp4,
    Webm,
    Mov,
    Gif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
            OutputFormat::Mov => "mov",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn has_audio(&self) -> bool {
        !matches!(self, OutputFormat::Gif)
    }

    /// Encoder arguments for this format at `tier`.
    fn encode_args(&self, tier: QualityTier) -> Vec<String> {
        let profile = tier.video_profile();
        match self {
            OutputFormat::Mp4 | OutputFormat::Mov => {
                let mut args = profile.video_args();
                args.extend(profile.audio_args());
                args.extend(["-movflags".to_string(), "+faststart".to_string()]);
                args
            }
            OutputFormat::Webm => vec![
                "-c:v".to_string(),
                "libvpx-vp9".to_string(),
                "-b:v".to_string(),
                format!("{}k", profile.video_bitrate_kbps),
                "-deadline".to_string(),
                "good".to_string(),
                "-row-mt".to_string(),
                "1".to_string(),
                "-c:a".to_string(),
                "libopus".to_string(),
                "-b:a".to_string(),
                format!("{}k", profile.audio_bitrate_kbps),
            ],
            OutputFormat::Gif => vec![
                "-vf".to_string(),
                gif_filter(GIF_FPS, GIF_WIDTH),
                "-an".to_string(),
                "-loop".to_string(),
                "0".to_string(),
            ],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "webm" => Ok(OutputFormat::Webm),
            "mov" => Ok(OutputFormat::Mov),
            "gif" => Ok(OutputFormat::Gif),
            other => Err(MediaError::invalid_input(format!(
                "unsupported output format: {}",
                other
            ))),
        }
    }
}

/// Muxes visuals and audio into finished artifacts.
#[derive(Debug, Clone)]
pub struct VideoComposer {
    config: ComposerConfig,
}

impl VideoComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    fn runner(&self, cancel: &CancellationToken) -> FfmpegRunner {
        FfmpegRunner::new()
            .with_timeout(self.config.encode_timeout)
            .with_cancel(cancel.clone())
    }

    fn output_path(&self, name: Option<&str>, extension: &str) -> PathBuf {
        let stem = name
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.config
            .output_dir
            .join(format!("{}.{}", stem, extension))
    }

    /// Compose `visual` with `audio` into one MP4 in the output directory.
    ///
    /// Work happens in `work_dir`; only the finished file is moved out. On
    /// success the frame directory and intermediates are deleted. On failure
    /// every partial file is removed.
    pub async fn compose(
        &self,
        visual: VisualInput,
        audio: &AudioClip,
        options: &ComposeOptions,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        validate_inputs(&visual, audio)?;
        tokio::fs::create_dir_all(work_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let mode = match &visual {
            VisualInput::Frames(_) => "frames",
            VisualInput::Still(_) => "still",
        };
        let partial = unique_path(work_dir, "partial", "mp4");
        let silent = unique_path(work_dir, "silent", "mp4");

        let encoded = match &visual {
            VisualInput::Frames(seq) => {
                self.encode_frames(seq, audio, options, &silent, &partial, cancel)
                    .await
            }
            VisualInput::Still(image) => {
                self.encode_still(image, audio, options, &partial, cancel)
                    .await
            }
        };
        remove_quietly(&silent).await;

        if let Err(e) = encoded {
            warn!(mode, error = %e, "Composition failed, removing partial output");
            remove_quietly(&partial).await;
            metrics::record_composition(mode, false);
            return Err(e);
        }

        let final_path = self.output_path(
            options.output_name.as_deref(),
            OutputFormat::Mp4.extension(),
        );
        let artifact = match self
            .finish(&partial, &final_path, options.quality_tier, &options.metadata, cancel)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                remove_quietly(&partial).await;
                remove_quietly(&final_path).await;
                metrics::record_composition(mode, false);
                return Err(e);
            }
        };

        if let VisualInput::Frames(seq) = &visual {
            remove_dir_quietly(&seq.frame_dir).await;
        }

        metrics::record_composition(mode, true);
        info!(
            path = %artifact.path.display(),
            duration = artifact.duration_secs,
            size = artifact.file_size_bytes,
            tier = %artifact.quality_tier,
            "Composed video"
        );
        Ok(artifact)
    }

    async fn encode_frames(
        &self,
        seq: &FrameSequence,
        audio: &AudioClip,
        options: &ComposeOptions,
        silent: &Path,
        partial: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        let profile = options.quality_tier.video_profile();
        let fps = seq.fps.to_string();

        // Pass 1: frames to a silent H.264 stream at the sequence rate
        let encode = FfmpegCommand::new(seq.input_pattern(), silent)
            .input_args(["-framerate", fps.as_str(), "-start_number", "0"])
            .output_args(profile.video_args())
            .output_args(["-r", fps.as_str(), "-an"]);
        let total_ms = (seq.total_duration_secs * 1000.0) as i64;
        self.runner(cancel)
            .run_with_progress(&encode, move |p| {
                debug!(
                    frame = p.frame,
                    progress = p.fraction(total_ms),
                    "Encoding frames"
                );
            })
            .await?;

        // Pass 2: mux with the audio clip
        let mut mux = FfmpegCommand::new(silent, partial)
            .add_input(&audio.local_path)
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .output_args(profile.audio_args())
            .output_arg("-shortest");
        mux = with_metadata(mux, &options.metadata).faststart();
        self.runner(cancel).run(&mux).await
    }

    async fn encode_still(
        &self,
        image: &Path,
        audio: &AudioClip,
        options: &ComposeOptions,
        partial: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        let profile = options.quality_tier.video_profile();
        let fps = profile.fps.to_string();

        let mut cmd = FfmpegCommand::new(image, partial)
            .input_args(["-loop", "1", "-framerate", fps.as_str()])
            .add_input(&audio.local_path)
            .map("0:v:0")
            .map("1:a:0")
            .video_filter(scale_pad_filter(profile.width, profile.height))
            .output_args(profile.video_args())
            .output_args(["-tune", "stillimage"])
            .output_args(profile.audio_args())
            .output_duration(audio.clip_duration_secs)
            .output_arg("-shortest");
        cmd = with_metadata(cmd, &options.metadata).faststart();
        self.runner(cancel).run(&cmd).await
    }

    /// Move a finished file into place, describe it and attach a thumbnail.
    async fn finish(
        &self,
        partial: &Path,
        final_path: &Path,
        tier: QualityTier,
        metadata: &MetadataTags,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        move_file(partial, final_path).await?;
        let mut artifact = self.describe(final_path, tier, metadata, cancel).await?;

        if self.config.thumbnails && artifact.width > 0 {
            match thumbnail::generate_thumbnail(
                final_path,
                artifact.duration_secs,
                self.config.encode_timeout,
                cancel,
            )
            .await
            {
                Ok(thumb) => artifact.thumbnail_path = Some(thumb),
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => warn!(error = %e, "Thumbnail generation failed, continuing without"),
            }
        }
        Ok(artifact)
    }

    /// Build a [`VideoArtifact`] from what ffprobe reports for `path`.
    pub async fn describe(
        &self,
        path: &Path,
        tier: QualityTier,
        metadata: &MetadataTags,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        let info = probe_media(path, self.config.probe_timeout, cancel).await?;
        let video = info.video.ok_or_else(|| {
            MediaError::InvalidMedia(format!("{} has no video stream", path.display()))
        })?;
        let profile = tier.video_profile();

        Ok(VideoArtifact {
            path: path.to_path_buf(),
            duration_secs: info.duration,
            width: video.width,
            height: video.height,
            fps: video.fps,
            video_codec: video.codec,
            audio_codec: info.audio.map(|a| a.codec),
            file_size_bytes: info.size,
            quality_tier: tier,
            video_bitrate_kbps: profile.video_bitrate_kbps,
            audio_bitrate_kbps: profile.audio_bitrate_kbps,
            metadata: metadata.clone(),
            thumbnail_path: None,
        })
    }

    /// Re-encode `input` into `format`, writing a new artifact next to it.
    pub async fn convert(
        &self,
        input: &VideoArtifact,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        ensure_exists(&input.path)?;
        let stem = input
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());
        let output = self.output_path(
            stem.map(|s| format!("{}_{}", s, format.extension())).as_deref(),
            format.extension(),
        );
        let tmp = output.with_extension(format!("part.{}", format.extension()));

        let mut cmd = FfmpegCommand::new(&input.path, &tmp).output_args(format.encode_args(input.quality_tier));
        if format.has_audio() {
            cmd = with_metadata(cmd, &input.metadata);
        }

        let result = async {
            self.runner(cancel).run(&cmd).await?;
            tokio::fs::rename(&tmp, &output).await?;
            self.describe_any(&output, input, format, cancel).await
        }
        .await;

        metrics::record_composition("convert", result.is_ok());
        if result.is_err() {
            remove_quietly(&tmp).await;
            remove_quietly(&output).await;
        }
        result
    }

    async fn describe_any(
        &self,
        output: &Path,
        input: &VideoArtifact,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        let mut artifact = self
            .describe(output, input.quality_tier, &input.metadata, cancel)
            .await?;
        if !format.has_audio() {
            artifact.audio_codec = None;
            artifact.audio_bitrate_kbps = 0;
        }
        Ok(artifact)
    }

    /// Burn `text` into the video, writing a new artifact.
    pub async fn overlay_text(
        &self,
        input: &VideoArtifact,
        text: &str,
        options: &TextOverlayOptions,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        ensure_exists(&input.path)?;
        if text.trim().is_empty() {
            return Err(MediaError::invalid_input("overlay text is empty"));
        }

        let stem = input
            .path
            .file_stem()
            .map(|s| format!("{}_text", s.to_string_lossy()));
        let output = self.output_path(stem.as_deref(), "mp4");
        let tmp = output.with_extension("part.mp4");
        let profile = input.quality_tier.video_profile();

        let cmd = with_metadata(
            FfmpegCommand::new(&input.path, &tmp)
                .video_filter(drawtext_filter(text, options))
                .output_args(profile.video_args())
                .audio_codec("copy"),
            &input.metadata,
        )
        .faststart();

        let result = async {
            self.runner(cancel).run(&cmd).await?;
            tokio::fs::rename(&tmp, &output).await?;
            self.describe(&output, input.quality_tier, &input.metadata, cancel)
                .await
        }
        .await;

        metrics::record_composition("overlay", result.is_ok());
        if result.is_err() {
            remove_quietly(&tmp).await;
            remove_quietly(&output).await;
        }
        result
    }

    /// Rewrite container tags without re-encoding. Replaces the file in place.
    pub async fn apply_metadata(
        &self,
        input: &VideoArtifact,
        tags: &MetadataTags,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        ensure_exists(&input.path)?;
        let tmp = input.path.with_extension("tagged.mp4");

        let cmd = with_metadata(
            FfmpegCommand::new(&input.path, &tmp)
                .map("0")
                .output_args(["-c", "copy"]),
            tags,
        );

        self.replace_in_place(&cmd, &tmp, &input.path, cancel).await?;

        let mut artifact = input.clone();
        artifact.metadata = tags.clone();
        if let Ok(meta) = tokio::fs::metadata(&artifact.path).await {
            artifact.file_size_bytes = meta.len();
        }
        Ok(artifact)
    }

    /// Quality optimisation pass: re-encode one preset slower with
    /// `+faststart`, replacing the artifact in place.
    pub async fn optimize(
        &self,
        input: &VideoArtifact,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        ensure_exists(&input.path)?;
        let profile = input.quality_tier.video_profile();
        let slower = profile.slower_preset();
        let tmp = input.path.with_extension("optimized.mp4");

        let mut video_args = profile.video_args();
        if let Some(pos) = video_args.iter().position(|a| a == "-preset") {
            video_args[pos + 1] = slower.to_string();
        }

        let cmd = with_metadata(
            FfmpegCommand::new(&input.path, &tmp)
                .output_args(video_args)
                .audio_codec("copy"),
            &input.metadata,
        )
        .faststart();

        self.replace_in_place(&cmd, &tmp, &input.path, cancel).await?;
        info!(path = %input.path.display(), preset = slower, "Optimisation pass complete");

        let mut artifact = self
            .describe(&input.path, input.quality_tier, &input.metadata, cancel)
            .await?;
        artifact.thumbnail_path = input.thumbnail_path.clone();
        Ok(artifact)
    }

    /// Write a poster JPEG for `input`.
    pub async fn generate_thumbnail(
        &self,
        input: &VideoArtifact,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        let path = thumbnail::generate_thumbnail(
            &input.path,
            input.duration_secs,
            self.config.encode_timeout,
            cancel,
        )
        .await?;
        let mut artifact = input.clone();
        artifact.thumbnail_path = Some(path);
        Ok(artifact)
    }

    /// Static-colour video with a silent audio track, used as a placeholder.
    #[allow(clippy::too_many_arguments)]
    pub async fn compose_synthetic(
        &self,
        duration_secs: f64,
        width: u32,
        height: u32,
        color: &str,
        options: &ComposeOptions,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<VideoArtifact> {
        if duration_secs.is_nan() || duration_secs <= 0.0 || width == 0 || height == 0 {
            return Err(MediaError::invalid_input(format!(
                "synthetic video needs positive duration and size, got {}s {}x{}",
                duration_secs, width, height
            )));
        }
        tokio::fs::create_dir_all(work_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let profile = options.quality_tier.video_profile();
        let audio_profile = options.quality_tier.audio_profile();
        let partial = unique_path(work_dir, "synthetic", "mp4");

        let cmd = with_metadata(
            FfmpegCommand::lavfi(
                format!(
                    "color=c={}:s={}x{}:r={}",
                    color,
                    width & !1,
                    height & !1,
                    profile.fps
                ),
                &partial,
            )
            .add_lavfi(format!(
                "anullsrc=r={}:cl=stereo",
                audio_profile.sample_rate
            ))
            .output_args(profile.video_args())
            .output_args(profile.audio_args())
            .output_duration(duration_secs)
            .output_arg("-shortest"),
            &options.metadata,
        )
        .faststart();

        if let Err(e) = self.runner(cancel).run(&cmd).await {
            remove_quietly(&partial).await;
            metrics::record_composition("synthetic", false);
            return Err(e);
        }

        let final_path = self.output_path(options.output_name.as_deref(), "mp4");
        let result = async {
            move_file(&partial, &final_path).await?;
            self.describe(&final_path, options.quality_tier, &options.metadata, cancel)
                .await
        }
        .await;
        if result.is_err() {
            remove_quietly(&partial).await;
            remove_quietly(&final_path).await;
        }
        metrics::record_composition("synthetic", result.is_ok());
        result
    }

    async fn replace_in_place(
        &self,
        cmd: &FfmpegCommand,
        tmp: &Path,
        target: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        if let Err(e) = self.runner(cancel).run(cmd).await {
            remove_quietly(tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(tmp, target).await {
            remove_quietly(tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn with_metadata(mut cmd: FfmpegCommand, tags: &MetadataTags) -> FfmpegCommand {
    for (key, value) in tags.pairs() {
        cmd = cmd.metadata(key, value);
    }
    cmd
}

fn ensure_exists(path: &Path) -> MediaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

/// Both inputs must be on disk before any subprocess starts.
fn validate_inputs(visual: &VisualInput, audio: &AudioClip) -> MediaResult<()> {
    ensure_exists(&audio.local_path)?;
    match visual {
        VisualInput::Frames(seq) => {
            if seq.frame_count == 0 {
                return Err(MediaError::invalid_input("frame sequence is empty"));
            }
            ensure_exists(&seq.frame_dir)?;
            let first = seq
                .first_frame()
                .ok_or_else(|| MediaError::invalid_input("frame sequence has no paths"))?;
            ensure_exists(first)
        }
        VisualInput::Still(image) => ensure_exists(image),
    }
}
