//! Audio acquisition: fetch, probe, clip, fade and re-encode.

use rand::Rng;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beatreel_models::{AudioClip, AudioOrigin, QualityTier};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::download::Downloader;
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_filter, FadeEnvelope};
use crate::fs_utils::{remove_quietly, unique_path};
use crate::probe::probe_audio;

/// Lead-in skipped before a random clip start, and tail kept after it.
pub const CLIP_EDGE_MARGIN_SECS: f64 = 5.0;

/// Tolerance when checking an explicit start against the window.
const WINDOW_EPSILON: f64 = 1e-6;

/// Options for one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireOptions {
    pub duration_secs: f64,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub start_time_secs: Option<f64>,
    pub volume_gain: Option<f64>,
    pub quality_tier: QualityTier,
}

impl AcquireOptions {
    pub fn new(duration_secs: f64, quality_tier: QualityTier) -> Self {
        Self {
            duration_secs,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
            start_time_secs: None,
            volume_gain: None,
            quality_tier,
        }
    }

    pub fn with_fades(mut self, fade_in_secs: f64, fade_out_secs: f64) -> Self {
        self.fade_in_secs = fade_in_secs;
        self.fade_out_secs = fade_out_secs;
        self
    }

    pub fn with_start(mut self, start: Option<f64>) -> Self {
        self.start_time_secs = start;
        self
    }

    pub fn with_gain(mut self, gain: Option<f64>) -> Self {
        self.volume_gain = gain;
        self
    }
}

/// Subprocess bounds for the acquirer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirerTimeouts {
    pub probe: Duration,
    pub encode: Duration,
}

impl Default for AcquirerTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(30),
            encode: Duration::from_secs(300),
        }
    }
}

/// Latest start that still leaves the edge margin after the clip.
pub fn max_clip_start(original_duration_secs: f64, clip_duration_secs: f64) -> f64 {
    (original_duration_secs - clip_duration_secs - CLIP_EDGE_MARGIN_SECS).max(0.0)
}

/// Uniform start in `[min(5, maxStart), maxStart]`.
pub fn random_clip_start<R: Rng>(
    rng: &mut R,
    original_duration_secs: f64,
    clip_duration_secs: f64,
) -> f64 {
    let max_start = max_clip_start(original_duration_secs, clip_duration_secs);
    let min_start = CLIP_EDGE_MARGIN_SECS.min(max_start);
    if max_start - min_start <= f64::EPSILON {
        return min_start;
    }
    rng.random_range(min_start..=max_start)
}

/// Resolve `(clip_start, clip_duration)` for a source of `original_duration_secs`.
///
/// A source shorter than the requested duration yields the whole source from
/// 0. An explicit start outside `[0, original - duration]` is rejected.
pub fn resolve_clip_window<R: Rng>(
    rng: &mut R,
    original_duration_secs: f64,
    requested_duration_secs: f64,
    explicit_start: Option<f64>,
) -> MediaResult<(f64, f64)> {
    if original_duration_secs.is_nan() || original_duration_secs <= 0.0 {
        return Err(MediaError::InvalidMedia(format!(
            "source duration {} is not positive",
            original_duration_secs
        )));
    }
    if requested_duration_secs.is_nan() || requested_duration_secs <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "clip duration {} is not positive",
            requested_duration_secs
        )));
    }

    let clip_duration = requested_duration_secs.min(original_duration_secs);
    let max_start = original_duration_secs - clip_duration;

    match explicit_start {
        Some(start) => {
            if !start.is_finite() || start < 0.0 || start > max_start + WINDOW_EPSILON {
                return Err(MediaError::invalid_input(format!(
                    "start {:.3}s is outside [0, {:.3}] for a {:.3}s clip of a {:.3}s source",
                    start, max_start, clip_duration, original_duration_secs
                )));
            }
            Ok((start.min(max_start), clip_duration))
        }
        None if clip_duration < requested_duration_secs => Ok((0.0, clip_duration)),
        None => Ok((
            random_clip_start(rng, original_duration_secs, clip_duration),
            clip_duration,
        )),
    }
}

/// Acquires audio clips for the pipeline.
///
/// Holds no per-job state; the caller supplies the work directory.
#[derive(Debug, Clone)]
pub struct AudioAcquirer {
    downloader: Downloader,
    timeouts: AcquirerTimeouts,
}

impl AudioAcquirer {
    pub fn new(downloader: Downloader, timeouts: AcquirerTimeouts) -> Self {
        Self {
            downloader,
            timeouts,
        }
    }

    /// Produce a clipped, faded, re-encoded clip in `work_dir`.
    ///
    /// The downloaded intermediate is always removed; a partial output is
    /// removed on failure. An uploaded source is never touched.
    pub async fn acquire(
        &self,
        origin: &AudioOrigin,
        options: &AcquireOptions,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<AudioClip> {
        tokio::fs::create_dir_all(work_dir).await?;

        let (source_path, downloaded) = match origin {
            AudioOrigin::Remote { url } => {
                let dest = unique_path(work_dir, "source", "bin");
                self.downloader.download(url, &dest, cancel).await?;
                (dest, true)
            }
            AudioOrigin::Uploaded { path } => {
                if !path.exists() {
                    return Err(MediaError::FileNotFound(path.clone()));
                }
                (path.clone(), false)
            }
        };

        let output_path = unique_path(
            work_dir,
            "audio",
            options.quality_tier.audio_profile().extension(),
        );

        let result = self
            .process(origin, &source_path, &output_path, options, cancel)
            .await;

        if downloaded {
            remove_quietly(&source_path).await;
        }
        if result.is_err() {
            remove_quietly(&output_path).await;
        }
        result
    }

    async fn process(
        &self,
        origin: &AudioOrigin,
        source_path: &Path,
        output_path: &Path,
        options: &AcquireOptions,
        cancel: &CancellationToken,
    ) -> MediaResult<AudioClip> {
        let (original_duration, stream) =
            probe_audio(source_path, self.timeouts.probe, cancel).await?;
        debug!(
            path = %source_path.display(),
            duration = original_duration,
            codec = %stream.codec,
            sample_rate = stream.sample_rate,
            "Probed source audio"
        );

        let (clip_start, clip_duration) = resolve_clip_window(
            &mut rand::rng(),
            original_duration,
            options.duration_secs,
            options.start_time_secs,
        )?;
        if clip_duration < options.duration_secs {
            warn!(
                requested = options.duration_secs,
                available = original_duration,
                "Source shorter than requested duration, using whole source"
            );
        }

        let envelope =
            FadeEnvelope::clamped(clip_duration, options.fade_in_secs, options.fade_out_secs);
        let profile = options.quality_tier.audio_profile();

        let mut cmd = FfmpegCommand::new(source_path, output_path)
            .seek(clip_start)
            .duration(clip_duration)
            .output_arg("-vn");
        if let Some(filter) = audio_filter(&envelope, options.volume_gain) {
            cmd = cmd.audio_filter(filter);
        }
        let cmd = cmd
            .audio_codec(profile.codec.clone())
            .output_args([
                "-b:a".to_string(),
                profile.bitrate_arg(),
                "-ar".to_string(),
                profile.sample_rate.to_string(),
                "-ac".to_string(),
                profile.channels.to_string(),
            ]);

        FfmpegRunner::new()
            .with_timeout(self.timeouts.encode)
            .with_cancel(cancel.clone())
            .run(&cmd)
            .await?;

        info!(
            output = %output_path.display(),
            clip_start,
            clip_duration,
            fade_out_start = envelope.fade_out_start_secs,
            "Audio clip ready"
        );

        Ok(AudioClip {
            origin: origin.clone(),
            local_path: output_path.to_path_buf(),
            original_duration_secs: original_duration,
            clip_start_secs: clip_start,
            clip_duration_secs: clip_duration,
            fade_in_secs: envelope.fade_in_secs,
            fade_out_secs: envelope.fade_out_secs,
            fade_out_start_secs: envelope.fade_out_start_secs,
            sample_rate: profile.sample_rate,
            bitrate_kbps: profile.bitrate_kbps,
            codec: profile.codec,
        })
    }
}
