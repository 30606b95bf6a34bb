//! Frame renderer: drives a pooled surface through a layout over time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use beatreel_models::{frame_count_for, frame_file_name, AnimationDirective, FrameSequence};

use crate::animation::Timeline;
use crate::error::{RenderError, RenderResult};
use crate::layout::LayoutDocument;
use crate::metrics;
use crate::pool::SurfacePool;
use crate::waveform::WaveformOverlay;

/// Name of the image written by [`FrameRenderer::render_still`].
pub const STILL_FILE_NAME: &str = "still.png";

/// Options for an animated render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub total_duration_secs: f64,
    /// Precomputed amplitudes in `[0, 1]`, revealed as the render progresses
    pub waveform: Option<Vec<f32>>,
}

impl RenderOptions {
    pub fn new(width: u32, height: u32, fps: u32, total_duration_secs: f64) -> Self {
        Self {
            width,
            height,
            fps,
            total_duration_secs,
            waveform: None,
        }
    }

    pub fn with_waveform(mut self, amplitudes: Vec<f32>) -> Self {
        self.waveform = Some(amplitudes);
        self
    }

    pub fn validate(&self) -> RenderResult<()> {
        validate_size(self.width, self.height)?;
        if self.fps == 0 {
            return Err(RenderError::invalid_options("fps must be positive"));
        }
        if !self.total_duration_secs.is_finite() || self.total_duration_secs <= 0.0 {
            return Err(RenderError::invalid_options(format!(
                "duration must be positive, got {}",
                self.total_duration_secs
            )));
        }
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        frame_count_for(self.total_duration_secs, self.fps)
    }
}

/// Options for a single still image.
#[derive(Debug, Clone, PartialEq)]
pub struct StillOptions {
    pub width: u32,
    pub height: u32,
    /// Drawn fully revealed
    pub waveform: Option<Vec<f32>>,
}

impl StillOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            waveform: None,
        }
    }

    pub fn with_waveform(mut self, amplitudes: Vec<f32>) -> Self {
        self.waveform = Some(amplitudes);
        self
    }
}

/// Encoders need even dimensions for 4:2:0 chroma.
fn validate_size(width: u32, height: u32) -> RenderResult<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::invalid_options(format!(
            "frame size {width}x{height} is empty"
        )));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(RenderError::invalid_options(format!(
            "frame size {width}x{height} must have even dimensions"
        )));
    }
    Ok(())
}

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Upper bound on each settle wait
    pub settle_timeout: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(5),
        }
    }
}

/// Renders layouts into frame sequences or stills using pooled surfaces.
pub struct FrameRenderer {
    pool: Arc<SurfacePool>,
    config: RendererConfig,
}

impl FrameRenderer {
    pub fn new(pool: Arc<SurfacePool>, config: RendererConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// Render `ceil(duration * fps)` frames into `out_dir` as `frame_{i:06}.png`.
    ///
    /// Frames are captured in index order; cancellation is checked before
    /// each frame. On error the frames written so far are left for the
    /// caller's scratch cleanup.
    pub async fn render_frames(
        &self,
        layout: &LayoutDocument,
        directives: &[AnimationDirective],
        options: &RenderOptions,
        out_dir: &Path,
        cancel: &CancellationToken,
    ) -> RenderResult<FrameSequence> {
        options.validate()?;
        let timeline = Timeline::bind(layout, directives)?;
        let frame_count = options.frame_count();
        let started = Instant::now();

        tokio::fs::create_dir_all(out_dir).await?;

        let result = self
            .render_loop(layout, &timeline, options, frame_count, out_dir, cancel)
            .await;
        metrics::record_render("frames", result.is_ok(), started.elapsed().as_secs_f64());

        let frame_paths = result?;
        info!(
            frames = frame_count,
            fps = options.fps,
            width = options.width,
            height = options.height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered frame sequence"
        );

        Ok(FrameSequence::new(
            out_dir,
            frame_paths,
            options.fps,
            options.width,
            options.height,
            options.total_duration_secs,
        )?)
    }

    async fn render_loop(
        &self,
        layout: &LayoutDocument,
        timeline: &Timeline,
        options: &RenderOptions,
        frame_count: u64,
        out_dir: &Path,
        cancel: &CancellationToken,
    ) -> RenderResult<Vec<PathBuf>> {
        let mut surface = self
            .pool
            .acquire(options.width, options.height, cancel)
            .await?;

        let waveform = options
            .waveform
            .clone()
            .map(|amplitudes| WaveformOverlay::for_layout(amplitudes, layout));
        surface.load(layout, waveform).await?;

        let mut frame_paths = Vec::with_capacity(frame_count as usize);
        for index in 0..frame_count {
            if cancel.is_cancelled() {
                debug!(frame = index, "Render cancelled");
                return Err(RenderError::Cancelled);
            }

            let frame_time = index as f64 / f64::from(options.fps);
            let progress = (index + 1) as f64 / frame_count as f64;
            surface.apply(&timeline.states_at(frame_time), progress)?;
            surface.settle(self.config.settle_timeout).await?;

            let path = out_dir.join(frame_file_name(index));
            surface.capture(&path).await?;
            frame_paths.push(path);
        }
        Ok(frame_paths)
    }

    /// Render the layout at rest into `out_dir/still.png`.
    pub async fn render_still(
        &self,
        layout: &LayoutDocument,
        options: &StillOptions,
        out_dir: &Path,
        cancel: &CancellationToken,
    ) -> RenderResult<PathBuf> {
        validate_size(options.width, options.height)?;
        let timeline = Timeline::bind(layout, &[])?;
        let started = Instant::now();

        tokio::fs::create_dir_all(out_dir).await?;
        let path = out_dir.join(STILL_FILE_NAME);

        let result = async {
            let mut surface = self
                .pool
                .acquire(options.width, options.height, cancel)
                .await?;
            let waveform = options
                .waveform
                .clone()
                .map(|amplitudes| WaveformOverlay::for_layout(amplitudes, layout));
            surface.load(layout, waveform).await?;
            surface.apply(&timeline.resting(), 1.0)?;
            surface.settle(self.config.settle_timeout).await?;
            surface.capture(&path).await
        }
        .await;
        metrics::record_render("still", result.is_ok(), started.elapsed().as_secs_f64());
        result?;

        debug!(path = %path.display(), "Rendered still");
        Ok(path)
    }
}
