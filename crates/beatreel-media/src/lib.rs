//! FFmpeg/ffprobe wrapper for the beatreel pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Timeouts and cancellation via `CancellationToken`
//! - Streaming HTTP download of remote audio
//! - Audio acquisition (clip window, fade envelope, re-encode)
//! - Waveform extraction
//! - Video composition, conversion, text overlay, metadata and optimisation
//! - Thumbnails and age-based filesystem sweeps

pub mod audio;
pub mod command;
pub mod compose;
pub mod download;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod waveform;

pub use audio::{AcquireOptions, AcquirerTimeouts, AudioAcquirer};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{ComposeOptions, ComposerConfig, OutputFormat, VideoComposer, VisualInput};
pub use download::Downloader;
pub use error::{MediaError, MediaResult};
pub use filters::{FadeEnvelope, TextOverlayOptions, TextPosition};
pub use fs_utils::{move_file, sweep_older_than, SweepStats};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use waveform::extract_waveform;
