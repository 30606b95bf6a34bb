//! Media entities passed between pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::quality::QualityTier;

/// Extension used for captured frames.
pub const FRAME_EXTENSION: &str = "png";
/// Zero-padding width of the frame index in file names.
pub const FRAME_INDEX_WIDTH: usize = 6;
/// ffmpeg input pattern matching [`frame_file_name`].
pub const FRAME_PATTERN: &str = "frame_%06d.png";

/// Tolerance when comparing float timings.
const TIME_EPSILON: f64 = 1e-6;

/// File name for frame `index`: `frame_000042.png`.
pub fn frame_file_name(index: u64) -> String {
    format!(
        "frame_{:0width$}.{}",
        index,
        FRAME_EXTENSION,
        width = FRAME_INDEX_WIDTH
    )
}

/// Number of frames needed to cover `duration_secs` at `fps`.
///
/// `ceil(duration * fps)`, with a small epsilon so products that are integral
/// up to float error (e.g. `30.0 * 29.97 / 29.97`) are not bumped by one.
pub fn frame_count_for(duration_secs: f64, fps: u32) -> u64 {
    if duration_secs <= 0.0 || fps == 0 {
        return 0;
    }
    let exact = duration_secs * fps as f64;
    (exact - TIME_EPSILON).ceil().max(0.0) as u64
}

/// Errors raised when constructing media entities with broken invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaModelError {
    #[error("Clip window [{start}, {start}+{duration}] exceeds source duration {original}")]
    ClipWindowOutOfRange {
        start: f64,
        duration: f64,
        original: f64,
    },

    #[error("Frame sequence has {actual} frames, expected {expected}")]
    FrameCountMismatch { expected: u64, actual: u64 },
}

/// Where a clip's audio came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioOrigin {
    Remote { url: String },
    Uploaded { path: PathBuf },
}

/// A clipped, faded and re-encoded audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioClip {
    pub origin: AudioOrigin,
    pub local_path: PathBuf,
    pub original_duration_secs: f64,
    pub clip_start_secs: f64,
    pub clip_duration_secs: f64,
    pub fade_in_secs: f64,
    /// Effective fade-out length after clamping to the clip
    pub fade_out_secs: f64,
    pub fade_out_start_secs: f64,
    pub sample_rate: u32,
    pub bitrate_kbps: u32,
    pub codec: String,
}

impl AudioClip {
    /// Check `0 <= clip_start <= original - clip_duration`.
    pub fn check_window(
        original_duration_secs: f64,
        clip_start_secs: f64,
        clip_duration_secs: f64,
    ) -> Result<(), MediaModelError> {
        let max_start = original_duration_secs - clip_duration_secs;
        if clip_start_secs < -TIME_EPSILON
            || clip_duration_secs <= 0.0
            || clip_start_secs > max_start + TIME_EPSILON
        {
            return Err(MediaModelError::ClipWindowOutOfRange {
                start: clip_start_secs,
                duration: clip_duration_secs,
                original: original_duration_secs,
            });
        }
        Ok(())
    }

    /// End of the clip window within the source.
    pub fn clip_end_secs(&self) -> f64 {
        self.clip_start_secs + self.clip_duration_secs
    }
}

/// Ordered still frames on disk, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSequence {
    pub frame_dir: PathBuf,
    pub frame_paths: Vec<PathBuf>,
    pub frame_count: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub total_duration_secs: f64,
}

impl FrameSequence {
    /// Build a sequence, checking the frame count invariant.
    pub fn new(
        frame_dir: impl Into<PathBuf>,
        frame_paths: Vec<PathBuf>,
        fps: u32,
        width: u32,
        height: u32,
        total_duration_secs: f64,
    ) -> Result<Self, MediaModelError> {
        let expected = frame_count_for(total_duration_secs, fps);
        let actual = frame_paths.len() as u64;
        if expected != actual {
            return Err(MediaModelError::FrameCountMismatch { expected, actual });
        }
        Ok(Self {
            frame_dir: frame_dir.into(),
            frame_paths,
            frame_count: actual,
            fps,
            width,
            height,
            total_duration_secs,
        })
    }

    /// Path pattern handed to ffmpeg's image2 demuxer.
    pub fn input_pattern(&self) -> PathBuf {
        self.frame_dir.join(FRAME_PATTERN)
    }

    /// Duration of one frame in seconds.
    pub fn frame_interval_secs(&self) -> f64 {
        if self.fps == 0 {
            0.0
        } else {
            1.0 / self.fps as f64
        }
    }

    pub fn first_frame(&self) -> Option<&Path> {
        self.frame_paths.first().map(PathBuf::as_path)
    }
}

/// Container-level tags embedded in the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MetadataTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetadataTags {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: Some(artist.into()),
            title: Some(title.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// `(key, value)` pairs for tags that are set.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let Some(v) = &self.artist {
            out.push(("artist", v.as_str()));
        }
        if let Some(v) = &self.title {
            out.push(("title", v.as_str()));
        }
        if let Some(v) = &self.description {
            out.push(("description", v.as_str()));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.artist.is_none() && self.title.is_none() && self.description.is_none()
    }
}

/// A finished, playable video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub file_size_bytes: u64,
    pub quality_tier: QualityTier,
    /// Declared video bitrate ceiling
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    #[serde(default)]
    pub metadata: MetadataTags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_names_sort_in_time_order() {
        let mut names: Vec<String> = [10u64, 2, 100, 1, 999_999, 0]
            .iter()
            .map(|i| frame_file_name(*i))
            .collect();
        names.sort();
        assert_eq!(names[0], "frame_000000.png");
        assert_eq!(names[1], "frame_000001.png");
        assert_eq!(names[2], "frame_000002.png");
        assert_eq!(names[3], "frame_000010.png");
        assert_eq!(names[4], "frame_000100.png");
        assert_eq!(names[5], "frame_999999.png");
    }

    #[test]
    fn test_frame_count_matches_round_for_integral_products() {
        for fps in [1u32, 24, 25, 30, 60] {
            for d in [0.5f64, 1.0, 2.5, 30.0, 59.0] {
                let exact = d * fps as f64;
                if (exact - exact.round()).abs() < 1e-9 {
                    assert_eq!(frame_count_for(d, fps), exact.round() as u64);
                }
            }
        }
    }

    #[test]
    fn test_frame_count_ceil_for_fractional_products() {
        // 1.01s at 10fps needs 11 frames to cover the tail.
        assert_eq!(frame_count_for(1.01, 10), 11);
        assert_eq!(frame_count_for(0.0, 30), 0);
        assert_eq!(frame_count_for(1.0, 0), 0);
    }

    #[test]
    fn test_check_window() {
        assert!(AudioClip::check_window(100.0, 0.0, 30.0).is_ok());
        assert!(AudioClip::check_window(100.0, 70.0, 30.0).is_ok());
        assert!(AudioClip::check_window(100.0, 70.5, 30.0).is_err());
        assert!(AudioClip::check_window(100.0, -1.0, 30.0).is_err());
        assert!(AudioClip::check_window(10.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_frame_sequence_invariant() {
        let paths: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(frame_file_name(i))).collect();
        let seq = FrameSequence::new("/tmp/f", paths.clone(), 10, 64, 64, 2.0).unwrap();
        assert_eq!(seq.frame_count, 20);
        assert_eq!(seq.input_pattern(), PathBuf::from("/tmp/f/frame_%06d.png"));

        let err = FrameSequence::new("/tmp/f", paths, 10, 64, 64, 3.0).unwrap_err();
        assert_eq!(
            err,
            MediaModelError::FrameCountMismatch {
                expected: 30,
                actual: 20
            }
        );
    }

    #[test]
    fn test_metadata_pairs() {
        let tags = MetadataTags::new("Artist", "Song").with_description("desc");
        assert_eq!(
            tags.pairs(),
            vec![("artist", "Artist"), ("title", "Song"), ("description", "desc")]
        );
        assert!(MetadataTags::default().is_empty());
    }
}
