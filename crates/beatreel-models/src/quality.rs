//! Quality tiers and the encoding profiles they fix.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Pixel format used for every H.264 output (broad player compatibility)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
pub const THUMBNAIL_TIMESTAMP_SECS: f64 = 1.0;

/// Named output class selecting bitrate, sample rate and encoder effort.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    pub const ALL: &'static [QualityTier] = &[
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    /// Audio re-encode profile for clips produced at this tier.
    pub fn audio_profile(&self) -> AudioProfile {
        let (bitrate_kbps, sample_rate) = match self {
            QualityTier::Low => (96, 22_050),
            QualityTier::Medium => (128, 44_100),
            QualityTier::High => (192, 44_100),
            QualityTier::Ultra => (320, 48_000),
        };
        AudioProfile {
            codec: DEFAULT_AUDIO_CODEC.to_string(),
            bitrate_kbps,
            sample_rate,
            channels: 2,
        }
    }

    /// Video encode profile for outputs produced at this tier.
    pub fn video_profile(&self) -> VideoProfile {
        let (video_bitrate_kbps, audio_bitrate_kbps, preset, crf, width, height, fps) = match self {
            QualityTier::Low => (800, 96, "veryfast", 28, 640, 360, 24),
            QualityTier::Medium => (1_500, 128, "fast", 23, 1280, 720, 30),
            QualityTier::High => (3_000, 192, "medium", 20, 1920, 1080, 30),
            QualityTier::Ultra => (6_000, 320, "slow", 18, 1920, 1080, 30),
        };
        VideoProfile {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            video_bitrate_kbps,
            audio_bitrate_kbps,
            preset: preset.to_string(),
            crf,
            width,
            height,
            fps,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = QualityTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "ultra" => Ok(QualityTier::Ultra),
            _ => Err(QualityTierParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown quality tier: {0}")]
pub struct QualityTierParseError(String);

/// Audio encoding parameters fixed by a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AudioProfile {
    pub codec: String,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub channels: u8,
}

impl AudioProfile {
    /// Bitrate formatted for ffmpeg (`128k`).
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }

    /// Container extension for the encoded clip.
    pub fn extension(&self) -> &'static str {
        match self.codec.as_str() {
            "libmp3lame" | "mp3" => "mp3",
            "libopus" | "opus" => "opus",
            _ => "m4a",
        }
    }
}

/// Video encoding parameters fixed by a tier.
///
/// Encodes are capped-CRF: `crf` drives quality while `video_bitrate_kbps` is
/// the declared `-maxrate` ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoProfile {
    pub codec: String,
    pub audio_codec: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub preset: String,
    pub crf: u8,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoProfile {
    /// Convert to FFmpeg output arguments for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-maxrate".to_string(),
            format!("{}k", self.video_bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", self.video_bitrate_kbps * 2),
            "-pix_fmt".to_string(),
            DEFAULT_PIXEL_FORMAT.to_string(),
        ]
    }

    /// Convert to FFmpeg output arguments for the audio stream.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps),
        ]
    }

    /// The preset one step slower than this one, used by the optimisation pass.
    pub fn slower_preset(&self) -> &'static str {
        match self.preset.as_str() {
            "ultrafast" => "superfast",
            "superfast" => "veryfast",
            "veryfast" => "faster",
            "faster" => "fast",
            "fast" => "medium",
            "medium" => "slow",
            "slow" => "slower",
            _ => "veryslow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ultra_bitrates_dominate_low() {
        let low = QualityTier::Low;
        let ultra = QualityTier::Ultra;
        assert!(ultra.video_profile().video_bitrate_kbps >= low.video_profile().video_bitrate_kbps);
        assert!(ultra.video_profile().audio_bitrate_kbps >= low.video_profile().audio_bitrate_kbps);
        assert!(ultra.audio_profile().bitrate_kbps >= low.audio_profile().bitrate_kbps);
        assert!(ultra.audio_profile().sample_rate >= low.audio_profile().sample_rate);
        assert!(ultra.video_profile().crf <= low.video_profile().crf);
    }

    #[test]
    fn test_tiers_are_monotonic() {
        for pair in QualityTier::ALL.windows(2) {
            let (a, b) = (pair[0].video_profile(), pair[1].video_profile());
            assert!(b.video_bitrate_kbps >= a.video_bitrate_kbps);
            assert!(b.crf <= a.crf);
        }
    }

    #[test]
    fn test_video_args() {
        let args = QualityTier::High.video_profile().video_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-maxrate".to_string()));
        assert!(args.contains(&"3000k".to_string()));
        assert!(args.contains(&"6000k".to_string()));
        assert!(args.contains(&"20".to_string()));
    }

    #[test]
    fn test_parse_tier() {
        assert_eq!("ULTRA".parse::<QualityTier>().unwrap(), QualityTier::Ultra);
        assert!("extreme".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_slower_preset() {
        assert_eq!(QualityTier::Low.video_profile().slower_preset(), "faster");
        assert_eq!(QualityTier::Ultra.video_profile().slower_preset(), "slower");
    }

    #[test]
    fn test_dimensions_are_even() {
        for tier in QualityTier::ALL {
            let p = tier.video_profile();
            assert_eq!(p.width % 2, 0);
            assert_eq!(p.height % 2, 0);
        }
    }
}
