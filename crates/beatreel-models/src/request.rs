//! Media generation requests.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::quality::QualityTier;

/// Longest clip a single request may ask for.
pub const MAX_TARGET_DURATION_SECS: f64 = 600.0;
/// Default fade envelope length on both ends.
pub const DEFAULT_FADE_SECS: f64 = 2.0;
/// Largest accepted volume multiplier.
pub const MAX_VOLUME_GAIN: f64 = 8.0;

/// Which artist the request is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtistSelector {
    /// Let the catalog pick one.
    Random,
    /// Look up by name (case-insensitive).
    Named(String),
}

impl From<String> for ArtistSelector {
    fn from(s: String) -> Self {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("random") || trimmed.is_empty() {
            ArtistSelector::Random
        } else {
            ArtistSelector::Named(trimmed.to_string())
        }
    }
}

impl From<&str> for ArtistSelector {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ArtistSelector> for String {
    fn from(a: ArtistSelector) -> Self {
        a.to_string()
    }
}

impl fmt::Display for ArtistSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtistSelector::Random => write!(f, "random"),
            ArtistSelector::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Where the audio for the request comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSource {
    /// Download a remote asset. Without an explicit URL the catalog track's
    /// source URL is used.
    Remote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A file the caller already placed on local disk.
    Uploaded { path: PathBuf },
}

impl AudioSource {
    pub fn remote() -> Self {
        AudioSource::Remote { url: None }
    }

    pub fn uploaded(path: impl Into<PathBuf>) -> Self {
        AudioSource::Uploaded { path: path.into() }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::Remote { .. })
    }
}

/// Visual layout family for the rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisualStyle {
    /// Gradient background, title card sliding in, pulsing waveform.
    #[default]
    Classic,
    /// Single still with the title card; encoded through the still-image path.
    Minimal,
    /// High-contrast palette with rotating accents.
    Neon,
    /// Classic layout over an AI-enriched background.
    Cinematic,
}

impl VisualStyle {
    pub const ALL: &'static [VisualStyle] = &[
        VisualStyle::Classic,
        VisualStyle::Minimal,
        VisualStyle::Neon,
        VisualStyle::Cinematic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualStyle::Classic => "classic",
            VisualStyle::Minimal => "minimal",
            VisualStyle::Neon => "neon",
            VisualStyle::Cinematic => "cinematic",
        }
    }

    /// Whether the plan should include the AI background enrichment step.
    pub fn requests_ai_background(&self) -> bool {
        matches!(self, VisualStyle::Cinematic)
    }

    /// Whether the composer should loop one still instead of a frame sequence.
    pub fn prefers_still(&self) -> bool {
        matches!(self, VisualStyle::Minimal)
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VisualStyle {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(VisualStyle::Classic),
            "minimal" => Ok(VisualStyle::Minimal),
            "neon" => Ok(VisualStyle::Neon),
            "cinematic" => Ok(VisualStyle::Cinematic),
            _ => Err(RequestError::UnknownStyle(s.to_string())),
        }
    }
}

/// How soon the caller needs the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Worth spending extra encode time on an optimisation pass.
    Low,
    #[default]
    Normal,
    High,
}

impl FromStr for Urgency {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            _ => Err(RequestError::UnknownUrgency(s.to_string())),
        }
    }
}

/// Errors raised while validating a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Target duration must be positive and at most {max}s, got {value}")]
    InvalidDuration { value: f64, max: f64 },

    #[error("{field} must be a non-negative number, got {value}")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("Volume gain must be within [0, {max}], got {value}")]
    InvalidGain { value: f64, max: f64 },

    #[error("Uploaded audio path is empty")]
    EmptyUploadPath,

    #[error("Invalid remote audio URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown visual style: {0}")]
    UnknownStyle(String),

    #[error("Unknown urgency: {0}")]
    UnknownUrgency(String),
}

/// A content request. Built once by the caller and never mutated by the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaRequest {
    /// Artist to feature (`"random"` lets the catalog pick)
    #[schemars(with = "String")]
    pub artist: ArtistSelector,

    /// Desired clip length in seconds
    pub target_duration_secs: f64,

    /// Visual layout family
    #[serde(default)]
    pub visual_style: VisualStyle,

    /// Audio origin
    pub audio_source: AudioSource,

    /// Fade-in length in seconds
    #[serde(default = "default_fade")]
    pub fade_in_secs: f64,

    /// Fade-out length in seconds
    #[serde(default = "default_fade")]
    pub fade_out_secs: f64,

    /// Output quality class
    #[serde(default)]
    pub quality_tier: QualityTier,

    /// Scheduling hint; low urgency adds the optimisation pass
    #[serde(default)]
    pub urgency: Urgency,

    /// Explicit clip start inside the source (random when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_secs: Option<f64>,

    /// Volume multiplier applied before the fades
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_gain: Option<f64>,
}

fn default_fade() -> f64 {
    DEFAULT_FADE_SECS
}

impl MediaRequest {
    /// Create a request with default style, remote audio and medium quality.
    pub fn new(artist: impl Into<ArtistSelector>, target_duration_secs: f64) -> Self {
        Self {
            artist: artist.into(),
            target_duration_secs,
            visual_style: VisualStyle::default(),
            audio_source: AudioSource::remote(),
            fade_in_secs: DEFAULT_FADE_SECS,
            fade_out_secs: DEFAULT_FADE_SECS,
            quality_tier: QualityTier::default(),
            urgency: Urgency::default(),
            start_time_secs: None,
            volume_gain: None,
        }
    }

    pub fn with_style(mut self, style: VisualStyle) -> Self {
        self.visual_style = style;
        self
    }

    pub fn with_audio_source(mut self, source: AudioSource) -> Self {
        self.audio_source = source;
        self
    }

    pub fn with_fades(mut self, fade_in_secs: f64, fade_out_secs: f64) -> Self {
        self.fade_in_secs = fade_in_secs;
        self.fade_out_secs = fade_out_secs;
        self
    }

    pub fn with_quality(mut self, tier: QualityTier) -> Self {
        self.quality_tier = tier;
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_start_time(mut self, secs: f64) -> Self {
        self.start_time_secs = Some(secs);
        self
    }

    pub fn with_volume_gain(mut self, gain: f64) -> Self {
        self.volume_gain = Some(gain);
        self
    }

    /// Validate the request.
    ///
    /// Fade lengths longer than the clip are accepted here; the audio stage
    /// clamps them to the clip duration.
    pub fn validate(&self) -> Result<(), RequestError> {
        let d = self.target_duration_secs;
        if !d.is_finite() || d <= 0.0 || d > MAX_TARGET_DURATION_SECS {
            return Err(RequestError::InvalidDuration {
                value: d,
                max: MAX_TARGET_DURATION_SECS,
            });
        }

        for (field, value) in [
            ("fade_in_secs", self.fade_in_secs),
            ("fade_out_secs", self.fade_out_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RequestError::NegativeValue { field, value });
            }
        }

        if let Some(start) = self.start_time_secs {
            if !start.is_finite() || start < 0.0 {
                return Err(RequestError::NegativeValue {
                    field: "start_time_secs",
                    value: start,
                });
            }
        }

        if let Some(gain) = self.volume_gain {
            if !gain.is_finite() || !(0.0..=MAX_VOLUME_GAIN).contains(&gain) {
                return Err(RequestError::InvalidGain {
                    value: gain,
                    max: MAX_VOLUME_GAIN,
                });
            }
        }

        match &self.audio_source {
            AudioSource::Uploaded { path } if path.as_os_str().is_empty() => {
                return Err(RequestError::EmptyUploadPath);
            }
            AudioSource::Remote { url: Some(url) } => {
                let parsed =
                    url::Url::parse(url).map_err(|_| RequestError::InvalidUrl(url.clone()))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(RequestError::InvalidUrl(url.clone()));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_selector_from_string() {
        assert_eq!(ArtistSelector::from("random"), ArtistSelector::Random);
        assert_eq!(ArtistSelector::from("RANDOM"), ArtistSelector::Random);
        assert_eq!(
            ArtistSelector::from(" Nina Simone "),
            ArtistSelector::Named("Nina Simone".to_string())
        );
    }

    #[test]
    fn test_request_json_roundtrip_shape() {
        let json = r#"{
            "artist": "random",
            "target_duration_secs": 30,
            "visual_style": "classic",
            "audio_source": {"kind": "remote"},
            "quality_tier": "high"
        }"#;
        let req: MediaRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.artist, ArtistSelector::Random);
        assert_eq!(req.quality_tier, QualityTier::High);
        assert_eq!(req.urgency, Urgency::Normal);
        assert!((req.fade_in_secs - DEFAULT_FADE_SECS).abs() < f64::EPSILON);
        assert!(req.validate().is_ok());

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["artist"], "random");
        assert_eq!(back["audio_source"]["kind"], "remote");
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        assert!(matches!(
            MediaRequest::new("random", 0.0).validate(),
            Err(RequestError::InvalidDuration { .. })
        ));
        assert!(MediaRequest::new("random", f64::NAN).validate().is_err());
        assert!(MediaRequest::new("random", 10_000.0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_fade() {
        let req = MediaRequest::new("random", 15.0).with_fades(-1.0, 2.0);
        assert!(matches!(
            req.validate(),
            Err(RequestError::NegativeValue { field: "fade_in_secs", .. })
        ));
    }

    #[test]
    fn test_validate_accepts_long_fade_out() {
        // Clamped later by the audio stage.
        let req = MediaRequest::new("random", 15.0).with_fades(0.0, 20.0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_upload_and_url() {
        let req = MediaRequest::new("random", 15.0).with_audio_source(AudioSource::uploaded(""));
        assert_eq!(req.validate(), Err(RequestError::EmptyUploadPath));

        let req = MediaRequest::new("random", 15.0).with_audio_source(AudioSource::Remote {
            url: Some("ftp://example.com/a.mp3".to_string()),
        });
        assert!(matches!(req.validate(), Err(RequestError::InvalidUrl(_))));

        let req = MediaRequest::new("random", 15.0).with_audio_source(AudioSource::Remote {
            url: Some("https://example.com/a.mp3".to_string()),
        });
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_gain() {
        let req = MediaRequest::new("random", 15.0).with_volume_gain(20.0);
        assert!(matches!(req.validate(), Err(RequestError::InvalidGain { .. })));
    }

    #[test]
    fn test_style_flags() {
        assert!(VisualStyle::Cinematic.requests_ai_background());
        assert!(!VisualStyle::Classic.requests_ai_background());
        assert!(VisualStyle::Minimal.prefers_still());
        assert_eq!("NEON".parse::<VisualStyle>().unwrap(), VisualStyle::Neon);
    }
}
