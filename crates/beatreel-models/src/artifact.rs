//! Pipeline results: real videos or explicitly tagged placeholders.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

use crate::media::VideoArtifact;
use crate::plan::WorkflowStep;

/// What a synthetic artifact stands in with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placeholder {
    /// A real, playable static-colour video with a silent track.
    StaticColorVideo {
        path: PathBuf,
        duration_secs: f64,
        width: u32,
        height: u32,
        color: String,
    },
    /// Nothing on disk; only the descriptive fields.
    MetadataOnly {
        artist: Option<String>,
        title: Option<String>,
        duration_secs: f64,
    },
}

/// Non-authoritative result substituted after a pipeline failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticArtifact {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<WorkflowStep>,
    pub placeholder: Placeholder,
}

impl SyntheticArtifact {
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.placeholder {
            Placeholder::StaticColorVideo { path, .. } => Some(path),
            Placeholder::MetadataOnly { .. } => None,
        }
    }
}

/// Final result of a run.
///
/// Serialises as the inner record plus a `"mock"` flag, so consumers can
/// branch on one field while the Rust side keeps the two shapes apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Real(VideoArtifact),
    Synthetic(SyntheticArtifact),
}

impl Artifact {
    pub fn is_mock(&self) -> bool {
        matches!(self, Artifact::Synthetic(_))
    }

    pub fn as_real(&self) -> Option<&VideoArtifact> {
        match self {
            Artifact::Real(v) => Some(v),
            Artifact::Synthetic(_) => None,
        }
    }

    pub fn as_synthetic(&self) -> Option<&SyntheticArtifact> {
        match self {
            Artifact::Real(_) => None,
            Artifact::Synthetic(s) => Some(s),
        }
    }

    /// Path of the playable file, if there is one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Artifact::Real(v) => Some(&v.path),
            Artifact::Synthetic(s) => s.path(),
        }
    }
}

#[derive(Serialize)]
struct Flagged<'a, T> {
    mock: bool,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for Artifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Artifact::Real(inner) => Flagged { mock: false, inner }.serialize(serializer),
            Artifact::Synthetic(inner) => Flagged { mock: true, inner }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Artifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        let mock = value
            .as_object_mut()
            .and_then(|obj| obj.remove("mock"))
            .and_then(|v| v.as_bool())
            .ok_or_else(|| D::Error::missing_field("mock"))?;

        if mock {
            serde_json::from_value(value)
                .map(Artifact::Synthetic)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Artifact::Real)
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MetadataTags;
    use crate::quality::QualityTier;

    fn sample_video() -> VideoArtifact {
        VideoArtifact {
            path: PathBuf::from("/out/a.mp4"),
            duration_secs: 30.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
            video_codec: "h264".to_string(),
            audio_codec: Some("aac".to_string()),
            file_size_bytes: 1024,
            quality_tier: QualityTier::High,
            video_bitrate_kbps: 3000,
            audio_bitrate_kbps: 192,
            metadata: MetadataTags::new("A", "B"),
            thumbnail_path: None,
        }
    }

    #[test]
    fn test_real_serializes_with_mock_false() {
        let artifact = Artifact::Real(sample_video());
        let v = serde_json::to_value(&artifact).unwrap();
        assert_eq!(v["mock"], false);
        assert_eq!(v["width"], 1920);

        let back: Artifact = serde_json::from_value(v).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_synthetic_serializes_with_mock_true() {
        let artifact = Artifact::Synthetic(SyntheticArtifact {
            reason: "download timed out".to_string(),
            failed_step: Some(WorkflowStep::AcquireRemoteAudio),
            placeholder: Placeholder::MetadataOnly {
                artist: Some("A".to_string()),
                title: None,
                duration_secs: 30.0,
            },
        });
        assert!(artifact.is_mock());
        assert!(artifact.path().is_none());

        let v = serde_json::to_value(&artifact).unwrap();
        assert_eq!(v["mock"], true);
        assert_eq!(v["failed_step"], "acquire_remote_audio");
        assert_eq!(v["placeholder"]["kind"], "metadata_only");

        let back: Artifact = serde_json::from_value(v).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_missing_mock_flag_is_rejected() {
        let v = serde_json::json!({"reason": "x"});
        assert!(serde_json::from_value::<Artifact>(v).is_err());
    }
}
