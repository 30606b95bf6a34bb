//! Shared data models for the beatreel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Media requests and their validation
//! - Quality tiers and the encoding profiles they fix
//! - Audio clips, frame sequences and video artifacts
//! - Animation directives
//! - Workflow plans, step statuses and execution reports
//! - Real and synthetic (mock) artifacts
//! - Artist catalog records

pub mod artifact;
pub mod catalog;
pub mod directive;
pub mod error_kind;
pub mod job;
pub mod media;
pub mod plan;
pub mod quality;
pub mod report;
pub mod request;

// Re-export common types
pub use artifact::{Artifact, Placeholder, SyntheticArtifact};
pub use catalog::{parse_duration_label, Artist, Track};
pub use directive::{
    AnimationDirective, AnimationKind, Ease, FadeInParams, PulseParams, RotateParams, SlideFrom,
    SlideInParams,
};
pub use error_kind::ErrorKind;
pub use job::JobId;
pub use media::{
    frame_count_for, frame_file_name, AudioClip, AudioOrigin, FrameSequence, MediaModelError,
    MetadataTags, VideoArtifact, FRAME_PATTERN,
};
pub use plan::{Classification, StepFailure, StepStatus, WorkflowPlan, WorkflowStep};
pub use quality::{AudioProfile, QualityTier, VideoProfile};
pub use report::ExecutionReport;
pub use request::{ArtistSelector, AudioSource, MediaRequest, RequestError, Urgency, VisualStyle};
