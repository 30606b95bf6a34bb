//! Declarative animation directives attached to a layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Easing curve mapping normalized progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    #[default]
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
}

impl Ease {
    /// Apply to progress `t`; input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// Edge an element slides in from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlideFrom {
    #[default]
    Left,
    Right,
    Top,
    Bottom,
}

/// Fade from `from_opacity` up to fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FadeInParams {
    #[serde(default)]
    pub from_opacity: f64,
    #[serde(default)]
    pub ease: Ease,
}

impl Default for FadeInParams {
    fn default() -> Self {
        Self {
            from_opacity: 0.0,
            ease: Ease::Linear,
        }
    }
}

/// Translate from `distance_px` away back to the resting position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideInParams {
    #[serde(default)]
    pub from: SlideFrom,
    pub distance_px: f64,
    #[serde(default = "default_slide_ease")]
    pub ease: Ease,
}

fn default_slide_ease() -> Ease {
    Ease::OutCubic
}

/// Oscillating scale: `1 + sin(time * speed) * amplitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PulseParams {
    /// Angular speed in radians per second
    pub speed: f64,
    /// Peak scale deviation (0.05 = ±5%)
    pub amplitude: f64,
}

/// Constant-speed rotation about the element centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RotateParams {
    pub degrees_per_second: f64,
}

/// The closed set of supported animations, each with typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationKind {
    FadeIn(FadeInParams),
    SlideIn(SlideInParams),
    Pulse(PulseParams),
    Rotate(RotateParams),
}

impl AnimationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnimationKind::FadeIn(_) => "fade_in",
            AnimationKind::SlideIn(_) => "slide_in",
            AnimationKind::Pulse(_) => "pulse",
            AnimationKind::Rotate(_) => "rotate",
        }
    }
}

/// One animation bound to the layout elements matching `target`.
///
/// `duration_secs` is the ramp length for fades and slides. For pulse and
/// rotate a zero duration means "for the rest of the video".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnimationDirective {
    /// `#id`, `.class` or `*`
    pub target: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub delay_secs: f64,
    #[serde(flatten)]
    pub kind: AnimationKind,
}

impl AnimationDirective {
    pub fn new(target: impl Into<String>, duration_secs: f64, kind: AnimationKind) -> Self {
        Self {
            target: target.into(),
            duration_secs,
            delay_secs: 0.0,
            kind,
        }
    }

    pub fn with_delay(mut self, delay_secs: f64) -> Self {
        self.delay_secs = delay_secs;
        self
    }

    pub fn fade_in(target: impl Into<String>, duration_secs: f64) -> Self {
        Self::new(target, duration_secs, AnimationKind::FadeIn(FadeInParams::default()))
    }

    pub fn slide_in(
        target: impl Into<String>,
        duration_secs: f64,
        from: SlideFrom,
        distance_px: f64,
    ) -> Self {
        Self::new(
            target,
            duration_secs,
            AnimationKind::SlideIn(SlideInParams {
                from,
                distance_px,
                ease: default_slide_ease(),
            }),
        )
    }

    pub fn pulse(target: impl Into<String>, speed: f64, amplitude: f64) -> Self {
        Self::new(target, 0.0, AnimationKind::Pulse(PulseParams { speed, amplitude }))
    }

    pub fn rotate(target: impl Into<String>, degrees_per_second: f64) -> Self {
        Self::new(
            target,
            0.0,
            AnimationKind::Rotate(RotateParams { degrees_per_second }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_endpoints() {
        for ease in [
            Ease::Linear,
            Ease::InQuad,
            Ease::OutQuad,
            Ease::InOutQuad,
            Ease::InCubic,
            Ease::OutCubic,
            Ease::InOutCubic,
        ] {
            assert!(ease.apply(0.0).abs() < 1e-12);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-12);
            assert!((ease.apply(2.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_directive_json_shape() {
        let d = AnimationDirective::pulse("#wave", 4.0, 0.05);
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["kind"], "pulse");
        assert_eq!(v["target"], "#wave");
        assert_eq!(v["speed"], 4.0);

        let parsed: AnimationDirective = serde_json::from_value(serde_json::json!({
            "target": ".title",
            "duration_secs": 1.5,
            "kind": "slide_in",
            "from": "bottom",
            "distance_px": 120.0
        }))
        .unwrap();
        match parsed.kind {
            AnimationKind::SlideIn(p) => {
                assert_eq!(p.from, SlideFrom::Bottom);
                assert_eq!(p.ease, Ease::OutCubic);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
