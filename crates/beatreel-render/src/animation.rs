//! Frame-time evaluation of animation directives.
//!
//! Every directive kind is a pure function of time; [`evaluate`] is the single
//! place that knows how each one behaves. A [`Timeline`] binds directives to
//! the layout elements their selectors match and folds the per-directive
//! states into one [`ElementState`] per element.

use beatreel_models::{AnimationDirective, AnimationKind, SlideFrom};
use tracing::debug;

use crate::error::RenderResult;
use crate::layout::{LayoutDocument, Selector};

/// Transient visual state layered over an element's resting box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementState {
    /// Opacity multiplier in `[0, 1]`
    pub opacity: f64,
    /// Horizontal offset in pixels
    pub dx: f64,
    /// Vertical offset in pixels
    pub dy: f64,
    /// Uniform scale about the element centre
    pub scale: f64,
    /// Clockwise rotation about the element centre
    pub rotation_deg: f64,
}

impl Default for ElementState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ElementState {
    pub const IDENTITY: ElementState = ElementState {
        opacity: 1.0,
        dx: 0.0,
        dy: 0.0,
        scale: 1.0,
        rotation_deg: 0.0,
    };

    /// Layer `other` on top: opacities and scales multiply, offsets and angles add.
    pub fn combine(self, other: ElementState) -> ElementState {
        ElementState {
            opacity: (self.opacity * other.opacity).clamp(0.0, 1.0),
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
            scale: self.scale * other.scale,
            rotation_deg: self.rotation_deg + other.rotation_deg,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Ramp progress for a directive with a finite duration.
fn ramp(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).clamp(0.0, 1.0)
    }
}

/// Elapsed time for open-ended effects; a positive duration caps it.
fn running_time(elapsed: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        elapsed.min(duration)
    } else {
        elapsed
    }
}

/// State produced by `directive` at video time `t` seconds.
///
/// Before `delay_secs` elapses, fades sit at their starting opacity and
/// slides at their full offset, while pulse and rotate are at rest.
pub fn evaluate(directive: &AnimationDirective, t: f64) -> ElementState {
    let elapsed = (t - directive.delay_secs).max(0.0);
    let duration = directive.duration_secs;

    match directive.kind {
        AnimationKind::FadeIn(p) => {
            let from = p.from_opacity.clamp(0.0, 1.0);
            let eased = p.ease.apply(ramp(elapsed, duration));
            ElementState {
                opacity: from + (1.0 - from) * eased,
                ..ElementState::IDENTITY
            }
        }
        AnimationKind::SlideIn(p) => {
            let offset = p.distance_px * (1.0 - p.ease.apply(ramp(elapsed, duration)));
            let (dx, dy) = match p.from {
                SlideFrom::Left => (-offset, 0.0),
                SlideFrom::Right => (offset, 0.0),
                SlideFrom::Top => (0.0, -offset),
                SlideFrom::Bottom => (0.0, offset),
            };
            ElementState {
                dx,
                dy,
                ..ElementState::IDENTITY
            }
        }
        AnimationKind::Pulse(p) => {
            let time = running_time(elapsed, duration);
            ElementState {
                scale: 1.0 + (time * p.speed).sin() * p.amplitude,
                ..ElementState::IDENTITY
            }
        }
        AnimationKind::Rotate(p) => ElementState {
            rotation_deg: p.degrees_per_second * running_time(elapsed, duration),
            ..ElementState::IDENTITY
        },
    }
}

/// Directives bound to the element indices they target.
#[derive(Debug, Clone)]
pub struct Timeline {
    bindings: Vec<(Vec<usize>, AnimationDirective)>,
    element_count: usize,
}

impl Timeline {
    /// Resolve every directive's selector against `layout`.
    ///
    /// A malformed selector is an error; a selector that matches nothing is
    /// kept out of the timeline.
    pub fn bind(layout: &LayoutDocument, directives: &[AnimationDirective]) -> RenderResult<Self> {
        let mut bindings = Vec::with_capacity(directives.len());
        for directive in directives {
            let selector = Selector::parse(&directive.target)?;
            let targets = layout.select(&selector);
            if targets.is_empty() {
                debug!(
                    target = %directive.target,
                    kind = directive.kind.name(),
                    "Directive matches no element"
                );
                continue;
            }
            bindings.push((targets, directive.clone()));
        }
        Ok(Self {
            bindings,
            element_count: layout.elements.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// One combined state per layout element at time `t`.
    pub fn states_at(&self, t: f64) -> Vec<ElementState> {
        let mut states = vec![ElementState::IDENTITY; self.element_count];
        for (targets, directive) in &self.bindings {
            let state = evaluate(directive, t);
            for &index in targets {
                if let Some(slot) = states.get_mut(index) {
                    *slot = slot.combine(state);
                }
            }
        }
        states
    }

    /// Resting states: every element as it looks with no animation applied.
    pub fn resting(&self) -> Vec<ElementState> {
        vec![ElementState::IDENTITY; self.element_count]
    }
}
