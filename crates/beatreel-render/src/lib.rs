//! Layout rendering for the beatreel pipeline.
//!
//! This crate provides:
//! - Layout documents with `#id` / `.class` selectors and HTML export
//! - Pure animation evaluation (fade, slide, pulse, rotate)
//! - A `RenderSurface` seam with a `vello_cpu` raster implementation
//! - Label text shaping with `parley`
//! - A bounded surface pool with scoped checkout
//! - The frame renderer and its waveform overlay

pub mod animation;
pub mod error;
pub mod layout;
pub mod metrics;
mod paint;
pub mod pool;
pub mod renderer;
pub mod surface;
pub mod text;
pub mod waveform;

pub use animation::{evaluate, ElementState, Timeline};
pub use error::{RenderError, RenderResult};
pub use layout::{Background, Color, ElementKind, LayoutDocument, LayoutElement, Selector};
pub use pool::{PooledSurface, RasterSurfaceFactory, SurfaceFactory, SurfacePool, SurfacePoolOpts, SurfacePoolStats};
pub use renderer::{FrameRenderer, RenderOptions, RendererConfig, StillOptions};
pub use surface::{RasterSurface, RenderSurface};
pub use text::LabelFont;
pub use waveform::WaveformOverlay;
