//! Rendering surfaces.
//!
//! A surface holds one loaded layout at a fixed pixel size. The renderer
//! drives it frame by frame: apply element states, wait for it to settle,
//! capture a PNG. [`RasterSurface`] is the built-in implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use vello_cpu::kurbo::{Affine, Rect};
use vello_cpu::RenderContext;

use crate::animation::ElementState;
use crate::error::{RenderError, RenderResult};
use crate::layout::{Background, ElementKind, LayoutDocument};
use crate::paint;
use crate::text::{LabelFont, ShapedText};
use crate::waveform::WaveformOverlay;

/// A drawable target that can load a layout and capture frames.
#[async_trait]
pub trait RenderSurface: Send {
    /// Pixel size of captured frames.
    fn size(&self) -> (u32, u32);

    /// Load `layout` (and an optional waveform overlay), starting any asset loads.
    async fn load(
        &mut self,
        layout: &LayoutDocument,
        waveform: Option<WaveformOverlay>,
    ) -> RenderResult<()>;

    /// Set per-element states and overall progress for the next capture.
    fn apply(&mut self, states: &[ElementState], progress: f64) -> RenderResult<()>;

    /// Wait until pending work (asset loads) finishes, bounded by `timeout`.
    async fn settle(&mut self, timeout: Duration) -> RenderResult<()>;

    /// Write the current frame as a PNG at `path`.
    async fn capture(&mut self, path: &Path) -> RenderResult<()>;

    /// Drop the loaded layout so the surface can be pooled.
    fn reset(&mut self);
}

/// Decoded asset as a vello image paint with its source pixel size.
#[derive(Clone)]
struct ImageAsset {
    paint: vello_cpu::Image,
    width: f64,
    height: f64,
}

type AssetLoad = JoinHandle<(PathBuf, Result<ImageAsset, String>)>;

enum Backdrop {
    Fill(vello_cpu::peniko::Color),
    /// Drawn scaled to cover the page.
    Image(ImageAsset),
}

enum ElementPaint {
    Fill(vello_cpu::peniko::Color),
    Image(ImageAsset),
    Label {
        plate: vello_cpu::peniko::Color,
        text: Option<ShapedText>,
    },
}

struct SceneElement {
    rect: (f64, f64, f64, f64),
    opacity: f64,
    paint: ElementPaint,
}

/// Everything about a loaded layout that does not change between frames.
struct Scene {
    width: u16,
    height: u16,
    backdrop: Backdrop,
    elements: Vec<SceneElement>,
}

impl Scene {
    fn build(
        layout: &LayoutDocument,
        assets: &HashMap<PathBuf, ImageAsset>,
        font: Option<&LabelFont>,
    ) -> RenderResult<Self> {
        let asset = |path: &PathBuf| {
            assets.get(path).cloned().ok_or_else(|| RenderError::AssetLoad {
                path: path.clone(),
                message: "asset not loaded".to_string(),
            })
        };

        let backdrop = match &layout.background {
            Background::Solid { color } => Backdrop::Fill(paint::peniko_color(*color)),
            Background::LinearGradient {
                from,
                to,
                angle_deg,
            } => {
                let pixels = paint::gradient(*from, *to, *angle_deg, layout.width, layout.height);
                let (paint, width, height) = paint::image_paint(&pixels)?;
                Backdrop::Image(ImageAsset {
                    paint,
                    width,
                    height,
                })
            }
            Background::Image { path } => Backdrop::Image(asset(path)?),
        };

        let mut shaper = match font {
            Some(font) => Some(font.shaper()?),
            None => None,
        };
        let mut elements = Vec::with_capacity(layout.elements.len());
        for element in &layout.elements {
            let paint = match &element.kind {
                ElementKind::Rect { color } => ElementPaint::Fill(paint::peniko_color(*color)),
                ElementKind::Image { path } => ElementPaint::Image(asset(path)?),
                ElementKind::Label {
                    text,
                    plate,
                    text_color,
                    font_size_px,
                } => ElementPaint::Label {
                    plate: paint::peniko_color(*plate),
                    text: shaper.as_mut().filter(|_| !text.trim().is_empty()).map(|s| {
                        s.shape(text, *font_size_px as f32, *text_color, element.width)
                    }),
                },
            };
            elements.push(SceneElement {
                rect: (element.x, element.y, element.width, element.height),
                opacity: element.opacity,
                paint,
            });
        }

        Ok(Self {
            width: paint::dimension(layout.width, "layout width")?,
            height: paint::dimension(layout.height, "layout height")?,
            backdrop,
            elements,
        })
    }

    /// Paint one frame. CPU-bound; callers run it off the async threads.
    fn paint(
        &self,
        states: &[ElementState],
        waveform: Option<&WaveformOverlay>,
        progress: f64,
    ) -> RgbaImage {
        let mut ctx = RenderContext::new(self.width, self.height);
        let page = Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height));

        ctx.set_paint_transform(Affine::IDENTITY);
        match &self.backdrop {
            Backdrop::Fill(color) => {
                ctx.set_transform(Affine::IDENTITY);
                ctx.set_paint(*color);
                ctx.fill_rect(&page);
            }
            Backdrop::Image(image) => {
                ctx.set_transform(Affine::scale_non_uniform(
                    page.width() / image.width,
                    page.height() / image.height,
                ));
                ctx.set_paint(image.paint.clone());
                ctx.fill_rect(&Rect::new(0.0, 0.0, image.width, image.height));
            }
        }

        for (index, element) in self.elements.iter().enumerate() {
            let state = states.get(index).copied().unwrap_or(ElementState::IDENTITY);
            element.paint(&mut ctx, &state);
        }

        if let Some(waveform) = waveform {
            waveform.draw(&mut ctx, progress);
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        ctx.render_to_pixmap(&mut pixmap);
        paint::rgba_from_pixmap(&pixmap)
    }
}

impl SceneElement {
    fn paint(&self, ctx: &mut RenderContext, state: &ElementState) {
        let (_, _, width, height) = self.rect;
        let opacity = (self.opacity * state.opacity).clamp(0.0, 1.0);
        if opacity <= 0.0 || width <= 0.0 || height <= 0.0 || state.scale.abs() < 1e-6 {
            return;
        }
        let transform = paint::element_transform(self.rect, state);
        let layered = opacity < 1.0;
        if layered {
            ctx.push_opacity_layer(opacity as f32);
        }

        ctx.set_paint_transform(Affine::IDENTITY);
        match &self.paint {
            ElementPaint::Fill(color) => {
                ctx.set_transform(transform);
                ctx.set_paint(*color);
                ctx.fill_rect(&Rect::new(0.0, 0.0, width, height));
            }
            ElementPaint::Image(image) => {
                ctx.set_transform(
                    transform
                        * Affine::scale_non_uniform(width / image.width, height / image.height),
                );
                ctx.set_paint(image.paint.clone());
                ctx.fill_rect(&Rect::new(0.0, 0.0, image.width, image.height));
            }
            ElementPaint::Label { plate, text } => {
                ctx.set_transform(transform);
                ctx.set_paint(*plate);
                ctx.fill_rect(&Rect::new(0.0, 0.0, width, height));
                if let Some(text) = text {
                    let offset = ((width - text.width) / 2.0, (height - text.height) / 2.0);
                    ctx.set_transform(transform * Affine::translate(offset));
                    text.draw(ctx);
                }
            }
        }

        if layered {
            ctx.pop_layer();
        }
    }
}

/// CPU surface rasterising layouts with `vello_cpu`.
///
/// Decoded assets are cached for the surface's lifetime, so a pooled surface
/// reused for the same job's layout skips decoding. Labels are shaped once
/// per load; without a font they render as bare plates.
pub struct RasterSurface {
    width: u32,
    height: u32,
    font: Option<LabelFont>,
    layout: Option<Arc<LayoutDocument>>,
    waveform: Option<Arc<WaveformOverlay>>,
    states: Vec<ElementState>,
    progress: f64,
    pending: Vec<AssetLoad>,
    assets: HashMap<PathBuf, ImageAsset>,
    scene: Option<Arc<Scene>>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::surface_init(format!(
                "surface size {width}x{height} is empty"
            )));
        }
        paint::dimension(width, "surface width")
            .and_then(|_| paint::dimension(height, "surface height"))
            .map_err(|e| RenderError::surface_init(e.to_string()))?;
        Ok(Self {
            width,
            height,
            font: None,
            layout: None,
            waveform: None,
            states: Vec::new(),
            progress: 0.0,
            pending: Vec::new(),
            assets: HashMap::new(),
            scene: None,
        })
    }

    /// Font used to draw label text.
    pub fn with_font(mut self, font: Option<LabelFont>) -> Self {
        self.font = font;
        self
    }

    /// Number of decoded assets held by this surface.
    pub fn cached_assets(&self) -> usize {
        self.assets.len()
    }

    fn scene_inputs(
        &self,
    ) -> RenderResult<(Arc<LayoutDocument>, HashMap<PathBuf, ImageAsset>, Option<LabelFont>)> {
        if !self.pending.is_empty() {
            return Err(RenderError::internal("capture before surface settled"));
        }
        let layout = self.layout.clone().ok_or(RenderError::NotLoaded)?;
        Ok((layout, self.assets.clone(), self.font.clone()))
    }

    fn ensure_scene(&mut self) -> RenderResult<Arc<Scene>> {
        if let Some(scene) = &self.scene {
            return Ok(scene.clone());
        }
        let (layout, assets, font) = self.scene_inputs()?;
        let scene = Arc::new(Scene::build(&layout, &assets, font.as_ref())?);
        self.scene = Some(scene.clone());
        Ok(scene)
    }

    /// Compose the current frame in memory on the calling thread.
    pub fn compose(&mut self) -> RenderResult<RgbaImage> {
        let scene = self.ensure_scene()?;
        Ok(scene.paint(&self.states, self.waveform.as_deref(), self.progress))
    }
}

#[async_trait]
impl RenderSurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn load(
        &mut self,
        layout: &LayoutDocument,
        waveform: Option<WaveformOverlay>,
    ) -> RenderResult<()> {
        if (layout.width, layout.height) != (self.width, self.height) {
            return Err(RenderError::invalid_options(format!(
                "layout is {}x{} but surface is {}x{}",
                layout.width, layout.height, self.width, self.height
            )));
        }
        self.reset();

        for path in layout.asset_paths() {
            if self.assets.contains_key(&path) {
                continue;
            }
            trace!(path = %path.display(), "Loading asset");
            self.pending.push(tokio::task::spawn_blocking(move || {
                let decoded = image::open(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|img| {
                        paint::image_paint(&img.to_rgba8()).map_err(|e| e.to_string())
                    })
                    .map(|(paint, width, height)| ImageAsset {
                        paint,
                        width,
                        height,
                    });
                (path, decoded)
            }));
        }

        let has_text = layout
            .elements
            .iter()
            .any(|el| matches!(&el.kind, ElementKind::Label { text, .. } if !text.trim().is_empty()));
        if has_text && self.font.is_none() {
            warn!("No label font configured; labels render without text");
        }

        self.states = vec![ElementState::IDENTITY; layout.elements.len()];
        self.layout = Some(Arc::new(layout.clone()));
        self.waveform = waveform.map(Arc::new);
        Ok(())
    }

    fn apply(&mut self, states: &[ElementState], progress: f64) -> RenderResult<()> {
        let layout = self.layout.as_ref().ok_or(RenderError::NotLoaded)?;
        if states.len() != layout.elements.len() {
            return Err(RenderError::internal(format!(
                "{} states for {} elements",
                states.len(),
                layout.elements.len()
            )));
        }
        self.states.clear();
        self.states.extend_from_slice(states);
        self.progress = progress;
        Ok(())
    }

    async fn settle(&mut self, timeout: Duration) -> RenderResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        let joined = tokio::time::timeout(timeout, async {
            let mut loaded = Vec::with_capacity(pending.len());
            for handle in pending {
                loaded.push(handle.await);
            }
            loaded
        })
        .await
        .map_err(|_| RenderError::SettleTimeout(timeout))?;

        for result in joined {
            let (path, decoded) =
                result.map_err(|e| RenderError::internal(format!("asset task failed: {e}")))?;
            let asset = decoded.map_err(|message| RenderError::AssetLoad {
                path: path.clone(),
                message,
            })?;
            self.assets.insert(path, asset);
        }
        debug!(assets = count, "Surface settled");
        Ok(())
    }

    async fn capture(&mut self, path: &Path) -> RenderResult<()> {
        let scene = match &self.scene {
            Some(scene) => scene.clone(),
            None => {
                let (layout, assets, font) = self.scene_inputs()?;
                let built = tokio::task::spawn_blocking(move || {
                    Scene::build(&layout, &assets, font.as_ref())
                })
                .await
                .map_err(|e| RenderError::internal(format!("scene task failed: {e}")))??;
                let scene = Arc::new(built);
                self.scene = Some(scene.clone());
                scene
            }
        };

        let states = self.states.clone();
        let waveform = self.waveform.clone();
        let progress = self.progress;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            scene
                .paint(&states, waveform.as_deref(), progress)
                .save_with_format(&target, image::ImageFormat::Png)
        })
        .await
        .map_err(|e| RenderError::internal(format!("capture task failed: {e}")))?
        .map_err(|e| RenderError::capture(path, e))
    }

    fn reset(&mut self) {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        self.layout = None;
        self.waveform = None;
        self.states.clear();
        self.progress = 0.0;
        self.scene = None;
    }
}
