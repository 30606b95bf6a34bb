//! Label fonts and text shaping.
//!
//! Labels are shaped with `parley` against a single registered font file and
//! drawn as glyph runs through `vello_cpu`. Shaping happens once per loaded
//! layout; frames only replay the positioned glyphs.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::layout::Color;
use crate::paint::peniko_color;

/// Well-known locations of a sans-serif face, tried in order by
/// [`LabelFont::discover`].
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Fraction of the label box width available to a text line.
const TEXT_WIDTH_FRACTION: f32 = 0.92;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct TextBrush {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<Color> for TextBrush {
    fn from(c: Color) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// A font file used for every label on a surface.
#[derive(Clone)]
pub struct LabelFont {
    origin: PathBuf,
    family: String,
    source: parley::fontique::Blob<u8>,
    data: vello_cpu::peniko::FontData,
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelFont")
            .field("origin", &self.origin)
            .field("family", &self.family)
            .finish()
    }
}

impl LabelFont {
    /// Read and register a TrueType/OpenType file.
    pub fn open(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_bytes(bytes, path)
    }

    pub fn from_bytes(bytes: Vec<u8>, origin: impl Into<PathBuf>) -> RenderResult<Self> {
        let origin = origin.into();
        let source = parley::fontique::Blob::from(bytes.clone());
        let mut font_ctx = parley::FontContext::default();
        let family = register(&mut font_ctx, &source).map_err(|message| RenderError::Font {
            path: origin.clone(),
            message,
        })?;
        let data = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);
        Ok(Self {
            origin,
            family,
            source,
            data,
        })
    }

    /// First usable font among [`FONT_CANDIDATES`].
    pub fn discover() -> Option<Self> {
        FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| match Self::open(p) {
                Ok(font) => Some(font),
                Err(e) => {
                    debug!(path = %p.display(), error = %e, "Skipping font candidate");
                    None
                }
            })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub(crate) fn shaper(&self) -> RenderResult<TextShaper> {
        let mut font_ctx = parley::FontContext::default();
        let family = register(&mut font_ctx, &self.source).map_err(|message| RenderError::Font {
            path: self.origin.clone(),
            message,
        })?;
        Ok(TextShaper {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family,
            data: self.data.clone(),
        })
    }
}

fn register(
    font_ctx: &mut parley::FontContext,
    source: &parley::fontique::Blob<u8>,
) -> Result<String, String> {
    let families = font_ctx.collection.register_fonts(source.clone(), None);
    let family_id = families
        .first()
        .map(|(id, _)| *id)
        .ok_or_else(|| "no font families in file".to_string())?;
    font_ctx
        .collection
        .family_name(family_id)
        .map(str::to_string)
        .ok_or_else(|| "font family has no name".to_string())
}

/// Shaping contexts bound to one [`LabelFont`].
pub(crate) struct TextShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    family: String,
    data: vello_cpu::peniko::FontData,
}

impl TextShaper {
    /// Shape `text`, wrapping lines to fit a box `box_width` wide.
    pub(crate) fn shape(
        &mut self,
        text: &str,
        font_size_px: f32,
        color: Color,
        box_width: f64,
    ) -> ShapedText {
        let max_width = (box_width as f32 * TEXT_WIDTH_FRACTION).max(1.0);
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(font_size_px.max(1.0)));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrush::from(color)));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(Some(max_width));
        layout.align(
            Some(max_width),
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );

        let mut runs = Vec::new();
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                runs.push(GlyphRun {
                    font_size: run.run().font_size(),
                    color: Color::rgba(brush.r, brush.g, brush.b, brush.a),
                    glyphs: run
                        .glyphs()
                        .map(|g| vello_cpu::Glyph {
                            id: g.id,
                            x: g.x,
                            y: g.y,
                        })
                        .collect(),
                });
            }
        }

        ShapedText {
            font: self.data.clone(),
            runs,
            width: f64::from(layout.width()),
            height: f64::from(layout.height()),
        }
    }
}

struct GlyphRun {
    font_size: f32,
    color: Color,
    glyphs: Vec<vello_cpu::Glyph>,
}

/// Positioned glyphs for one label, relative to the text block's top-left.
pub(crate) struct ShapedText {
    font: vello_cpu::peniko::FontData,
    runs: Vec<GlyphRun>,
    pub width: f64,
    pub height: f64,
}

impl ShapedText {
    pub(crate) fn glyph_count(&self) -> usize {
        self.runs.iter().map(|r| r.glyphs.len()).sum()
    }

    /// Fill the glyphs under the context's current transform.
    pub(crate) fn draw(&self, ctx: &mut vello_cpu::RenderContext) {
        for run in &self.runs {
            ctx.set_paint(peniko_color(run.color));
            ctx.glyph_run(&self.font)
                .font_size(run.font_size)
                .fill_glyphs(run.glyphs.iter().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_file_is_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabelFont::open(dir.path().join("missing.ttf")).unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
        assert_eq!(err.kind(), beatreel_models::ErrorKind::Render);
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = LabelFont::from_bytes(b"not a font".to_vec(), "inline").unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
    }

    #[test]
    fn test_shaping_wraps_to_box() {
        let Some(font) = LabelFont::discover() else {
            return;
        };
        assert!(!font.family().is_empty());
        let mut shaper = font.shaper().unwrap();

        let one_line = shaper.shape("Beat", 20.0, Color::WHITE, 400.0);
        assert_eq!(one_line.glyph_count(), 4);
        assert!(one_line.width > 0.0 && one_line.width <= 400.0);

        let wrapped = shaper.shape("Beat reel beat reel beat reel", 20.0, Color::WHITE, 80.0);
        assert!(wrapped.height > one_line.height * 1.5, "{} vs {}", wrapped.height, one_line.height);
    }
}
