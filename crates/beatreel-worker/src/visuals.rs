//! Procedural backgrounds and per-style palettes.
//!
//! Backgrounds are a linear gradient with a layer of hashed noise on top.
//! The noise seed comes from the artist name, so the same artist always gets
//! the same grain.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tracing::debug;

use beatreel_models::VisualStyle;
use beatreel_render::Color;

use crate::error::{WorkerError, WorkerResult};

/// File name of the generated background inside the job's scratch directory.
pub const BACKGROUND_FILE_NAME: &str = "background.png";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Colours a style is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub gradient_from: Color,
    pub gradient_to: Color,
    /// Title card plates
    pub plate: Color,
    /// Accent shapes and the waveform
    pub accent: Color,
    pub text: Color,
}

impl Palette {
    pub fn for_style(style: VisualStyle) -> Self {
        match style {
            VisualStyle::Classic => Self {
                gradient_from: Color::rgb(0x1f, 0x2a, 0x44),
                gradient_to: Color::rgb(0x4b, 0x3a, 0x6b),
                plate: Color::rgba(0x0b, 0x0f, 0x1a, 0xb4),
                accent: Color::rgb(0xf2, 0xa6, 0x5a),
                text: Color::WHITE,
            },
            VisualStyle::Minimal => Self {
                gradient_from: Color::rgb(0xf4, 0xf1, 0xea),
                gradient_to: Color::rgb(0xe0, 0xdc, 0xd2),
                plate: Color::rgb(0x22, 0x22, 0x22),
                accent: Color::rgb(0x22, 0x22, 0x22),
                text: Color::rgb(0xf4, 0xf1, 0xea),
            },
            VisualStyle::Neon => Self {
                gradient_from: Color::rgb(0x0b, 0x02, 0x21),
                gradient_to: Color::rgb(0x2b, 0x0a, 0x3d),
                plate: Color::rgba(0x00, 0x00, 0x00, 0xc8),
                accent: Color::rgb(0xff, 0x2b, 0xd6),
                text: Color::rgb(0x39, 0xff, 0x14),
            },
            VisualStyle::Cinematic => Self {
                gradient_from: Color::rgb(0x0d, 0x0d, 0x0d),
                gradient_to: Color::rgb(0x3a, 0x2f, 0x2a),
                plate: Color::rgba(0x00, 0x00, 0x00, 0x8c),
                accent: Color::rgb(0xd9, 0xb3, 0x82),
                text: Color::WHITE,
            },
        }
    }

    /// Replace the gradient pair, keeping plate, accent and text.
    pub fn with_gradient(mut self, from: Color, to: Color) -> Self {
        self.gradient_from = from;
        self.gradient_to = to;
        self
    }
}

/// Everything needed to repaint a background deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSpec {
    pub width: u32,
    pub height: u32,
    pub from: Color,
    pub to: Color,
    /// CSS angle: 180 runs top to bottom
    pub angle_deg: f64,
    /// Peak noise offset per channel
    pub grain: u8,
    pub seed: u64,
}

impl BackgroundSpec {
    pub fn new(style: VisualStyle, palette: &Palette, width: u32, height: u32, artist: &str) -> Self {
        let (angle_deg, grain) = match style {
            VisualStyle::Classic => (160.0, 10),
            VisualStyle::Minimal => (180.0, 4),
            VisualStyle::Neon => (135.0, 14),
            VisualStyle::Cinematic => (200.0, 18),
        };
        Self {
            width,
            height,
            from: palette.gradient_from,
            to: palette.gradient_to,
            angle_deg,
            grain,
            seed: artist_seed(artist),
        }
    }

    pub fn with_colors(mut self, from: Color, to: Color) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// FNV-1a over the lowercased, trimmed name.
pub fn artist_seed(name: &str) -> u64 {
    fnv1a(FNV_OFFSET_BASIS, name.trim().to_lowercase().as_bytes())
}

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn hash_u32(seed: u64, x: u32, y: u32) -> u32 {
    let hash = fnv1a(seed ^ FNV_OFFSET_BASIS, &u64::from(x).to_le_bytes());
    let hash = fnv1a(hash, &u64::from(y).to_le_bytes());
    (hash & 0xFFFF_FFFF) as u32
}

/// Paint the background in memory.
pub fn paint_background(spec: &BackgroundSpec) -> RgbaImage {
    let (w, h) = (f64::from(spec.width), f64::from(spec.height));
    let theta = spec.angle_deg.to_radians();
    let (dx, dy) = (theta.sin(), -theta.cos());
    let half_len = ((w / 2.0) * dx.abs() + (h / 2.0) * dy.abs()).max(f64::EPSILON);
    let grain = i16::from(spec.grain);

    RgbaImage::from_fn(spec.width, spec.height, |x, y| {
        let px = f64::from(x) + 0.5 - w / 2.0;
        let py = f64::from(y) + 0.5 - h / 2.0;
        let t = 0.5 + (px * dx + py * dy) / (2.0 * half_len);
        let base = spec.from.lerp(spec.to, t);

        let offset = if grain == 0 {
            0
        } else {
            let v = (hash_u32(spec.seed, x, y) & 0xFF) as i16;
            (v - 128) * grain / 128
        };
        let shift = |c: u8| (i16::from(c) + offset).clamp(0, 255) as u8;
        image::Rgba([shift(base.r), shift(base.g), shift(base.b), 255])
    })
}

/// Paint `spec` and write it as PNG to `dir/background.png`.
pub async fn write_background(spec: &BackgroundSpec, dir: &Path) -> WorkerResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(BACKGROUND_FILE_NAME);
    let spec = spec.clone();
    let target = path.clone();

    tokio::task::spawn_blocking(move || {
        paint_background(&spec).save_with_format(&target, ImageFormat::Png)
    })
    .await
    .map_err(|e| WorkerError::internal(format!("background task failed: {}", e)))?
    .map_err(|e| WorkerError::internal(format!("cannot write background: {}", e)))?;

    debug!(path = %path.display(), "Wrote background");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(style: VisualStyle, artist: &str) -> BackgroundSpec {
        BackgroundSpec::new(style, &Palette::for_style(style), 32, 18, artist)
    }

    #[test]
    fn test_seed_ignores_case_and_padding() {
        assert_eq!(artist_seed("Nova Lights"), artist_seed("  nova lights "));
        assert_ne!(artist_seed("Nova Lights"), artist_seed("Kilo Verse"));
    }

    #[test]
    fn test_paint_is_deterministic_per_artist() {
        let a = paint_background(&spec(VisualStyle::Neon, "Nova Lights"));
        let b = paint_background(&spec(VisualStyle::Neon, "nova lights"));
        let c = paint_background(&spec(VisualStyle::Neon, "Kilo Verse"));
        assert_eq!(a.as_raw(), b.as_raw());
        assert_ne!(a.as_raw(), c.as_raw());
        assert_eq!(a.dimensions(), (32, 18));
    }

    #[test]
    fn test_gradient_direction_without_grain() {
        let mut s = spec(VisualStyle::Classic, "x").with_colors(Color::BLACK, Color::WHITE);
        s.grain = 0;
        s.angle_deg = 180.0;
        let img = paint_background(&s);
        let top = img.get_pixel(16, 0)[0];
        let bottom = img.get_pixel(16, 17)[0];
        assert!(top < 30, "top {}", top);
        assert!(bottom > 225, "bottom {}", bottom);
    }

    #[test]
    fn test_palette_override_keeps_accent() {
        let base = Palette::for_style(VisualStyle::Cinematic);
        let tinted = base.with_gradient(Color::rgb(1, 2, 3), Color::rgb(4, 5, 6));
        assert_eq!(tinted.accent, base.accent);
        assert_eq!(tinted.gradient_from, Color::rgb(1, 2, 3));
    }

    #[tokio::test]
    async fn test_write_background_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_background(&spec(VisualStyle::Minimal, "A"), dir.path())
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), BACKGROUND_FILE_NAME);
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (32, 18));
    }
}
