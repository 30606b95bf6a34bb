//! Conversions between layout types and the `vello_cpu` rasteriser.
//!
//! `image` buffers hold straight RGBA, vello pixmaps hold premultiplied RGBA.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use vello_cpu::kurbo::Affine;
use vello_cpu::peniko::color::PremulRgba8;
use vello_cpu::Pixmap;

use crate::animation::ElementState;
use crate::error::{RenderError, RenderResult};
use crate::layout::Color;

pub(crate) fn peniko_color(color: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Validate a pixel dimension for vello's 16-bit canvas.
pub(crate) fn dimension(value: u32, what: &str) -> RenderResult<u16> {
    u16::try_from(value)
        .map_err(|_| RenderError::invalid_options(format!("{what} {value} exceeds {}", u16::MAX)))
}

fn premultiply(c: u8, a: u8) -> u8 {
    ((u16::from(c) * u16::from(a) + 127) / 255) as u8
}

fn unpremultiply(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    ((u16::from(c) * 255 + u16::from(a) / 2) / u16::from(a)).min(255) as u8
}

pub(crate) fn pixmap_from_rgba(image: &RgbaImage) -> RenderResult<Pixmap> {
    let width = dimension(image.width(), "image width")?;
    let height = dimension(image.height(), "image height")?;
    let mut translucent = false;
    let mut pixels = Vec::with_capacity(image.width() as usize * image.height() as usize);
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        translucent |= a != 255;
        pixels.push(PremulRgba8 {
            r: premultiply(r, a),
            g: premultiply(g, a),
            b: premultiply(b, a),
            a,
        });
    }
    Ok(Pixmap::from_parts_with_opacity(pixels, width, height, translucent))
}

pub(crate) fn rgba_from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(u32::from(pixmap.width()), u32::from(pixmap.height()));
    for (dst, src) in out
        .pixels_mut()
        .zip(pixmap.data_as_u8_slice().chunks_exact(4))
    {
        let a = src[3];
        *dst = Rgba([
            unpremultiply(src[0], a),
            unpremultiply(src[1], a),
            unpremultiply(src[2], a),
            a,
        ]);
    }
    out
}

/// Image paint over a decoded buffer, plus its pixel size.
pub(crate) fn image_paint(image: &RgbaImage) -> RenderResult<(vello_cpu::Image, f64, f64)> {
    let pixmap = pixmap_from_rgba(image)?;
    let (w, h) = (f64::from(pixmap.width()), f64::from(pixmap.height()));
    let paint = vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    };
    Ok((paint, w, h))
}

/// CSS-style linear gradient: 0 degrees points up, 90 right, 180 down.
pub(crate) fn gradient(from: Color, to: Color, angle_deg: f64, width: u32, height: u32) -> RgbaImage {
    let rad = angle_deg.to_radians();
    let (dir_x, dir_y) = (rad.sin(), -rad.cos());
    let (w, h) = (f64::from(width), f64::from(height));
    let half_span = ((w * dir_x).abs() + (h * dir_y).abs()) / 2.0;

    let mut img = RgbaImage::new(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let px_x = f64::from(x) + 0.5 - w / 2.0;
        let px_y = f64::from(y) + 0.5 - h / 2.0;
        let t = if half_span <= 0.0 {
            0.0
        } else {
            (px_x * dir_x + px_y * dir_y) / (2.0 * half_span) + 0.5
        };
        *px = Rgba(from.lerp(to, t).to_array());
    }
    img
}

/// Map a `width`x`height` box in local space (origin top-left) to the page,
/// placing it at `(x, y)` and applying `state` about the box centre.
pub(crate) fn element_transform(
    (x, y, width, height): (f64, f64, f64, f64),
    state: &ElementState,
) -> Affine {
    let cx = x + width / 2.0 + state.dx;
    let cy = y + height / 2.0 + state.dy;
    Affine::translate((cx, cy))
        * Affine::rotate(state.rotation_deg.to_radians())
        * Affine::scale(state.scale)
        * Affine::translate((-width / 2.0, -height / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vello_cpu::kurbo::Point;

    fn close(a: Point, b: (f64, f64)) -> bool {
        (a.x - b.0).abs() < 1e-9 && (a.y - b.1).abs() < 1e-9
    }

    #[test]
    fn test_vertical_gradient_runs_top_to_bottom() {
        let img = gradient(Color::BLACK, Color::WHITE, 180.0, 4, 100);
        let top = img.get_pixel(0, 0)[0];
        let bottom = img.get_pixel(0, 99)[0];
        assert!(top < 10, "top {top}");
        assert!(bottom > 245, "bottom {bottom}");
        assert_eq!(img.get_pixel(0, 50), img.get_pixel(3, 50));
    }

    #[test]
    fn test_translucent_pixels_survive_premultiplication() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 0, 128]));
        let pixmap = pixmap_from_rgba(&img).unwrap();
        assert_eq!(pixmap.data_as_u8_slice()[..4], [100, 50, 0, 128]);

        let back = rgba_from_pixmap(&pixmap);
        let px = back.get_pixel(1, 1);
        assert!((i16::from(px[0]) - 200).abs() <= 1, "{px:?}");
        assert!((i16::from(px[1]) - 100).abs() <= 1, "{px:?}");
        assert_eq!(px[3], 128);
    }

    #[test]
    fn test_oversized_dimension_rejected() {
        assert_eq!(dimension(1920, "width").unwrap(), 1920);
        assert!(dimension(70_000, "width").is_err());
    }

    #[test]
    fn test_transform_translation_and_scale() {
        let state = ElementState {
            dx: 50.0,
            ..ElementState::IDENTITY
        };
        let t = element_transform((0.0, 0.0, 10.0, 10.0), &state);
        assert!(close(t * Point::new(0.0, 0.0), (50.0, 0.0)));

        let state = ElementState {
            scale: 2.0,
            ..ElementState::IDENTITY
        };
        let t = element_transform((40.0, 40.0, 20.0, 20.0), &state);
        assert!(close(t * Point::new(0.0, 0.0), (30.0, 30.0)));
        assert!(close(t * Point::new(10.0, 10.0), (50.0, 50.0)));
    }

    #[test]
    fn test_transform_rotates_about_centre() {
        let state = ElementState {
            rotation_deg: 90.0,
            ..ElementState::IDENTITY
        };
        let t = element_transform((40.0, 40.0, 20.0, 20.0), &state);
        // Top-left corner swings to the top-right
        let p = t * Point::new(0.0, 0.0);
        assert!((p.x - 60.0).abs() < 1e-9 && (p.y - 40.0).abs() < 1e-9, "{p:?}");
        assert!(close(t * Point::new(10.0, 10.0), (50.0, 50.0)));
    }
}
