//! Progressive waveform bars drawn over the rendered page.

use vello_cpu::kurbo::{Affine, Rect};
use vello_cpu::RenderContext;

use crate::layout::{Color, LayoutDocument};
use crate::paint::peniko_color;

/// Element id whose box, when present, hosts the waveform.
pub const WAVEFORM_ELEMENT_ID: &str = "waveform";

/// Minimum bar height as a fraction of the region, so silence stays visible.
const MIN_BAR_FRACTION: f64 = 0.04;

/// Precomputed amplitudes plus where and how to draw them.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformOverlay {
    amplitudes: Vec<f32>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
    /// Gap between bars as a fraction of the bar slot
    pub gap_fraction: f64,
}

impl WaveformOverlay {
    /// Place the overlay over the layout's `#waveform` element, or along the
    /// bottom of the page when there is none.
    pub fn for_layout(amplitudes: Vec<f32>, layout: &LayoutDocument) -> Self {
        let (x, y, width, height) = match layout.element_by_id(WAVEFORM_ELEMENT_ID) {
            Some(el) => (el.x, el.y, el.width, el.height),
            None => {
                let (w, h) = (f64::from(layout.width), f64::from(layout.height));
                (w * 0.05, h * 0.78, w * 0.9, h * 0.14)
            }
        };
        Self {
            amplitudes: amplitudes
                .into_iter()
                .map(|a| if a.is_finite() { a.clamp(0.0, 1.0) } else { 0.0 })
                .collect(),
            x,
            y,
            width,
            height,
            color: Color::rgba(255, 255, 255, 220),
            gap_fraction: 0.3,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn bars(&self) -> usize {
        self.amplitudes.len()
    }

    /// Bars revealed at `progress` in `[0, 1]`: `ceil(progress * bars)`.
    pub fn visible_bars(&self, progress: f64) -> usize {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        ((progress * self.bars() as f64).ceil() as usize).min(self.bars())
    }

    /// Draw the revealed bars, centred vertically in the region.
    pub fn draw(&self, ctx: &mut RenderContext, progress: f64) {
        let visible = self.visible_bars(progress);
        if visible == 0 || self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let slot = self.width / self.bars() as f64;
        let bar_width = (slot * (1.0 - self.gap_fraction.clamp(0.0, 0.9))).max(1.0);
        let mid = self.y + self.height / 2.0;
        ctx.set_transform(Affine::IDENTITY);
        ctx.set_paint_transform(Affine::IDENTITY);
        ctx.set_paint(peniko_color(self.color));
        for (i, amplitude) in self.amplitudes.iter().take(visible).enumerate() {
            let bar_height = self.height * f64::from(*amplitude).max(MIN_BAR_FRACTION);
            let left = self.x + i as f64 * slot;
            let top = mid - bar_height / 2.0;
            ctx.fill_rect(&Rect::new(left, top, left + bar_width, top + bar_height));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Background, LayoutElement};
    use crate::paint::rgba_from_pixmap;

    fn overlay(bars: usize) -> WaveformOverlay {
        let layout = LayoutDocument::new(200, 100, Background::default());
        WaveformOverlay::for_layout(vec![1.0; bars], &layout)
    }

    #[test]
    fn test_visible_bars_ceil() {
        let o = overlay(10);
        assert_eq!(o.visible_bars(0.0), 0);
        assert_eq!(o.visible_bars(0.01), 1);
        assert_eq!(o.visible_bars(0.5), 5);
        assert_eq!(o.visible_bars(0.51), 6);
        assert_eq!(o.visible_bars(1.0), 10);
        assert_eq!(o.visible_bars(3.0), 10);
        assert_eq!(o.visible_bars(f64::NAN), 0);
        assert_eq!(overlay(0).visible_bars(1.0), 0);
    }

    #[test]
    fn test_uses_waveform_element_box() {
        let layout = LayoutDocument::new(200, 100, Background::default()).with_element(
            LayoutElement::rect(10.0, 20.0, 30.0, 40.0, Color::BLACK).with_id("waveform"),
        );
        let o = WaveformOverlay::for_layout(vec![2.0, f32::NAN], &layout);
        assert_eq!((o.x, o.y, o.width, o.height), (10.0, 20.0, 30.0, 40.0));
        assert_eq!(o.bars(), 2);
    }

    #[test]
    fn test_draw_reveals_left_to_right() {
        let o = overlay(4).with_color(Color::WHITE);
        let mut ctx = RenderContext::new(200, 100);
        ctx.set_paint(peniko_color(Color::BLACK));
        ctx.fill_rect(&Rect::new(0.0, 0.0, 200.0, 100.0));
        o.draw(&mut ctx, 0.5);
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(200, 100);
        ctx.render_to_pixmap(&mut pixmap);
        let canvas = rgba_from_pixmap(&pixmap);
        let mid_y = (o.y + o.height / 2.0) as u32;
        let slot = o.width / 4.0;
        let first = (o.x + slot * 0.2) as u32;
        let last = (o.x + slot * 3.2) as u32;
        assert_eq!(canvas.get_pixel(first, mid_y)[0], 255);
        assert_eq!(canvas.get_pixel(last, mid_y)[0], 0);
    }
}
