//! Frame Renderer: pure functions that turn text or source images into
//! panel-sized frames.
//!
//! Text is rasterized with `fontdue` onto a black canvas, then the canvas is
//! rotated to match how the panel is mounted. Increasing the scroll offset
//! moves the text left, so a marquee is just a loop over offsets.
//!
//! ## Scroll geometry
//! At offset `o` the text's pen starts at canvas column `-o`. Offset
//! `SCROLL_START_OFFSET` (-16) puts the first glyph just past the right edge;
//! the text is gone once every glyph has moved past column 0.

use crate::config::Rotations;
use crate::frame::{Rotation, RenderedFrame};
use crate::{Error, PANEL_SIZE, Result};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};

/// Pixel size text is rasterized at.
pub const TEXT_SIZE_PX: f32 = 15.0;

/// Canvas row the text baseline sits on.
const TEXT_BASELINE: i32 = 12;

/// First scroll offset of every marquee: text fully off-canvas to the right.
pub const SCROLL_START_OFFSET: i32 = -(PANEL_SIZE as i32);

/// A marquee may only end at or beyond this offset, and only on a black frame.
pub const SCROLL_MIN_END_OFFSET: i32 = PANEL_SIZE as i32 + 1;

/// Parse a TrueType/OpenType font. A bad font is a fatal configuration error.
pub fn load_font(bytes: &[u8]) -> Result<Font> {
    Font::from_bytes(bytes, FontSettings::default()).map_err(Error::Font)
}

/// Rasterize `text` in white at `scroll_offset`, then rotate the canvas.
///
/// Any offset is valid; text that lands entirely off-canvas yields a black
/// frame.
pub fn render_text(
    text: &str,
    font: &Font,
    scroll_offset: i32,
    font_size_px: f32,
    rotation: Rotation,
) -> RenderedFrame {
    let mut canvas = RgbImage::new(PANEL_SIZE, PANEL_SIZE);
    let mut pen_x = -(scroll_offset as f32);

    for ch in text.chars() {
        if pen_x >= PANEL_SIZE as f32 {
            break;
        }

        // Layout only; glyphs already past the left edge are never rasterized.
        let metrics = font.metrics(ch, font_size_px);
        let advance = metrics.advance_width;

        let left = pen_x.round() as i32 + metrics.xmin;
        if metrics.width == 0 || left + (metrics.width as i32) <= 0 {
            pen_x += advance;
            continue;
        }

        let (metrics, coverage) = font.rasterize(ch, font_size_px);

        let top = TEXT_BASELINE - metrics.ymin - metrics.height as i32;

        for (row, line) in coverage.chunks(metrics.width).enumerate() {
            let y = top + row as i32;
            if !(0..PANEL_SIZE as i32).contains(&y) {
                continue;
            }
            for (col, &alpha) in line.iter().enumerate() {
                let x = left + col as i32;
                if alpha == 0 || !(0..PANEL_SIZE as i32).contains(&x) {
                    continue;
                }
                // Overlapping glyph edges keep the brighter coverage.
                let px = canvas.get_pixel_mut(x as u32, y as u32);
                if alpha > px[0] {
                    *px = Rgb([alpha, alpha, alpha]);
                }
            }
        }

        pen_x += advance;
    }

    RenderedFrame::rotated(&canvas, rotation)
}

/// Rotate a pre-rendered full-panel image (a priority flash color).
pub fn render_solid_color(panel: &RgbImage, rotation: Rotation) -> RenderedFrame {
    RenderedFrame::rotated(panel, rotation)
}

/// Rotate the cached weather image for display.
pub fn render_ambient(image: &RgbImage, rotation: Rotation) -> RenderedFrame {
    RenderedFrame::rotated(image, rotation)
}

/// The renderer the orchestrator and ambient presenter share: a loaded font
/// plus the rotation for each kind of content.
pub struct FrameRenderer {
    font: Font,
    font_size_px: f32,
    rotations: Rotations,
}

impl FrameRenderer {
    pub fn new(font: Font, rotations: Rotations) -> Self {
        Self {
            font,
            font_size_px: TEXT_SIZE_PX,
            rotations,
        }
    }

    pub fn text(&self, text: &str, scroll_offset: i32) -> RenderedFrame {
        render_text(
            text,
            &self.font,
            scroll_offset,
            self.font_size_px,
            self.rotations.text,
        )
    }

    pub fn solid_color(&self, panel: &RgbImage) -> RenderedFrame {
        render_solid_color(panel, self.rotations.flash)
    }

    pub fn ambient(&self, image: &RgbImage) -> RenderedFrame {
        render_ambient(image, self.rotations.ambient)
    }
}

#[cfg(test)]
pub(crate) fn test_font() -> Font {
    let bytes = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/fonts/DejaVuSansMono.ttf"
    ));
    load_font(bytes).expect("bundled font parses")
}
