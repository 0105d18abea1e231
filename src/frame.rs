//! The 16x16 frame value type, rotation, and blank-frame detection.
//!
//! ## Why a newtype
//! `RgbImage` can be any size. Wrapping it guarantees every frame that
//! reaches a sink is exactly `PANEL_SIZE` square, so sinks never bounds-check.

use crate::{Color, PANEL_SIZE};
use image::imageops::{self, FilterType};
use image::{GenericImageView, Pixel, RgbImage};

/// Clockwise rotation applied to a frame before it reaches the panel.
///
/// The panel is mounted sideways, and different content is authored in
/// different orientations, so each content type carries its own rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn apply(self, img: &RgbImage) -> RgbImage {
        match self {
            Rotation::None => img.clone(),
            Rotation::Cw90 => imageops::rotate90(img),
            Rotation::Cw180 => imageops::rotate180(img),
            Rotation::Cw270 => imageops::rotate270(img),
        }
    }
}

/// A full panel of RGB pixels, ready for a device sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFrame(RgbImage);

impl RenderedFrame {
    /// An all-black frame.
    pub fn blank() -> Self {
        Self(RgbImage::new(PANEL_SIZE, PANEL_SIZE))
    }

    /// Wrap an image, resizing it to the panel if it is not already panel-sized.
    pub fn from_image(img: RgbImage) -> Self {
        if img.dimensions() == (PANEL_SIZE, PANEL_SIZE) {
            Self(img)
        } else {
            Self(imageops::resize(
                &img,
                PANEL_SIZE,
                PANEL_SIZE,
                FilterType::Lanczos3,
            ))
        }
    }

    /// Build a frame from `img` rotated by `rotation`.
    pub fn rotated(img: &RgbImage, rotation: Rotation) -> Self {
        Self::from_image(rotation.apply(img))
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.0
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from(*self.0.get_pixel(x, y))
    }

    /// Iterate `(x, y, color)` over every pixel, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, Color)> + '_ {
        self.0
            .enumerate_pixels()
            .map(|(x, y, p)| (x, y, Color::from(*p)))
    }

    pub fn is_fully_black(&self) -> bool {
        is_fully_black(&self.0)
    }
}

/// True iff every pixel's red, green, and blue channels are zero.
///
/// Alpha is ignored, so a transparent canvas with stray alpha still counts
/// as black. This is the scroll-termination test.
pub fn is_fully_black<I>(img: &I) -> bool
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    img.pixels().all(|(_, _, p)| {
        let rgb = p.to_rgb();
        rgb[0] == 0 && rgb[1] == 0 && rgb[2] == 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn blank_frame_is_fully_black() {
        assert!(RenderedFrame::blank().is_fully_black());
    }

    #[rstest]
    #[case(Rgb([1, 0, 0]))]
    #[case(Rgb([0, 1, 0]))]
    #[case(Rgb([0, 0, 1]))]
    fn single_lit_channel_is_not_black(#[case] lit: Rgb<u8>) {
        let mut img = RgbImage::new(16, 16);
        img.put_pixel(15, 7, lit);
        assert!(!is_fully_black(&img));
    }

    #[test]
    fn alpha_is_ignored() {
        let mut img = RgbaImage::new(16, 16);
        img.put_pixel(3, 3, Rgba([0, 0, 0, 255]));
        assert!(is_fully_black(&img));
    }

    #[test]
    fn from_image_resizes_to_panel() {
        let img = RgbImage::from_pixel(32, 8, Rgb([10, 20, 30]));
        let frame = RenderedFrame::from_image(img);
        assert_eq!(frame.as_image().dimensions(), (16, 16));
    }

    #[rstest]
    #[case(Rotation::None, (0, 0))]
    #[case(Rotation::Cw90, (15, 0))]
    #[case(Rotation::Cw180, (15, 15))]
    #[case(Rotation::Cw270, (0, 15))]
    fn rotation_moves_top_left_corner(#[case] rotation: Rotation, #[case] to: (u32, u32)) {
        let mut img = RgbImage::new(16, 16);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));

        let frame = RenderedFrame::rotated(&img, rotation);
        let lit: Vec<(u32, u32)> = frame
            .pixels()
            .filter(|(_, _, c)| !c.is_black())
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit, vec![to]);
    }
}
