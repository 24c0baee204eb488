//! Grayscale conversion and clamped channel arithmetic.
//!
//! This is the first stage of the pipeline: RGBA in, RGBA out with the
//! luminance replicated across R, G and B and alpha forced opaque.

use crate::types::{RgbaImage, gray_pixel};

/// BT.709 luminance weights for R, G and B.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Round to the nearest integer and clamp into `0..=255`.
///
/// Every value written back into an 8-bit channel goes through here.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_round(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Unrounded luminance of one RGB triple.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    LUMA_WEIGHTS[2].mul_add(
        f32::from(b),
        LUMA_WEIGHTS[0].mul_add(f32::from(r), LUMA_WEIGHTS[1] * f32::from(g)),
    )
}

/// Convert an RGBA image to opaque grayscale.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        gray_pixel(clamp_round(luminance(r, g, b)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_round_rounds_half_away_from_zero() {
        assert_eq!(clamp_round(0.4), 0);
        assert_eq!(clamp_round(0.5), 1);
        assert_eq!(clamp_round(127.5), 128);
    }

    #[test]
    fn clamp_round_clamps_out_of_range() {
        assert_eq!(clamp_round(-12.0), 0);
        assert_eq!(clamp_round(300.7), 255);
        assert_eq!(clamp_round(f32::INFINITY), 255);
        assert_eq!(clamp_round(f32::NAN), 0);
    }

    #[test]
    fn weights_sum_to_one() {
        let sum: f32 = LUMA_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn white_and_black_are_preserved() {
        assert_eq!(clamp_round(luminance(255, 255, 255)), 255);
        assert_eq!(clamp_round(luminance(0, 0, 0)), 0);
    }

    #[test]
    fn green_is_brightest_primary() {
        let r = clamp_round(luminance(255, 0, 0));
        let g = clamp_round(luminance(0, 255, 0));
        let b = clamp_round(luminance(0, 0, 255));
        assert_eq!((r, g, b), (54, 182, 18));
    }

    #[test]
    fn grayscale_replicates_channels_and_forces_alpha() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([200, 100, 50, 17]));
        let gray = grayscale(&img);
        assert_eq!(gray.dimensions(), (3, 2));
        for p in gray.pixels() {
            let [r, g, b, a] = p.0;
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 255);
            assert_eq!(r, 118);
        }
    }
}
