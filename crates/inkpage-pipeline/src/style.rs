//! Per-style remapping of binary line art.

use rand::Rng;

use crate::settings::Style;
use crate::types::{INK, PAPER, RgbaImage, gray_pixel};

/// Values below this become ink under [`Style::Anime`] (midpoint 127.5).
const ANIME_CUTOFF: u8 = 128;

/// Spatial frequency of the manga banding pattern.
const MANGA_FREQUENCY: f32 = 0.1;

/// Manga band limits on `sin(0.1x) * sin(0.1y)`.
const MANGA_SOLID_ABOVE: f32 = 0.3;
const MANGA_MID_ABOVE: f32 = -0.3;

/// Gray used for the manga middle band.
pub const MANGA_MID_GRAY: u8 = 100;

/// Range of random grays used by [`Style::Watercolor`].
pub const WATERCOLOR_GRAYS: std::ops::Range<u8> = 50..200;

/// Apply `style` to a line-art buffer.
///
/// Only the watercolor style draws from `rng`.
#[must_use = "returns the styled image"]
pub fn apply_style<R: Rng + ?Sized>(image: &RgbaImage, style: Style, rng: &mut R) -> RgbaImage {
    match style {
        Style::Anime => anime(image),
        Style::Manga => manga(image),
        Style::Watercolor => watercolor(image, rng),
        Style::None => image.clone(),
    }
}

/// Hard re-binarization at the midpoint. Output is pure ink/paper even
/// for gray input.
fn anime(image: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        gray_pixel(if v < ANIME_CUTOFF { INK } else { PAPER })
    })
}

/// Banded line weight: each ink pixel becomes solid, mid-gray or erased
/// depending on a sinusoidal pattern over its position.
#[allow(clippy::cast_precision_loss)]
fn manga(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if pixel.0[0] != INK {
            continue;
        }
        let intensity =
            (x as f32 * MANGA_FREQUENCY).sin() * (y as f32 * MANGA_FREQUENCY).sin();
        let value = if intensity > MANGA_SOLID_ABOVE {
            INK
        } else if intensity > MANGA_MID_ABOVE {
            MANGA_MID_GRAY
        } else {
            PAPER
        };
        pixel.0[..3].fill(value);
    }
    out
}

/// Replace every ink pixel with a uniformly random gray.
fn watercolor<R: Rng + ?Sized>(image: &RgbaImage, rng: &mut R) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if pixel.0[0] == INK {
            pixel.0[..3].fill(rng.gen_range(WATERCOLOR_GRAYS));
        }
    }
    out
}
