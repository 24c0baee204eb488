//! Contour pruning and line smoothing on binary line art.
//!
//! Both passes use 8-connectivity and only visit interior pixels (the
//! one-pixel frame has no full neighbourhood and is left as is). Every
//! decision reads from the pass's input buffer and writes to a fresh
//! output, so the order in which pixels are visited never matters.

use rand::Rng;

use crate::settings::Complexity;
use crate::types::{INK, PAPER, RgbaImage, gray_pixel, is_ink};

/// Fewer ink neighbours than this marks a pixel as an isolated speck.
const ISOLATED_BELOW: u8 = 2;

/// More ink neighbours than this marks a pixel as part of a dense clump.
const DENSE_ABOVE: u8 = 6;

/// A dense pixel is erased when a uniform draw in `[0, 1)` exceeds this.
const THINNING_CUTOFF: f64 = 0.7;

/// Number of smoothing passes.
pub const SMOOTHING_PASSES: usize = 2;

/// Outcome of [`simplify_contours`].
#[derive(Debug, Clone)]
pub struct Simplified {
    /// The pruned line art.
    pub image: RgbaImage,
    /// Isolated specks removed (kids only).
    pub isolated_removed: u64,
    /// Pixels erased from dense clumps.
    pub thinned: u64,
}

/// Count ink pixels among the 8 neighbours of an interior pixel.
fn ink_neighbors(image: &RgbaImage, x: u32, y: u32) -> u8 {
    let mut count = 0;
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) != (x, y) && is_ink(image.get_pixel(nx, ny)) {
                count += 1;
            }
        }
    }
    count
}

/// Iterate the interior coordinates of an image in row-major order.
fn interior(image: &RgbaImage) -> impl Iterator<Item = (u32, u32)> {
    let (w, h) = image.dimensions();
    (1..h.saturating_sub(1)).flat_map(move |y| (1..w.saturating_sub(1)).map(move |x| (x, y)))
}

/// Prune noise and thin dense clusters according to `complexity`.
///
/// - Kids: an ink pixel with fewer than two ink neighbours is erased.
/// - Kids and normal: an ink pixel with more than six ink neighbours is
///   erased with probability 0.3, drawing from `rng`.
/// - Expert: nothing is erased and `rng` is never touched.
#[must_use = "returns the simplified line art"]
pub fn simplify_contours<R: Rng + ?Sized>(
    image: &RgbaImage,
    complexity: Complexity,
    rng: &mut R,
) -> Simplified {
    let mut out = image.clone();
    let mut isolated_removed = 0;
    let mut thinned = 0;

    if complexity != Complexity::Expert {
        for (x, y) in interior(image) {
            if !is_ink(image.get_pixel(x, y)) {
                continue;
            }
            let neighbors = ink_neighbors(image, x, y);
            if neighbors < ISOLATED_BELOW && complexity == Complexity::Kids {
                out.put_pixel(x, y, gray_pixel(PAPER));
                isolated_removed += 1;
            } else if neighbors > DENSE_ABOVE && rng.r#gen::<f64>() > THINNING_CUTOFF {
                out.put_pixel(x, y, gray_pixel(PAPER));
                thinned += 1;
            }
        }
    }

    tracing::trace!(%complexity, isolated_removed, thinned, "contours simplified");
    Simplified {
        image: out,
        isolated_removed,
        thinned,
    }
}

/// One smoothing pass: erase ink pixels whose 3x3 block (self included)
/// holds at most two ink pixels. Blocks with four or more keep the pixel
/// ink; exactly three leaves it unchanged.
#[must_use = "returns the smoothed line art"]
pub fn smooth_pass(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for (x, y) in interior(image) {
        if !is_ink(image.get_pixel(x, y)) {
            continue;
        }
        let block = ink_neighbors(image, x, y) + 1;
        if block <= 2 {
            out.put_pixel(x, y, gray_pixel(PAPER));
        } else if block >= 4 {
            out.put_pixel(x, y, gray_pixel(INK));
        }
    }
    out
}

/// Run [`SMOOTHING_PASSES`] sequential smoothing passes; each pass reads
/// the previous pass's output.
#[must_use = "returns the smoothed line art"]
pub fn smooth_lines(image: &RgbaImage) -> RgbaImage {
    (0..SMOOTHING_PASSES).fold(image.clone(), |current, _| smooth_pass(&current))
}
