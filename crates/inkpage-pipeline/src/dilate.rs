//! Line-thickness dilation with a circular structuring element.

use crate::types::{INK, RgbaImage, gray_pixel, is_ink};

/// Thicken lines by painting a disc of radius `thickness` around every
/// ink pixel.
///
/// A pixel at offset `(dx, dy)` from an ink seed is painted when
/// `dx² + dy² <= thickness²`. Seeds are read from the untouched source
/// so painted pixels never seed further growth, and discs are clipped at
/// the image border. Thickness 0 or 1 returns the image unchanged.
///
/// Larger thicknesses only ever add ink: the result for `t1 <= t2` is a
/// subset of the result for `t2`. Radii beyond the image diagonal paint
/// the same pixels as the diagonal itself and are capped there.
#[must_use = "returns the dilated image"]
pub fn dilate(image: &RgbaImage, thickness: u32) -> RgbaImage {
    if thickness <= 1 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let r = i64::from(thickness).min(diagonal(w, h));
    let r_sq = r * r;
    let offsets: Vec<(i64, i64)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= r_sq)
        .collect();

    let mut out = image.clone();
    for (x, y, _) in image.enumerate_pixels().filter(|(_, _, p)| is_ink(p)) {
        for &(dx, dy) in &offsets {
            let (Ok(nx), Ok(ny)) = (
                u32::try_from(i64::from(x) + dx),
                u32::try_from(i64::from(y) + dy),
            ) else {
                continue;
            };
            if nx < w && ny < h {
                out.put_pixel(nx, ny, gray_pixel(INK));
            }
        }
    }
    out
}

/// Smallest integer radius whose disc covers the whole image from any
/// pixel in it.
#[allow(clippy::cast_possible_truncation)]
fn diagonal(w: u32, h: u32) -> i64 {
    f64::from(w).hypot(f64::from(h)).ceil() as i64
}
