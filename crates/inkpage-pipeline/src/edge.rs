//! Edge extraction: turn a grayscale buffer into binary line art.
//!
//! Two strategies are available behind the [`EdgeDetector`] trait,
//! selected at runtime through [`EdgeDetectorKind`]:
//!
//! - [`Sobel`](EdgeDetectorKind::Sobel): single-scale 3x3 Sobel gradient
//!   with a fixed magnitude cutoff.
//! - [`MultiScale`](EdgeDetectorKind::MultiScale): Gaussian-weighted
//!   gradients at several window sizes, averaged, then thresholded with a
//!   complexity multiplier and a hysteresis-like continuation rule that
//!   keeps strokes connected.
//!
//! Both produce a buffer where every pixel is exactly [`INK`] or
//! [`PAPER`] on R, G and B, with opaque alpha.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::types::{INK, PAPER, RgbaImage, gray_pixel};

/// Window half-sizes for the multi-scale extractor, smallest first.
pub const SCALES: [u32; 3] = [1, 2, 4];

/// Half-size of the neighbourhood searched by the continuation rule (5x5).
const CONTINUATION_RADIUS: i64 = 2;

/// A neighbour must exceed this multiple of the threshold to extend a line.
const STRONG_NEIGHBOR_FACTOR: f32 = 1.2;

/// A pixel must exceed this multiple of the threshold to be extended into.
const WEAK_PIXEL_FACTOR: f32 = 0.6;

/// Half-size of the window used by [`local_edge_density`] (11x11).
pub const DENSITY_RADIUS: u32 = 5;

/// Selects which edge extraction algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDetectorKind {
    /// Single-scale Sobel gradient magnitude against `edge_threshold`.
    Sobel,
    /// Averaged multi-scale gradients with adaptive thresholding.
    #[default]
    MultiScale,
}

impl EdgeDetectorKind {
    /// Every strategy, in the order previews are generated.
    pub const ALL: [Self; 2] = [Self::Sobel, Self::MultiScale];

    /// Kebab-case name used in configuration and preview labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sobel => "sobel",
            Self::MultiScale => "multi-scale",
        }
    }

    /// Threshold this strategy actually compares responses against.
    ///
    /// Only the multi-scale extractor applies the complexity multiplier.
    #[must_use]
    pub fn effective_threshold(self, settings: &Settings) -> f32 {
        match self {
            Self::Sobel => settings.edge_threshold,
            Self::MultiScale => {
                settings.edge_threshold * settings.complexity.threshold_multiplier()
            }
        }
    }
}

impl std::fmt::Display for EdgeDetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for edge extraction strategies.
///
/// Input: an opaque grayscale buffer (R = G = B). Output: binary line art.
pub trait EdgeDetector {
    /// Extract line pixels from `gray`.
    fn detect(&self, gray: &RgbaImage, settings: &Settings) -> RgbaImage;
}

impl EdgeDetector for EdgeDetectorKind {
    fn detect(&self, gray: &RgbaImage, settings: &Settings) -> RgbaImage {
        match *self {
            Self::Sobel => sobel_edges(gray, settings.edge_threshold),
            Self::MultiScale => multi_scale_edges(gray, settings),
        }
    }
}

/// Full single-scale extractor: grayscale, blur, then Sobel.
///
/// For callers outside the pipeline orchestrator, which already runs the
/// grayscale and blur stages itself.
#[must_use = "returns the binary line art"]
pub fn sobel_line_art(image: &RgbaImage, settings: &Settings) -> RgbaImage {
    let gray = crate::grayscale::grayscale(image);
    let blurred = crate::blur::gaussian_blur(&gray, settings.blur_strength);
    sobel_edges(&blurred, settings.edge_threshold)
}

/// Threshold the 3x3 Sobel gradient magnitude of an already-smoothed
/// grayscale buffer.
///
/// A pixel is a line iff `sqrt(gx² + gy²) > threshold`. The one-pixel
/// outer frame has no full 3x3 neighbourhood and is always paper.
#[must_use = "returns the binary line art"]
pub fn sobel_edges(gray: &RgbaImage, threshold: f32) -> RgbaImage {
    let (w, h) = gray.dimensions();
    let luma = red_channel(gray);
    let gx = imageproc::gradients::horizontal_sobel(&luma);
    let gy = imageproc::gradients::vertical_sobel(&luma);

    RgbaImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            return gray_pixel(PAPER);
        }
        let magnitude = f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0]));
        gray_pixel(if magnitude > threshold { INK } else { PAPER })
    })
}

/// Multi-scale adaptive extractor.
///
/// Works on the buffer it is given; it does not blur.
#[must_use = "returns the binary line art"]
pub fn multi_scale_edges(gray: &RgbaImage, settings: &Settings) -> RgbaImage {
    let (w, h) = gray.dimensions();
    let response = edge_response(gray);
    let threshold = EdgeDetectorKind::MultiScale.effective_threshold(settings);
    let strong: Vec<bool> = response
        .iter()
        .map(|&r| r > threshold * STRONG_NEIGHBOR_FACTOR)
        .collect();

    let (wi, hi) = (i64::from(w), i64::from(h));
    let has_strong_neighbor = |x: i64, y: i64| {
        (y - CONTINUATION_RADIUS..=y + CONTINUATION_RADIUS)
            .filter(|ny| (0..hi).contains(ny))
            .any(|ny| {
                (x - CONTINUATION_RADIUS..=x + CONTINUATION_RADIUS)
                    .filter(|nx| (0..wi).contains(nx))
                    .any(|nx| strong[index(nx, ny, wi)])
            })
    };

    let mut continued = 0_u64;
    let out = RgbaImage::from_fn(w, h, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        let r = response[index(x, y, wi)];
        let is_line = if r > threshold {
            true
        } else if r > threshold * WEAK_PIXEL_FACTOR && has_strong_neighbor(x, y) {
            continued += 1;
            true
        } else {
            false
        };
        gray_pixel(if is_line { INK } else { PAPER })
    });
    tracing::trace!(threshold, continued, "multi-scale thresholding");
    out
}

/// Per-pixel averaged gradient magnitude over [`SCALES`].
///
/// At scale `s` only pixels at least `s` away from every border receive a
/// contribution. Within the `(2s+1)²` window each sample is weighted by
/// `exp(-(dx² + dy²) / (2s²))` and signed by the side of the centre it
/// lies on; the centre row and column do not contribute to the
/// respective direction.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn edge_response(gray: &RgbaImage) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let values: Vec<f32> = gray.pixels().map(|p| f32::from(p.0[0])).collect();
    let mut response = vec![0.0_f32; w * h];

    for scale in SCALES {
        let s = scale as usize;
        if w <= 2 * s || h <= 2 * s {
            continue;
        }
        let window = gaussian_window(scale);
        let side = 2 * s + 1;
        for y in s..h - s {
            for x in s..w - s {
                let mut gx = 0.0_f32;
                let mut gy = 0.0_f32;
                for wy in 0..side {
                    let row = (y + wy - s) * w;
                    for wx in 0..side {
                        let v = values[row + x + wx - s] * window[wy * side + wx];
                        gx += direction(wx, s) * v;
                        gy += direction(wy, s) * v;
                    }
                }
                response[y * w + x] += gx.hypot(gy) / SCALES.len() as f32;
            }
        }
    }
    response
}

/// Spatial-sensitivity factor around `(x, y)` in a binary line buffer.
///
/// Counts paper-valued pixels in the 11x11 window (clipped at the image
/// border) and maps their share `p` through `1 + (p - 0.1) * 2`, clamped
/// to `[0.5, 2.0]`. Pure; no pipeline stage consumes it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn local_edge_density(edges: &RgbaImage, x: u32, y: u32) -> f32 {
    let (w, h) = edges.dimensions();
    if x >= w || y >= h {
        return 1.0;
    }
    let xs = x.saturating_sub(DENSITY_RADIUS)..=x.saturating_add(DENSITY_RADIUS).min(w - 1);
    let ys = y.saturating_sub(DENSITY_RADIUS)..=y.saturating_add(DENSITY_RADIUS).min(h - 1);
    let total = xs.clone().count() * ys.clone().count();
    let paper = ys
        .flat_map(|ny| xs.clone().map(move |nx| (nx, ny)))
        .filter(|&(nx, ny)| edges.get_pixel(nx, ny).0[0] == PAPER)
        .count();
    let share = paper as f32 / total as f32;
    2.0_f32.mul_add(share - 0.1, 1.0).clamp(0.5, 2.0)
}

/// Row-major Gaussian weights for a `(2s+1)²` window.
#[allow(clippy::cast_precision_loss)]
fn gaussian_window(scale: u32) -> Vec<f32> {
    let s = i64::from(scale);
    let two_s_sq = 2.0 * (s * s) as f32;
    (-s..=s)
        .flat_map(|dy| (-s..=s).map(move |dx| (dx, dy)))
        .map(|(dx, dy)| (-((dx * dx + dy * dy) as f32) / two_s_sq).exp())
        .collect()
}

/// Sign of a window offset relative to the centre at `s`.
fn direction(offset: usize, s: usize) -> f32 {
    match offset.cmp(&s) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn index(x: i64, y: i64, width: i64) -> usize {
    (y * width + x) as usize
}

fn red_channel(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([image.get_pixel(x, y).0[0]])
    })
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::settings::Complexity;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn split_image() -> RgbaImage {
        RgbaImage::from_fn(20, 20, |x, _y| gray_pixel(if x < 10 { 0 } else { 255 }))
    }

    #[test]
    fn only_multi_scale_scales_threshold() {
        let settings = Settings {
            complexity: Complexity::Kids,
            ..Settings::default()
        };
        let sobel = EdgeDetectorKind::Sobel.effective_threshold(&settings);
        let multi = EdgeDetectorKind::MultiScale.effective_threshold(&settings);
        assert!((sobel - 50.0).abs() < f32::EPSILON);
        assert!((multi - 75.0).abs() < 1e-4);
    }

    fn is_binary(img: &RgbaImage) -> bool {
        img.pixels().all(|p| {
            let [r, g, b, a] = p.0;
            (r == INK || r == PAPER) && r == g && g == b && a == 255
        })
    }

    fn ink_columns(img: &RgbaImage, y: u32) -> Vec<u32> {
        (0..img.width())
            .filter(|&x| img.get_pixel(x, y).0[0] == INK)
            .collect()
    }

    #[test]
    fn default_is_multi_scale() {
        assert_eq!(EdgeDetectorKind::default(), EdgeDetectorKind::MultiScale);
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&EdgeDetectorKind::MultiScale).unwrap_or_default();
        assert_eq!(json, "\"multi-scale\"");
    }

    #[test]
    fn sobel_uniform_image_has_no_lines() {
        let img = RgbaImage::from_pixel(20, 20, gray_pixel(128));
        let edges = sobel_edges(&img, 10.0);
        assert!(edges.pixels().all(|p| p.0[0] == PAPER));
    }

    #[test]
    fn sobel_marks_boundary_columns_only() {
        let edges = sobel_edges(&split_image(), 100.0);
        assert!(is_binary(&edges));
        for y in 1..19 {
            assert_eq!(ink_columns(&edges, y), vec![9, 10], "row {y}");
        }
        assert!(ink_columns(&edges, 0).is_empty());
        assert!(ink_columns(&edges, 19).is_empty());
    }

    #[test]
    fn sobel_threshold_above_gradient_yields_blank_page() {
        // Step of 255 gives a Sobel magnitude of 4 * 255 = 1020.
        let edges = sobel_edges(&split_image(), 1020.0);
        assert!(edges.pixels().all(|p| p.0[0] == PAPER));
    }

    #[test]
    fn sobel_output_is_binary_on_noisy_input() {
        let img = RgbaImage::from_fn(16, 16, |x, y| gray_pixel(((x * 37 + y * 91) % 256) as u8));
        assert!(is_binary(&sobel_edges(&img, 60.0)));
    }

    #[test]
    fn sobel_line_art_blurs_first() {
        let settings = Settings {
            edge_threshold: 100.0,
            blur_strength: 0.0,
            ..Settings::default()
        };
        let colour = RgbaImage::from_fn(20, 20, |x, _| {
            if x < 10 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        assert_eq!(sobel_line_art(&colour, &settings), sobel_edges(&split_image(), 100.0));
    }

    #[test]
    fn response_is_zero_on_uniform_image() {
        let img = RgbaImage::from_pixel(20, 20, gray_pixel(200));
        assert!(edge_response(&img).iter().all(|r| r.abs() < 1e-2));
    }

    #[test]
    fn response_skips_border_for_largest_scale() {
        let response = edge_response(&split_image());
        // Row 0 is outside every scale's interior.
        assert!(response[..20].iter().all(|r| r.abs() < f32::EPSILON));
        // Near the boundary inside the image every scale contributes.
        assert!(response[10 * 20 + 10] > 0.0);
    }

    #[test]
    fn multi_scale_finds_boundary() {
        let settings = Settings {
            edge_threshold: 100.0,
            ..Settings::default()
        };
        let edges = multi_scale_edges(&split_image(), &settings);
        assert!(is_binary(&edges));
        let cols = ink_columns(&edges, 10);
        assert!(cols.contains(&9) && cols.contains(&10), "got {cols:?}");
        // Far from the boundary there is no gradient at all.
        assert_eq!(edges.get_pixel(2, 10).0[0], PAPER);
        assert_eq!(edges.get_pixel(17, 10).0[0], PAPER);
    }

    #[test]
    fn expert_keeps_at_least_as_many_lines_as_kids() {
        let img = RgbaImage::from_fn(24, 24, |x, y| gray_pixel(((x * 11 + y * 7) % 97) as u8));
        let count = |complexity| {
            let settings = Settings {
                edge_threshold: 60.0,
                complexity,
                ..Settings::default()
            };
            crate::types::count_ink_pixels(&multi_scale_edges(&img, &settings))
        };
        assert!(count(Complexity::Expert) >= count(Complexity::Normal));
        assert!(count(Complexity::Normal) >= count(Complexity::Kids));
    }

    #[test]
    fn continuation_extends_weak_pixels_next_to_strong_ones() {
        // Two pixels right of the boundary only the widest scale still sees
        // the step, so the response there is weak compared to the boundary.
        let img = split_image();
        let response = edge_response(&img);
        let strong = response[15 * 20 + 10];
        let weak = response[15 * 20 + 12];
        assert!(weak > 0.0 && weak < 0.8 * strong, "weak={weak} strong={strong}");

        // Pick a threshold the weak pixel misses on its own but that still
        // lets the boundary count as a strong neighbour.
        let threshold = (weak * 1.25).min(strong / 1.25);
        assert!(weak < threshold);
        let settings = Settings {
            edge_threshold: threshold,
            ..Settings::default()
        };
        let edges = multi_scale_edges(&img, &settings);
        assert_eq!(edges.get_pixel(10, 15).0[0], INK);
        assert_eq!(edges.get_pixel(12, 15).0[0], INK);
        // Pixels with no response never become lines.
        assert_eq!(edges.get_pixel(17, 15).0[0], PAPER);
    }

    #[test]
    fn trait_dispatch_matches_free_functions() {
        let settings = Settings {
            edge_threshold: 80.0,
            ..Settings::default()
        };
        let img = split_image();
        assert_eq!(
            EdgeDetectorKind::Sobel.detect(&img, &settings),
            sobel_edges(&img, 80.0)
        );
        assert_eq!(
            EdgeDetectorKind::MultiScale.detect(&img, &settings),
            multi_scale_edges(&img, &settings)
        );
    }

    #[test]
    fn density_factor_on_blank_page_is_clamped_high() {
        let page = RgbaImage::from_pixel(20, 20, gray_pixel(PAPER));
        // share = 1.0 -> 1 + 0.9 * 2 = 2.8, clamped to 2.0.
        assert!((local_edge_density(&page, 10, 10) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn density_factor_on_solid_ink_is_clamped_low() {
        let ink = RgbaImage::from_pixel(20, 20, gray_pixel(INK));
        // share = 0 -> 1 - 0.2 = 0.8.
        assert!((local_edge_density(&ink, 0, 0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn density_window_is_clipped_at_corner() {
        // Top-left 6x6 corner window: 36 pixels, 18 of them paper.
        let img = RgbaImage::from_fn(20, 20, |x, _| gray_pixel(if x < 3 { INK } else { PAPER }));
        let factor = local_edge_density(&img, 0, 0);
        assert!((factor - 1.8).abs() < 1e-5, "got {factor}");
    }
}
