//! Separable Gaussian blur for noise reduction before edge extraction.
//!
//! The kernel has `2 * ceil(3 * sigma) + 1` taps. Rows are convolved
//! first, then the columns of that intermediate result. A margin of
//! `kernel_radius` pixels on each edge is never convolved: those pixels
//! keep the value they had entering the pass (no clamping, mirroring or
//! wrapping), so callers must tolerate an unblurred border.
//!
//! Only the R, G and B channels are filtered; alpha is copied through.

use crate::grayscale::clamp_round;
use crate::types::RgbaImage;

/// A normalized 1-D Gaussian kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// Build the kernel for `sigma`, or `None` if `sigma` is not positive
    /// or the kernel would not fit in memory.
    ///
    /// Allocates `2 * radius + 1` weights; check [`kernel_radius`] against
    /// the image first when `sigma` is caller-controlled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(sigma: f32) -> Option<Self> {
        let radius = kernel_radius(sigma)?;
        let last = radius.checked_mul(2)?;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let mut weights: Vec<f32> = (0..=last)
            .map(|i| {
                let d = i.abs_diff(radius) as f32;
                (-(d * d) / two_sigma_sq).exp()
            })
            .collect();
        let sum: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        Some(Self { weights })
    }

    /// Number of pixels on each side of the centre tap.
    #[must_use]
    pub fn radius(&self) -> usize {
        self.weights.len() / 2
    }

    /// The normalized weights, centre tap in the middle.
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Kernel radius `ceil(3 * sigma)` for `sigma`, or `None` if `sigma` is
/// not positive. Saturates at `usize::MAX` for huge sigmas.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kernel_radius(sigma: f32) -> Option<usize> {
    if sigma.is_nan() || sigma <= 0.0 {
        return None;
    }
    Some((sigma * 3.0).ceil() as usize)
}

/// Apply a separable Gaussian blur with the given sigma.
///
/// Non-positive sigma values return the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &RgbaImage, sigma: f32) -> RgbaImage {
    let Some(radius) = kernel_radius(sigma) else {
        return image.clone();
    };
    // Neither axis is longer than the kernel: every pixel is margin.
    let longest = image.width().max(image.height()) as usize;
    if radius.saturating_mul(2) >= longest {
        return image.clone();
    }
    let Some(kernel) = GaussianKernel::new(sigma) else {
        return image.clone();
    };
    let horizontal = convolve_pass(image, &kernel, Axis::Rows);
    convolve_pass(&horizontal, &kernel, Axis::Columns)
}

#[derive(Clone, Copy)]
enum Axis {
    Rows,
    Columns,
}

/// One 1-D convolution pass. Reads only from `src`, writes a fresh buffer.
fn convolve_pass(src: &RgbaImage, kernel: &GaussianKernel, axis: Axis) -> RgbaImage {
    let mut out = src.clone();
    let (w, h) = (src.width() as usize, src.height() as usize);
    let radius = kernel.radius();
    let (along, across) = match axis {
        Axis::Rows => (w, h),
        Axis::Columns => (h, w),
    };
    if along <= radius.saturating_mul(2) {
        return out;
    }

    let raw = src.as_raw();
    let dst: &mut [u8] = &mut out;
    for line in 0..across {
        for pos in radius..along - radius {
            let mut sums = [0.0_f32; 3];
            for (k, &weight) in kernel.weights().iter().enumerate() {
                let sample = pos + k - radius;
                let idx = match axis {
                    Axis::Rows => (line * w + sample) * 4,
                    Axis::Columns => (sample * w + line) * 4,
                };
                for (c, sum) in sums.iter_mut().enumerate() {
                    *sum = weight.mul_add(f32::from(raw[idx + c]), *sum);
                }
            }
            let idx = match axis {
                Axis::Rows => (line * w + pos) * 4,
                Axis::Columns => (pos * w + line) * 4,
            };
            for (c, sum) in sums.into_iter().enumerate() {
                dst[idx + c] = clamp_round(sum);
            }
        }
    }
    out
}
