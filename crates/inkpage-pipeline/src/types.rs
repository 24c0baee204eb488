//! Shared types for the inkpage line-art pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so hosts can build and consume pipeline buffers
/// without depending on `image` directly.
///
/// Every stage consumes and produces an `RgbaImage` of identical
/// dimensions. `image::ImageBuffer` guarantees the raw length is
/// `width * height * 4` and lays pixels out row-major from the top-left.
pub use image::RgbaImage;

/// Channel value of a line ("ink") pixel.
pub const INK: u8 = 0;

/// Channel value of a background ("paper") pixel.
pub const PAPER: u8 = 255;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Build an RGBA buffer from raw bytes supplied by a host.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if either dimension is zero.
/// Returns [`PipelineError::DimensionMismatch`] if `bytes.len()` is not
/// `width * height * 4`.
pub fn rgba_from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<RgbaImage, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyInput);
    }
    let expected = usize::try_from(u64::from(width) * u64::from(height) * 4).map_err(|_| {
        PipelineError::DimensionMismatch {
            width,
            height,
            expected: usize::MAX,
            actual: bytes.len(),
        }
    })?;
    let actual = bytes.len();
    RgbaImage::from_raw(width, height, bytes).filter(|_| actual == expected).ok_or(
        PipelineError::DimensionMismatch {
            width,
            height,
            expected,
            actual,
        },
    )
}

/// Reject buffers the pipeline cannot process.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] for a zero-sized buffer and
/// [`PipelineError::DimensionMismatch`] if the backing storage disagrees
/// with the declared dimensions.
pub fn check_dimensions(image: &RgbaImage) -> Result<(), PipelineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyInput);
    }
    let expected = width as usize * height as usize * 4;
    let actual = image.as_raw().len();
    if actual == expected {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            width,
            height,
            expected,
            actual,
        })
    }
}

/// Returns `true` if the pixel is a pure-black line pixel.
#[must_use]
pub const fn is_ink(pixel: &image::Rgba<u8>) -> bool {
    pixel.0[0] == INK
}

/// An opaque gray pixel with the same value on all colour channels.
#[must_use]
pub const fn gray_pixel(value: u8) -> image::Rgba<u8> {
    image::Rgba([value, value, value, 255])
}

/// Count line pixels (red channel == [`INK`]) in a buffer.
#[must_use]
pub fn count_ink_pixels(image: &RgbaImage) -> u64 {
    image.pixels().map(|p| u64::from(is_ink(p))).sum()
}

/// Errors that can occur while rendering a coloring page.
///
/// Uses custom `Serialize`/`Deserialize` so preview results can cross a
/// JSON boundary; every variant carries only plain data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// A setting is out of range or names an unknown value.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The buffer length disagrees with `width * height * 4`.
    #[error("buffer of {actual} bytes does not match {width}x{height} RGBA (expected {expected})")]
    DimensionMismatch {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// The requested rendering style is not recognized.
    #[error("unsupported style: {0}")]
    UnsupportedStyle(String),

    /// The source image has zero width or height.
    #[error("input image is empty")]
    EmptyInput,
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    InvalidSettings(String),
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    UnsupportedStyle(String),
    EmptyInput,
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidSettings(s) => PipelineErrorProxy::InvalidSettings(s.clone()),
            Self::DimensionMismatch {
                width,
                height,
                expected,
                actual,
            } => PipelineErrorProxy::DimensionMismatch {
                width: *width,
                height: *height,
                expected: *expected,
                actual: *actual,
            },
            Self::UnsupportedStyle(s) => PipelineErrorProxy::UnsupportedStyle(s.clone()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PipelineErrorProxy::deserialize(deserializer)? {
            PipelineErrorProxy::InvalidSettings(s) => Self::InvalidSettings(s),
            PipelineErrorProxy::DimensionMismatch {
                width,
                height,
                expected,
                actual,
            } => Self::DimensionMismatch {
                width,
                height,
                expected,
                actual,
            },
            PipelineErrorProxy::UnsupportedStyle(s) => Self::UnsupportedStyle(s),
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
        })
    }
}
