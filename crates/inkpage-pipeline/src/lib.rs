//! inkpage-pipeline: Pure coloring-page pipeline (sans-IO).
//!
//! Turns a photograph into printable line art through:
//! grayscale -> blur -> edge extraction -> optional background
//! segmentation -> contour simplification -> line smoothing ->
//! style -> dilation.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! [`RgbaImage`] buffers and returns fresh buffers. Decoding files,
//! writing output and reading clocks belong to the host (see the
//! `inkpage` binary).

pub mod blur;
pub mod contour;
pub mod diagnostics;
pub mod dilate;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod preview;
pub mod segment;
pub mod settings;
pub mod style;
pub mod types;

pub use diagnostics::{Clock, RenderDiagnostics, render_with_diagnostics};
pub use edge::{EdgeDetector, EdgeDetectorKind};
pub use pipeline::{Pipeline, PipelineStage};
pub use preview::{PreviewEntry, preview_all};
pub use settings::{Complexity, Settings, Style};
pub use types::{Dimensions, PipelineError, RgbaImage, rgba_from_raw};

/// Render a coloring page from `source`.
///
/// # Pipeline steps
///
/// 1. Validate settings and the source buffer
/// 2. Grayscale (Rec. 709 luminance)
/// 3. Gaussian blur with `blur_strength` as sigma
/// 4. Edge extraction (pluggable strategy)
/// 5. Optional background segmentation
/// 6. Contour simplification (randomized under kids/normal)
/// 7. Two line-smoothing passes
/// 8. Style remap (watercolor is randomized)
/// 9. Circular dilation to `line_thickness`
///
/// With [`Settings::seed`] set, the output is fully reproducible.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidSettings`] for out-of-range settings,
/// [`PipelineError::EmptyInput`] for a zero-sized source and
/// [`PipelineError::DimensionMismatch`] for a buffer whose length
/// disagrees with its dimensions. No partial output is ever returned.
pub fn render(source: &RgbaImage, settings: &Settings) -> Result<RgbaImage, PipelineError> {
    let _span = tracing::debug_span!("render", width = source.width(), height = source.height())
        .entered();
    Ok(Pipeline::new(source, settings.clone())?
        .grayscale()
        .blur()
        .detect_edges()
        .remove_background()
        .simplify()
        .smooth()
        .stylize()
        .dilate()
        .into_image())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{INK, PAPER, gray_pixel, is_ink};

    /// Left half black, right half white.
    fn split(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| gray_pixel(if x < w / 2 { 0 } else { 255 }))
    }

    #[test]
    fn render_rejects_zero_thickness() {
        let settings = Settings {
            line_thickness: 0,
            ..Settings::default()
        };
        let result = render(&split(10, 10), &settings);
        assert!(matches!(result, Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn render_rejects_empty_source() {
        let result = render(&RgbaImage::new(0, 0), &Settings::default());
        assert_eq!(result, Err(PipelineError::EmptyInput));
    }

    #[test]
    fn render_preserves_dimensions() {
        let img = split(37, 23);
        let page = render(&img, &Settings::default()).unwrap();
        assert_eq!(page.dimensions(), (37, 23));
    }

    #[test]
    fn render_finds_the_boundary() {
        let settings = Settings {
            complexity: Complexity::Expert,
            style: Style::Anime,
            seed: Some(0),
            ..Settings::default()
        };
        let page = render(&split(40, 40), &settings).unwrap();
        assert!(is_ink(page.get_pixel(20, 20)) || is_ink(page.get_pixel(19, 20)));
        assert_eq!(page.get_pixel(5, 20).0[0], PAPER);
        assert_eq!(page.get_pixel(35, 20).0[0], PAPER);
    }

    #[test]
    fn seeded_render_is_reproducible() {
        let settings = Settings {
            complexity: Complexity::Kids,
            style: Style::Watercolor,
            seed: Some(42),
            ..Settings::default()
        };
        let img = split(32, 32);
        assert_eq!(render(&img, &settings).unwrap(), render(&img, &settings).unwrap());
    }

    #[test]
    fn render_survives_maximal_line_thickness() {
        let base = Settings {
            complexity: Complexity::Expert,
            seed: Some(3),
            ..Settings::default()
        };
        let img = split(16, 16);
        let huge = render(&img, &Settings {
            line_thickness: u32::MAX,
            ..base.clone()
        })
        .unwrap();
        // ceil(hypot(16, 16)) = 23 already covers the page.
        let diagonal = render(&img, &Settings {
            line_thickness: 23,
            ..base
        })
        .unwrap();
        assert_eq!(huge, diagonal);
    }

    #[test]
    fn render_survives_maximal_blur_strength() {
        let img = split(16, 16);
        let settings = Settings {
            blur_strength: f32::MAX,
            complexity: Complexity::Expert,
            seed: Some(3),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
        let page = render(&img, &settings).unwrap();
        // A kernel wider than the image leaves it unblurred.
        let unblurred = render(&img, &Settings {
            blur_strength: 0.0,
            ..settings
        })
        .unwrap();
        assert_eq!(page, unblurred);
    }

    #[test]
    fn render_rejects_oversized_backing_buffer() {
        // `from_raw` accepts storage longer than width * height * 4.
        let img = RgbaImage::from_raw(2, 2, vec![0; 20]).unwrap();
        assert_eq!(
            render(&img, &Settings::default()),
            Err(PipelineError::DimensionMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 20,
            })
        );
    }

    #[test]
    fn uniform_image_renders_blank_page() {
        let img = RgbaImage::from_pixel(16, 16, gray_pixel(90));
        let page = render(&img, &Settings::default()).unwrap();
        assert!(page.pixels().all(|p| p.0[0] != INK));
    }
}
