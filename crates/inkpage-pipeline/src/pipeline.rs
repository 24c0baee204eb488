//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate buffer before continuing.
//!
//! [`crate::render`] runs every stage in one call. [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use inkpage_pipeline::{Pipeline, PipelineError, RgbaImage, Settings};
//! # fn run(photo: &RgbaImage) -> Result<(), PipelineError> {
//! let page = Pipeline::new(photo, Settings::default())?
//!     .grayscale()
//!     .blur()
//!     .detect_edges()
//!     .remove_background()
//!     .simplify()
//!     .smooth()
//!     .stylize()
//!     .dilate()
//!     .into_image();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state. Only the
//! current buffer is carried forward; earlier buffers are dropped as soon
//! as the next stage has been computed.

use rand::rngs::StdRng;

use crate::diagnostics::StageMetrics;
use crate::edge::EdgeDetector;
use crate::settings::Settings;
use crate::types::{Dimensions, PipelineError, RgbaImage, check_dimensions, count_ink_pixels};

/// Total number of stages after [`Pending`].
pub const STAGE_COUNT: usize = 8;

/// State shared by every stage of one render.
struct Context {
    settings: Settings,
    rng: StdRng,
    dimensions: Dimensions,
}

/// Common read access to a completed stage.
pub trait PipelineStage {
    /// Human-readable stage name.
    const NAME: &'static str;

    /// The buffer this stage produced.
    fn image(&self) -> &RgbaImage;

    /// Stage-specific metrics for diagnostics.
    fn metrics(&self) -> StageMetrics;
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Validate `settings` and `source` and return the [`Pending`] state.
    ///
    /// The random source for the simplification and style stages is
    /// created here from [`Settings::seed`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] if a setting is out of
    /// range, [`PipelineError::EmptyInput`] for a zero-sized source and
    /// [`PipelineError::DimensionMismatch`] if the buffer length disagrees
    /// with its dimensions.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: &RgbaImage, settings: Settings) -> Result<Pending<'_>, PipelineError> {
        settings.validate()?;
        check_dimensions(source)?;
        let rng = settings.rng();
        Ok(Pending {
            ctx: Context {
                dimensions: Dimensions::of(source),
                settings,
                rng,
            },
            source,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Validated input, nothing computed yet.
#[must_use = "pipeline stages are consumed by advancing, call .grayscale() to continue"]
pub struct Pending<'a> {
    ctx: Context,
    source: &'a RgbaImage,
}

impl Pending<'_> {
    /// The source photograph.
    #[must_use]
    pub const fn source(&self) -> &RgbaImage {
        self.source
    }

    /// Advance to the [`Grayscaled`] stage.
    pub fn grayscale(self) -> Grayscaled {
        let image = crate::grayscale::grayscale(self.source);
        tracing::debug!(
            width = self.ctx.dimensions.width,
            height = self.ctx.dimensions.height,
            "grayscale"
        );
        Grayscaled {
            ctx: self.ctx,
            image,
        }
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Luminance buffer with R = G = B.
#[must_use = "pipeline stages are consumed by advancing, call .blur() to continue"]
pub struct Grayscaled {
    ctx: Context,
    image: RgbaImage,
}

impl Grayscaled {
    /// Advance to the [`Blurred`] stage.
    pub fn blur(self) -> Blurred {
        let sigma = self.ctx.settings.blur_strength;
        let kernel_radius = crate::blur::kernel_radius(sigma);
        let image = crate::blur::gaussian_blur(&self.image, sigma);
        tracing::debug!(sigma, ?kernel_radius, "blur");
        Blurred {
            ctx: self.ctx,
            image,
            kernel_radius,
        }
    }
}

impl PipelineStage for Grayscaled {
    const NAME: &'static str = "grayscale";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.ctx.dimensions.width,
            height: self.ctx.dimensions.height,
        }
    }
}

// ───────────────────────── Stage 2: Blurred ──────────────────────────

/// Denoised grayscale buffer.
#[must_use = "pipeline stages are consumed by advancing, call .detect_edges() to continue"]
pub struct Blurred {
    ctx: Context,
    image: RgbaImage,
    kernel_radius: Option<usize>,
}

impl Blurred {
    /// Advance to the [`EdgesDetected`] stage using the configured
    /// [`EdgeDetectorKind`](crate::EdgeDetectorKind).
    pub fn detect_edges(self) -> EdgesDetected {
        let settings = &self.ctx.settings;
        let image = settings.edge_detector.detect(&self.image, settings);
        let ink_pixels = count_ink_pixels(&image);
        tracing::debug!(detector = %settings.edge_detector, ink_pixels, "edges detected");
        EdgesDetected {
            ctx: self.ctx,
            image,
            ink_pixels,
        }
    }
}

impl PipelineStage for Blurred {
    const NAME: &'static str = "blur";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Blur {
            sigma: self.ctx.settings.blur_strength,
            kernel_radius: self.kernel_radius,
        }
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Binary line art straight from the edge extractor.
#[must_use = "pipeline stages are consumed by advancing, call .remove_background() to continue"]
pub struct EdgesDetected {
    ctx: Context,
    image: RgbaImage,
    ink_pixels: u64,
}

impl EdgesDetected {
    /// Advance to the [`BackgroundRemoved`] stage.
    ///
    /// Segmentation only runs when
    /// [`Settings::remove_background`] is set; otherwise the buffer is
    /// passed through untouched.
    pub fn remove_background(self) -> BackgroundRemoved {
        if !self.ctx.settings.remove_background {
            return BackgroundRemoved {
                ctx: self.ctx,
                image: self.image,
                segmentation: None,
            };
        }
        let seg = crate::segment::segment_background(&self.image);
        tracing::debug!(
            clusters = seg.cluster_count,
            cleared_pixels = seg.cleared_pixels,
            "background removed"
        );
        BackgroundRemoved {
            ctx: self.ctx,
            image: seg.image,
            segmentation: Some(SegmentationSummary {
                cluster_count: seg.cluster_count,
                background: seg.background.map(|c| c.color),
                cleared_pixels: seg.cleared_pixels,
            }),
        }
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &'static str = "edge detection";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        let settings = &self.ctx.settings;
        StageMetrics::EdgeDetection {
            detector: settings.edge_detector.name().to_string(),
            effective_threshold: settings.edge_detector.effective_threshold(settings),
            ink_pixel_count: self.ink_pixels,
            total_pixel_count: self.ctx.dimensions.pixel_count(),
        }
    }
}

// ───────────────────────── Stage 4: BackgroundRemoved ────────────────

struct SegmentationSummary {
    cluster_count: usize,
    background: Option<[u8; 3]>,
    cleared_pixels: u64,
}

/// Line art after optional background segmentation.
#[must_use = "pipeline stages are consumed by advancing, call .simplify() to continue"]
pub struct BackgroundRemoved {
    ctx: Context,
    image: RgbaImage,
    segmentation: Option<SegmentationSummary>,
}

impl BackgroundRemoved {
    /// Whether segmentation actually ran.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.segmentation.is_some()
    }

    /// Advance to the [`ContoursSimplified`] stage.
    pub fn simplify(mut self) -> ContoursSimplified {
        let result = crate::contour::simplify_contours(
            &self.image,
            self.ctx.settings.complexity,
            &mut self.ctx.rng,
        );
        tracing::debug!(
            isolated_removed = result.isolated_removed,
            thinned = result.thinned,
            "contours simplified"
        );
        ContoursSimplified {
            ctx: self.ctx,
            image: result.image,
            isolated_removed: result.isolated_removed,
            thinned: result.thinned,
        }
    }
}

impl PipelineStage for BackgroundRemoved {
    const NAME: &'static str = "segmentation";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        let (cluster_count, background, cleared_pixels) = self
            .segmentation
            .as_ref()
            .map_or((0, None, 0), |s| (s.cluster_count, s.background, s.cleared_pixels));
        StageMetrics::Segmentation {
            cluster_count,
            background,
            cleared_pixels,
        }
    }
}

// ───────────────────────── Stage 5: ContoursSimplified ───────────────

/// Line art with specks removed and dense clumps thinned.
#[must_use = "pipeline stages are consumed by advancing, call .smooth() to continue"]
pub struct ContoursSimplified {
    ctx: Context,
    image: RgbaImage,
    isolated_removed: u64,
    thinned: u64,
}

impl ContoursSimplified {
    /// Advance to the [`Smoothed`] stage.
    pub fn smooth(self) -> Smoothed {
        let ink_before = count_ink_pixels(&self.image);
        let image = crate::contour::smooth_lines(&self.image);
        tracing::debug!(ink_before, "lines smoothed");
        Smoothed {
            ctx: self.ctx,
            image,
            ink_before,
        }
    }
}

impl PipelineStage for ContoursSimplified {
    const NAME: &'static str = "simplification";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Simplification {
            complexity: self.ctx.settings.complexity.name().to_string(),
            isolated_removed: self.isolated_removed,
            thinned: self.thinned,
            ink_after: count_ink_pixels(&self.image),
        }
    }
}

// ───────────────────────── Stage 6: Smoothed ─────────────────────────

/// Line art after the smoothing passes.
#[must_use = "pipeline stages are consumed by advancing, call .stylize() to continue"]
pub struct Smoothed {
    ctx: Context,
    image: RgbaImage,
    ink_before: u64,
}

impl Smoothed {
    /// Advance to the [`Styled`] stage.
    pub fn stylize(mut self) -> Styled {
        let style = self.ctx.settings.style;
        let image = crate::style::apply_style(&self.image, style, &mut self.ctx.rng);
        tracing::debug!(%style, "style applied");
        Styled {
            ctx: self.ctx,
            image,
        }
    }
}

impl PipelineStage for Smoothed {
    const NAME: &'static str = "smoothing";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Smoothing {
            passes: crate::contour::SMOOTHING_PASSES,
            ink_before: self.ink_before,
            ink_after: count_ink_pixels(&self.image),
        }
    }
}

// ───────────────────────── Stage 7: Styled ───────────────────────────

/// Line art after the stylistic remap.
#[must_use = "pipeline stages are consumed by advancing, call .dilate() to continue"]
pub struct Styled {
    ctx: Context,
    image: RgbaImage,
}

impl Styled {
    /// Advance to the final [`Dilated`] stage.
    pub fn dilate(self) -> Dilated {
        let thickness = self.ctx.settings.line_thickness;
        let ink_before = count_ink_pixels(&self.image);
        let image = crate::dilate::dilate(&self.image, thickness);
        tracing::debug!(thickness, ink_before, "lines dilated");
        Dilated {
            ctx: self.ctx,
            image,
            ink_before,
        }
    }
}

impl PipelineStage for Styled {
    const NAME: &'static str = "style";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Style {
            style: self.ctx.settings.style.name().to_string(),
            ink_after: count_ink_pixels(&self.image),
        }
    }
}

// ───────────────────────── Stage 8: Dilated ──────────────────────────

/// The finished coloring page.
pub struct Dilated {
    ctx: Context,
    image: RgbaImage,
    ink_before: u64,
}

impl Dilated {
    /// Consume the pipeline and return the finished page.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl PipelineStage for Dilated {
    const NAME: &'static str = "dilation";

    fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Dilation {
            thickness: self.ctx.settings.line_thickness,
            ink_before: self.ink_before,
            ink_after: count_ink_pixels(&self.image),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::settings::{Complexity, Style};
    use crate::types::{INK, PAPER, gray_pixel, is_ink};

    /// Left half black, right half white.
    fn split(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| gray_pixel(if x < w / 2 { 0 } else { 255 }))
    }

    fn deterministic() -> Settings {
        Settings {
            complexity: Complexity::Expert,
            seed: Some(1),
            ..Settings::default()
        }
    }

    #[test]
    fn new_rejects_invalid_settings() {
        let settings = Settings {
            line_thickness: 0,
            ..Settings::default()
        };
        let err = Pipeline::new(&split(8, 8), settings).err().unwrap();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
    }

    #[test]
    fn new_rejects_empty_source() {
        let err = Pipeline::new(&RgbaImage::new(0, 4), Settings::default())
            .err()
            .unwrap();
        assert_eq!(err, PipelineError::EmptyInput);
    }

    #[test]
    fn pending_exposes_source() {
        let img = split(6, 6);
        let pending = Pipeline::new(&img, Settings::default()).unwrap();
        assert_eq!(pending.source(), &img);
    }

    #[test]
    fn every_stage_preserves_dimensions() {
        let img = split(24, 16);
        let gray = Pipeline::new(&img, deterministic()).unwrap().grayscale();
        assert_eq!(gray.image().dimensions(), (24, 16));
        let blurred = gray.blur();
        assert_eq!(blurred.image().dimensions(), (24, 16));
        let edges = blurred.detect_edges();
        assert_eq!(edges.image().dimensions(), (24, 16));
        let bg = edges.remove_background();
        assert!(!bg.applied());
        let simplified = bg.simplify();
        assert_eq!(simplified.image().dimensions(), (24, 16));
        let smoothed = simplified.smooth();
        let styled = smoothed.stylize();
        let dilated = styled.dilate();
        assert_eq!(dilated.into_image().dimensions(), (24, 16));
    }

    #[test]
    fn edge_metrics_report_line_count() {
        let settings = Settings {
            edge_detector: crate::EdgeDetectorKind::Sobel,
            blur_strength: 0.0,
            ..deterministic()
        };
        let edges = Pipeline::new(&split(20, 20), settings)
            .unwrap()
            .grayscale()
            .blur()
            .detect_edges();
        let StageMetrics::EdgeDetection {
            detector,
            ink_pixel_count,
            total_pixel_count,
            ..
        } = edges.metrics()
        else {
            panic!("wrong metrics variant");
        };
        assert_eq!(detector, "sobel");
        // Columns 9 and 10, rows 1..19.
        assert_eq!(ink_pixel_count, 36);
        assert_eq!(total_pixel_count, 400);
    }

    #[test]
    fn background_stage_runs_when_enabled() {
        let settings = Settings {
            remove_background: true,
            ..deterministic()
        };
        let bg = Pipeline::new(&split(30, 30), settings)
            .unwrap()
            .grayscale()
            .blur()
            .detect_edges()
            .remove_background();
        assert!(bg.applied());
        let StageMetrics::Segmentation { background, .. } = bg.metrics() else {
            panic!("wrong metrics variant");
        };
        assert_eq!(background, Some([PAPER, PAPER, PAPER]));
    }

    #[test]
    fn dilation_metrics_never_shrink() {
        let settings = Settings {
            style: Style::Anime,
            line_thickness: 2,
            ..deterministic()
        };
        let dilated = Pipeline::new(&split(32, 32), settings)
            .unwrap()
            .grayscale()
            .blur()
            .detect_edges()
            .remove_background()
            .simplify()
            .smooth()
            .stylize()
            .dilate();
        let StageMetrics::Dilation {
            ink_before,
            ink_after,
            ..
        } = dilated.metrics()
        else {
            panic!("wrong metrics variant");
        };
        assert!(ink_after >= ink_before);
        assert!(ink_before > 0);
        assert!(dilated.image().pixels().any(is_ink));
        assert!(dilated.image().pixels().any(|p| p.0[0] != INK));
    }
}
