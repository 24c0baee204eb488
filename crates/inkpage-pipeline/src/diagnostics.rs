//! Render diagnostics: timing and pixel counts for each stage.
//!
//! The core never reads a clock on its own. Hosts that want timings pass
//! a [`Clock`] to [`render_with_diagnostics`](crate::render_with_diagnostics);
//! plain [`render`](crate::render) uses [`NoClock`] and reports zero
//! durations.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::settings::Settings;
use crate::types::{Dimensions, PipelineError, RgbaImage, count_ink_pixels};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) -> Self::Instant {}

    fn elapsed(&self, _since: &Self::Instant) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single render.
///
/// The segmentation stage is optional and is `None` when
/// `remove_background` is off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderDiagnostics {
    /// Stage 1: grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: Gaussian blur.
    pub blur: StageDiagnostics,
    /// Stage 3: edge extraction.
    pub edge_detection: StageDiagnostics,
    /// Stage 4: background segmentation.
    pub segmentation: Option<StageDiagnostics>,
    /// Stage 5: contour simplification.
    pub simplification: StageDiagnostics,
    /// Stage 6: line smoothing.
    pub smoothing: StageDiagnostics,
    /// Stage 7: style rendering.
    pub style: StageDiagnostics,
    /// Stage 8: line-thickness dilation.
    pub dilation: StageDiagnostics,
    /// Total wall-clock duration of the render (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: RenderSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Gaussian blur metrics.
    Blur {
        /// Sigma used for the kernel.
        sigma: f32,
        /// Kernel radius, or `None` when sigma was not positive.
        kernel_radius: Option<usize>,
    },
    /// Edge extraction metrics.
    EdgeDetection {
        /// Which strategy ran.
        detector: String,
        /// Threshold after any complexity adjustment.
        effective_threshold: f32,
        /// Number of line pixels produced.
        ink_pixel_count: u64,
        /// Total pixel count for computing line density.
        total_pixel_count: u64,
    },
    /// Background segmentation metrics.
    Segmentation {
        /// Clusters left after merging.
        cluster_count: usize,
        /// Colour of the chosen background cluster.
        background: Option<[u8; 3]>,
        /// Pixels forced to white.
        cleared_pixels: u64,
    },
    /// Contour simplification metrics.
    Simplification {
        /// Complexity level applied.
        complexity: String,
        /// Isolated specks removed.
        isolated_removed: u64,
        /// Dense-clump pixels thinned.
        thinned: u64,
        /// Line pixels after the stage.
        ink_after: u64,
    },
    /// Line smoothing metrics.
    Smoothing {
        /// Number of passes run.
        passes: usize,
        /// Line pixels before smoothing.
        ink_before: u64,
        /// Line pixels after smoothing.
        ink_after: u64,
    },
    /// Style rendering metrics.
    Style {
        /// Style applied.
        style: String,
        /// Pure-black pixels after styling.
        ink_after: u64,
    },
    /// Dilation metrics.
    Dilation {
        /// Structuring-element radius.
        thickness: u32,
        /// Line pixels before dilation.
        ink_before: u64,
        /// Line pixels after dilation.
        ink_after: u64,
    },
}

/// High-level summary for the whole render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pure-black pixels in the final page.
    pub final_ink_pixel_count: u64,
}

impl RenderDiagnostics {
    /// Stages in execution order, skipping those that did not run.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            ("Grayscale", &self.grayscale),
            ("Blur", &self.blur),
            ("Edge Detection", &self.edge_detection),
        ];
        if let Some(ref seg) = self.segmentation {
            stages.push(("Segmentation", seg));
        }
        stages.push(("Simplification", &self.simplification));
        stages.push(("Smoothing", &self.smoothing));
        stages.push(("Style", &self.style));
        stages.push(("Dilation", &self.dilation));
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Render Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Final line pixels: {}",
            self.summary.final_ink_pixel_count
        ));

        lines.join("\n")
    }
}

/// Run `f`, returning the stage it produced and its diagnostics.
fn timed<C: Clock, S: PipelineStage>(clock: &C, f: impl FnOnce() -> S) -> (S, StageDiagnostics) {
    let start = clock.now();
    let stage = f();
    let diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: stage.metrics(),
    };
    (stage, diag)
}

/// Render a coloring page, timing every stage with `clock`.
///
/// Produces exactly the page [`crate::render`] would for the same
/// settings and seed.
///
/// # Errors
///
/// Same as [`crate::render`].
pub fn render_with_diagnostics<C: Clock>(
    source: &RgbaImage,
    settings: &Settings,
    clock: &C,
) -> Result<(RgbaImage, RenderDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = Pipeline::new(source, settings.clone())?;
    let dimensions = Dimensions::of(source);

    let (gray, grayscale) = timed(clock, || pending.grayscale());
    let (blurred, blur) = timed(clock, || gray.blur());
    let (edges, edge_detection) = timed(clock, || blurred.detect_edges());
    let (background, segmentation) = timed(clock, || edges.remove_background());
    let segmentation = background.applied().then_some(segmentation);
    let (simplified, simplification) = timed(clock, || background.simplify());
    let (smoothed, smoothing) = timed(clock, || simplified.smooth());
    let (styled, style) = timed(clock, || smoothed.stylize());
    let (dilated, dilation) = timed(clock, || styled.dilate());
    let page = dilated.into_image();

    let diagnostics = RenderDiagnostics {
        grayscale,
        blur,
        edge_detection,
        segmentation,
        simplification,
        smoothing,
        style,
        dilation,
        total_duration: clock.elapsed(&total_start),
        summary: RenderSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            final_ink_pixel_count: count_ink_pixels(&page),
        },
    };
    tracing::info!(
        total_ms = duration_ms(diagnostics.total_duration),
        final_ink_pixels = diagnostics.summary.final_ink_pixel_count,
        "render finished"
    );
    Ok((page, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Blur {
            sigma,
            kernel_radius,
        } => match kernel_radius {
            Some(r) => format!("sigma={sigma:.2} radius={r}"),
            None => "skipped".to_string(),
        },
        StageMetrics::EdgeDetection {
            detector,
            effective_threshold,
            ink_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *ink_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "{detector} threshold={effective_threshold:.1} lines={ink_pixel_count} ({density:.1}%)"
            )
        }
        StageMetrics::Segmentation {
            cluster_count,
            background,
            cleared_pixels,
        } => match background {
            Some([r, g, b]) => format!(
                "{cluster_count} clusters, background=({r},{g},{b}) cleared={cleared_pixels}"
            ),
            None => format!("{cluster_count} clusters, no background"),
        },
        StageMetrics::Simplification {
            complexity,
            isolated_removed,
            thinned,
            ink_after,
        } => format!(
            "{complexity} isolated={isolated_removed} thinned={thinned} lines={ink_after}"
        ),
        StageMetrics::Smoothing {
            passes,
            ink_before,
            ink_after,
        } => format!("{passes} passes {ink_before}->{ink_after} lines"),
        StageMetrics::Style { style, ink_after } => format!("{style} black={ink_after}"),
        StageMetrics::Dilation {
            thickness,
            ink_before,
            ink_after,
        } => format!("t={thickness} {ink_before}->{ink_after} lines"),
    }
}
