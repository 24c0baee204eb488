//! Render settings: validated, immutable per-request configuration.
//!
//! A [`Settings`] value is built once per request and passed by
//! reference through every stage. No stage mutates it.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::edge::EdgeDetectorKind;
use crate::types::PipelineError;

/// How much detail the page should keep.
///
/// Scales the effective edge threshold and controls how aggressively the
/// contour simplifier prunes pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Fewer, bolder lines; isolated specks are removed.
    Kids,
    /// Balanced detail.
    #[default]
    Normal,
    /// Maximum detail; the simplifier never erases pixels.
    Expert,
}

impl Complexity {
    /// Every complexity level, in increasing order of detail.
    pub const ALL: [Self; 3] = [Self::Kids, Self::Normal, Self::Expert];

    /// Factor applied to `edge_threshold` by the multi-scale extractor.
    #[must_use]
    pub const fn threshold_multiplier(self) -> f32 {
        match self {
            Self::Kids => 1.5,
            Self::Normal => 1.0,
            Self::Expert => 0.7,
        }
    }

    /// Lower-case name used in configuration and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kids => "kids",
            Self::Normal => "normal",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Complexity {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::InvalidSettings(format!("unknown complexity: {s:?}")))
    }
}

/// Final stylistic remap applied to the binary line art.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Hard re-binarization at the midpoint.
    Anime,
    /// Position-banded line weights.
    Manga,
    /// Random soft gray for every line pixel.
    Watercolor,
    /// Identity.
    #[default]
    None,
}

impl Style {
    /// Every style, in the order previews are generated.
    pub const ALL: [Self; 4] = [Self::Anime, Self::Manga, Self::Watercolor, Self::None];

    /// Lower-case name used in configuration and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
            Self::Watercolor => "watercolor",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::UnsupportedStyle(s.to_string()))
    }
}

/// Configuration for one coloring-page render.
///
/// Fields are public so hosts can use struct-update syntax, but
/// [`validate`](Self::validate) must succeed before any stage runs;
/// [`crate::render`] calls it on entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gradient magnitude above which a pixel becomes a line. Must be
    /// positive.
    pub edge_threshold: f32,

    /// Gaussian blur sigma. Zero disables the blur; negative is invalid.
    pub blur_strength: f32,

    /// Detail level.
    pub complexity: Complexity,

    /// Radius of the circular dilation element. 1 leaves lines as
    /// extracted; 0 is invalid.
    pub line_thickness: u32,

    /// Stylistic remap applied after smoothing.
    pub style: Style,

    /// Which edge extraction strategy to run.
    pub edge_detector: EdgeDetectorKind,

    /// Whether to run background segmentation after edge extraction.
    pub remove_background: bool,

    /// Seed for the randomized stages. `None` draws from OS entropy, so
    /// repeated renders differ under kids/normal complexity or the
    /// watercolor style.
    pub seed: Option<u64>,
}

impl Settings {
    /// Default [`edge_threshold`](Self::edge_threshold).
    pub const DEFAULT_EDGE_THRESHOLD: f32 = 50.0;
    /// Default [`blur_strength`](Self::blur_strength).
    pub const DEFAULT_BLUR_STRENGTH: f32 = 1.0;
    /// Default [`line_thickness`](Self::line_thickness).
    pub const DEFAULT_LINE_THICKNESS: u32 = 1;
    /// Default [`complexity`](Self::complexity).
    pub const DEFAULT_COMPLEXITY: Complexity = Complexity::Normal;
    /// Default [`style`](Self::style).
    pub const DEFAULT_STYLE: Style = Style::None;
    /// Default [`edge_detector`](Self::edge_detector).
    pub const DEFAULT_EDGE_DETECTOR: EdgeDetectorKind = EdgeDetectorKind::MultiScale;

    /// Check every field against its allowed range.
    ///
    /// Nothing is clamped: out-of-range values are reported, not fixed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] naming the first bad
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.edge_threshold.is_finite() || self.edge_threshold <= 0.0 {
            return Err(PipelineError::InvalidSettings(format!(
                "edge_threshold must be a positive number, got {}",
                self.edge_threshold
            )));
        }
        if !self.blur_strength.is_finite() || self.blur_strength < 0.0 {
            return Err(PipelineError::InvalidSettings(format!(
                "blur_strength must be zero or positive, got {}",
                self.blur_strength
            )));
        }
        if self.line_thickness == 0 {
            return Err(PipelineError::InvalidSettings(
                "line_thickness must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Random source for the randomized stages of one render.
    #[must_use]
    pub fn rng(&self) -> StdRng {
        self.seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            blur_strength: Self::DEFAULT_BLUR_STRENGTH,
            complexity: Self::DEFAULT_COMPLEXITY,
            line_thickness: Self::DEFAULT_LINE_THICKNESS,
            style: Self::DEFAULT_STYLE,
            edge_detector: Self::DEFAULT_EDGE_DETECTOR,
            remove_background: false,
            seed: None,
        }
    }
}
