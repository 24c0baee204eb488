//! Render every detector and style combination side by side.

use crate::edge::EdgeDetectorKind;
use crate::settings::{Settings, Style};
use crate::types::{PipelineError, RgbaImage};

/// One combination's outcome.
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    /// `"<detector>/<style>"`, e.g. `"multi-scale/anime"`.
    pub method: String,
    /// The finished page, or why this combination failed.
    pub result: Result<RgbaImage, PipelineError>,
}

impl PreviewEntry {
    /// File-name friendly form of [`method`](Self::method), e.g.
    /// `"multi-scale-anime"`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.method.replace('/', "-")
    }
}

/// Render `source` once per [`EdgeDetectorKind`] × [`Style`].
///
/// Each combination runs on its own copy of `settings` (with only the
/// detector and style replaced) and its own random source. A failing
/// combination is recorded in its entry and does not stop the rest.
#[must_use]
pub fn preview_all(source: &RgbaImage, settings: &Settings) -> Vec<PreviewEntry> {
    EdgeDetectorKind::ALL
        .into_iter()
        .flat_map(|detector| Style::ALL.into_iter().map(move |style| (detector, style)))
        .map(|(edge_detector, style)| {
            let combo = Settings {
                edge_detector,
                style,
                ..settings.clone()
            };
            let method = format!("{edge_detector}/{style}");
            let result = crate::render(source, &combo);
            if let Err(ref e) = result {
                tracing::warn!(%method, error = %e, "preview failed");
            }
            PreviewEntry { method, result }
        })
        .collect()
}
