//! Background segmentation by sparse colour clustering.
//!
//! The image is sampled on a regular grid, near-identical samples are
//! merged into clusters, and the cluster with the most members is taken
//! as the background colour. Every pixel close to that colour is painted
//! white.
//!
//! This is a heuristic stand-in for semantic segmentation. It has no
//! notion of objects: scenes with several background colours or heavy
//! texture will keep some background and may lose foreground pixels
//! that happen to share the dominant colour. That is a known
//! approximation of the approach.

use serde::{Deserialize, Serialize};

use crate::types::{PAPER, RgbaImage};

/// Spacing of the sampling grid in pixels.
pub const SAMPLE_STEP: u32 = 10;

/// Samples closer than this (Euclidean RGB distance) merge into one cluster.
pub const MERGE_DISTANCE: f32 = 50.0;

/// Pixels closer than this to the background colour are whited out.
pub const BACKGROUND_DISTANCE: f32 = 80.0;

/// One colour cluster found while sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCluster {
    /// Representative colour: the RGB of the sample that founded the cluster.
    pub color: [u8; 3],
    /// Coordinate of the founding sample.
    pub origin: (u32, u32),
    /// Number of samples merged into this cluster, including the founder.
    pub count: u32,
}

impl ColorCluster {
    /// Euclidean distance between this cluster's colour and `rgb`.
    #[must_use]
    pub fn distance_to(&self, rgb: [u8; 3]) -> f32 {
        color_distance(self.color, rgb)
    }
}

/// Result of a segmentation pass.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The image with background pixels painted white.
    pub image: RgbaImage,
    /// The cluster chosen as background, if the image had any samples.
    pub background: Option<ColorCluster>,
    /// Number of clusters left after merging.
    pub cluster_count: usize,
    /// Number of pixels painted white.
    pub cleared_pixels: u64,
}

/// Sample the grid and merge similar samples.
///
/// Each cluster absorbs every later cluster within [`MERGE_DISTANCE`] of
/// its own representative colour, in scan order. The representative is
/// never averaged.
#[must_use]
pub fn cluster_colors(image: &RgbaImage) -> Vec<ColorCluster> {
    let mut clusters: Vec<ColorCluster> = (0..image.height())
        .step_by(SAMPLE_STEP as usize)
        .flat_map(|y| {
            (0..image.width())
                .step_by(SAMPLE_STEP as usize)
                .map(move |x| (x, y))
        })
        .map(|(x, y)| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            ColorCluster {
                color: [r, g, b],
                origin: (x, y),
                count: 1,
            }
        })
        .collect();

    let mut i = 0;
    while i < clusters.len() {
        let mut j = i + 1;
        while j < clusters.len() {
            if clusters[i].distance_to(clusters[j].color) < MERGE_DISTANCE {
                clusters[i].count += clusters[j].count;
                clusters.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    clusters
}

/// The cluster with the most members; ties go to the earliest in scan order.
#[must_use]
pub fn background_cluster(clusters: &[ColorCluster]) -> Option<ColorCluster> {
    clusters
        .iter()
        .copied()
        .reduce(|best, c| if c.count > best.count { c } else { best })
}

/// White out every pixel close to the dominant sampled colour.
#[must_use = "returns the segmented image"]
pub fn segment_background(image: &RgbaImage) -> Segmentation {
    let clusters = cluster_colors(image);
    let background = background_cluster(&clusters);
    let mut out = image.clone();
    let mut cleared_pixels = 0_u64;

    if let Some(bg) = background {
        for pixel in out.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            if bg.distance_to([r, g, b]) < BACKGROUND_DISTANCE {
                pixel.0[..3].fill(PAPER);
                cleared_pixels += 1;
            }
        }
        tracing::trace!(
            clusters = clusters.len(),
            background = ?bg.color,
            members = bg.count,
            cleared_pixels,
            "background segmented"
        );
    }

    Segmentation {
        image: out,
        background,
        cluster_count: clusters.len(),
        cleared_pixels,
    }
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&p, q)| {
            let d = f32::from(p) - f32::from(q);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
