//! One full pass over an image: planes, histograms, clusters and ground
//!
//! [`analyze`] produces an immutable [`Analysis`] that every later query
//! (masks, ground resolution, value-step suggestions) reads from.

use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::cluster::{cluster_pixels, detect_ground, Cluster};
use crate::color::{Lab, Lch, Rgb};
use crate::config::{AnalysisConfig, CLUSTER_COUNT};
use crate::error::{CoreError, Result};
use crate::mask::GroundSelection;
use crate::palette::{GroundPalette, PaletteMatch, DEFAULT_MATCHES};
use crate::stats::{
    ColorPlanes, HueHistogram, Temperature, TemperatureCounts, ValueHistogram, ValueMode,
};

/// Number of equal-width value steps over L* 0..=100
pub const VALUE_STEPS: usize = 9;

const VALUE_STEP_LABELS: [&str; VALUE_STEPS] = [
    "Deep shadow",
    "Shadow",
    "Low mid",
    "Mid",
    "High mid",
    "Light",
    "High light",
    "Very light",
    "Highlight",
];

/// Everything derived from one analysis buffer
#[derive(Debug, Clone)]
pub struct Analysis {
    planes: ColorPlanes,
    value_histogram: ValueHistogram,
    hue_histogram: HueHistogram,
    value_mode: ValueMode,
    clusters: Vec<Cluster>,
    labels: Vec<u8>,
    detected_ground: Option<usize>,
    temperature_counts: TemperatureCounts,
    config: AnalysisConfig,
}

/// A populated value step, summarised for choosing a ground
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundSuggestion {
    /// 1-based step, darkest first
    pub value_step: u8,
    pub value_label: &'static str,
    /// Share of pixels in this step, 0.0..=1.0
    pub coverage: f64,
    pub mean_lab: Lab,
    pub mean_lch: Lch,
    pub rgb: Rgb,
    pub hex: String,
    pub temperature: Temperature,
    pub palette_matches: Vec<PaletteMatch>,
}

/// Analyze `image` with the given thresholds
pub fn analyze(image: &RgbImage, config: &AnalysisConfig) -> Result<Analysis> {
    config.validate()?;
    let planes = ColorPlanes::from_image(image)?;

    let value_histogram = ValueHistogram::from_planes(&planes);
    let hue_histogram = HueHistogram::from_planes(&planes, config.hue_neutral_chroma);
    let value_mode = value_histogram.mode(config.value_band_half_width);
    let temperature_counts = TemperatureCounts::from_planes(&planes, &config.temperature);

    let clustering = cluster_pixels(&planes, &config.kmeans);
    let detected_ground = detect_ground(&clustering.clusters, &config.ground);

    let populated = clustering
        .clusters
        .iter()
        .filter(|c| c.pixel_count > 0)
        .count();
    if populated < CLUSTER_COUNT {
        tracing::warn!(
            "only {} of {} clusters populated; image has few distinct colors",
            populated,
            CLUSTER_COUNT
        );
    }
    tracing::debug!(
        "analyzed {}x{}: value peak {}, ground {:?}, {} k-means iterations",
        planes.width(),
        planes.height(),
        value_mode.peak_bin,
        detected_ground,
        clustering.iterations
    );

    Ok(Analysis {
        planes,
        value_histogram,
        hue_histogram,
        value_mode,
        clusters: clustering.clusters,
        labels: clustering.labels,
        detected_ground,
        temperature_counts,
        config: config.clone(),
    })
}

impl Analysis {
    pub fn width(&self) -> u32 {
        self.planes.width()
    }

    pub fn height(&self) -> u32 {
        self.planes.height()
    }

    pub fn planes(&self) -> &ColorPlanes {
        &self.planes
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn value_histogram(&self) -> &ValueHistogram {
        &self.value_histogram
    }

    pub fn hue_histogram(&self) -> &HueHistogram {
        &self.hue_histogram
    }

    pub fn value_mode(&self) -> ValueMode {
        self.value_mode
    }

    /// Clusters in rank order
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Cluster rank of every pixel, row-major
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn detected_ground(&self) -> Option<usize> {
        self.detected_ground
    }

    pub fn temperature_counts(&self) -> TemperatureCounts {
        self.temperature_counts
    }

    /// Lab color a ground selection refers to
    pub fn resolve_ground(&self, selection: &GroundSelection) -> Result<Lab> {
        match *selection {
            GroundSelection::Detected => self
                .detected_ground
                .map(|rank| self.clusters[rank].center)
                .ok_or_else(|| CoreError::invalid("no ground cluster was detected")),
            GroundSelection::Cluster(rank) => self
                .clusters
                .get(rank)
                .map(|c| c.center)
                .ok_or_else(|| {
                    CoreError::invalid(format!(
                        "cluster rank {} out of range (0..{})",
                        rank,
                        self.clusters.len()
                    ))
                }),
            GroundSelection::Lab(lab) => {
                if lab.as_array().iter().all(|v| v.is_finite()) {
                    Ok(lab)
                } else {
                    Err(CoreError::invalid("ground Lab components must be finite"))
                }
            }
        }
    }

    /// Populated value steps by descending coverage, each with its nearest palette mixes
    pub fn ground_suggestions(&self, palette: &GroundPalette, top_n: usize) -> Vec<GroundSuggestion> {
        let total = self.planes.len() as f64;

        // (count, ΣL, Σa, Σb) per step
        let sums = self
            .planes
            .lab()
            .par_iter()
            .fold(
                || [(0u64, 0.0f64, 0.0f64, 0.0f64); VALUE_STEPS],
                |mut acc, lab| {
                    let slot = &mut acc[value_step(lab.l)];
                    slot.0 += 1;
                    slot.1 += lab.l;
                    slot.2 += lab.a;
                    slot.3 += lab.b;
                    acc
                },
            )
            .reduce(
                || [(0u64, 0.0f64, 0.0f64, 0.0f64); VALUE_STEPS],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        x.0 += y.0;
                        x.1 += y.1;
                        x.2 += y.2;
                        x.3 += y.3;
                    }
                    a
                },
            );

        let mut suggestions: Vec<GroundSuggestion> = sums
            .iter()
            .enumerate()
            .filter(|(_, s)| s.0 > 0)
            .map(|(step, &(count, l, a, b))| {
                let n = count as f64;
                let mean_lab = Lab::new(l / n, a / n, b / n);
                let mean_lch = mean_lab.to_lch();
                let rgb = mean_lab.to_rgb();
                GroundSuggestion {
                    value_step: step as u8 + 1,
                    value_label: VALUE_STEP_LABELS[step],
                    coverage: n / total,
                    mean_lab,
                    mean_lch,
                    rgb,
                    hex: rgb.to_hex(),
                    temperature: Temperature::classify(&mean_lch, &self.config.temperature),
                    palette_matches: Vec::new(),
                }
            })
            .collect();

        // Stable, so equal coverage keeps the darker step first
        suggestions.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
        suggestions.truncate(top_n);
        for suggestion in &mut suggestions {
            suggestion.palette_matches = palette.match_palette(suggestion.mean_lab, DEFAULT_MATCHES);
        }
        suggestions
    }
}

/// Zero-based value step of an L* value; 100 falls in the last step
fn value_step(l: f64) -> usize {
    let step = (l.clamp(0.0, 100.0) * VALUE_STEPS as f64 / 100.0).floor() as usize;
    step.min(VALUE_STEPS - 1)
}
