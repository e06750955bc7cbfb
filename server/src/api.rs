//! Request and response bodies for the HTTP API
//!
//! Colors travel as plain arrays: `rgb` as `[r, g, b]` bytes, `lab` as
//! `[L, a, b]` and `lch` as `[L, C, H]`.

use groundfinder_core::{
    mask::{DEFAULT_GROUND_TOLERANCE, DEFAULT_HUE_TOLERANCE, DEFAULT_VALUE_TOLERANCE},
    palette::PaletteMatch,
    pigment::ColorMixture,
    Analysis, Cluster, GroundSelection, GroundSuggestion, Lab, MaskMode, PigmentMatch, Rgb,
    Temperature, TemperatureCounts, TemperatureParams, ValueMode, DEFAULT_GROUND_INSIDE_TOLERANCE,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Summary returned after an upload is analyzed
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// Identifier for follow-up mask and ground requests
    pub analysis_id: String,
    /// Size of the analysis buffer
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// Analysis size over original size
    pub scale: f64,
    /// 256 bins of quantized L*
    pub value_histogram: Vec<u64>,
    /// 360 whole-degree hue bins; near-neutral pixels are counted in `hueNeutral`
    pub hue_histogram: Vec<u64>,
    pub hue_neutral: u64,
    #[schema(value_type = Object)]
    pub value_mode: ValueMode,
    pub clusters: Vec<ClusterBody>,
    /// Rank of the cluster that looks like a toned ground
    pub detected_ground: Option<usize>,
    #[schema(value_type = Object)]
    pub temperature: TemperatureCounts,
    #[schema(value_type = Vec<Object>)]
    pub ground_suggestions: Vec<GroundSuggestion>,
}

/// One ranked color cluster
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBody {
    pub rank: usize,
    pub lab: [f64; 3],
    pub lch: [f64; 3],
    pub rgb: [u8; 3],
    pub hex: String,
    pub pixel_count: u64,
    pub percentage: f64,
    pub temperature: String,
}

impl ClusterBody {
    pub fn new(rank: usize, cluster: &Cluster, params: &TemperatureParams) -> Self {
        let rgb = cluster.center.to_rgb();
        Self {
            rank,
            lab: cluster.center.as_array(),
            lch: cluster.center_lch.as_array(),
            rgb: rgb.as_array(),
            hex: rgb.to_hex(),
            pixel_count: cluster.pixel_count,
            percentage: cluster.percentage,
            temperature: Temperature::classify(&cluster.center_lch, params).to_string(),
        }
    }
}

/// Mask selection for `/mask/{view}`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaskRequest {
    pub analysis_id: String,
    #[serde(flatten)]
    pub mode: MaskModeBody,
}

/// Selection criterion, tagged by `mode`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MaskModeBody {
    /// Value band in 0..=255 bins; defaults to the histogram peak ± 2
    Value {
        center: Option<u8>,
        tolerance: Option<u8>,
    },
    /// Hue in degrees with a tolerance (default 12)
    Hue { hue: f64, tolerance: Option<f64> },
    /// Cluster by rank
    Cluster { rank: usize },
    /// `warm`, `cool` or `neutral`; unset thresholds come from the analysis
    #[serde(rename_all = "camelCase")]
    Temperature {
        category: String,
        warm_center: Option<f64>,
        warm_span: Option<f64>,
        neutral_chroma: Option<f64>,
    },
    /// Ground color: an explicit `lab`, a cluster `rank`, or the detected ground
    Ground {
        rank: Option<usize>,
        lab: Option<[f64; 3]>,
        tolerance: Option<f64>,
    },
}

impl MaskModeBody {
    /// Fill defaults from the analysis and build the core mask mode
    pub fn into_mode(self, analysis: &Analysis) -> Result<MaskMode, AppError> {
        Ok(match self {
            MaskModeBody::Value { center, tolerance } => MaskMode::Value {
                center: center.unwrap_or(analysis.value_mode().peak_bin),
                tolerance: tolerance.unwrap_or(DEFAULT_VALUE_TOLERANCE),
            },
            MaskModeBody::Hue { hue, tolerance } => MaskMode::Hue {
                hue,
                tolerance: tolerance.unwrap_or(DEFAULT_HUE_TOLERANCE),
            },
            MaskModeBody::Cluster { rank } => MaskMode::Cluster { rank },
            MaskModeBody::Temperature {
                category,
                warm_center,
                warm_span,
                neutral_chroma,
            } => {
                let defaults = analysis.config().temperature;
                let params = TemperatureParams {
                    warm_center: warm_center.unwrap_or(defaults.warm_center),
                    warm_span: warm_span.unwrap_or(defaults.warm_span),
                    neutral_chroma: neutral_chroma.unwrap_or(defaults.neutral_chroma),
                };
                params.validate()?;
                MaskMode::Temperature {
                    category: category.parse()?,
                    params,
                }
            }
            MaskModeBody::Ground {
                rank,
                lab,
                tolerance,
            } => MaskMode::Ground {
                selection: ground_selection(rank, lab),
                tolerance: tolerance.unwrap_or(DEFAULT_GROUND_TOLERANCE),
            },
        })
    }
}

/// Ground-inside-forms query
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroundInsideRequest {
    pub analysis_id: String,
    /// Cluster rank to use as ground; ignored when `lab` is given
    pub rank: Option<usize>,
    pub lab: Option<[f64; 3]>,
    /// ΔE tolerance, default 6
    pub tolerance: Option<f64>,
}

impl GroundInsideRequest {
    pub fn mode(&self) -> MaskMode {
        MaskMode::Ground {
            selection: ground_selection(self.rank, self.lab),
            tolerance: self.tolerance.unwrap_or(DEFAULT_GROUND_INSIDE_TOLERANCE),
        }
    }
}

/// An explicit Lab wins over a rank; neither means the detected ground
fn ground_selection(rank: Option<usize>, lab: Option<[f64; 3]>) -> GroundSelection {
    match (lab, rank) {
        (Some([l, a, b]), _) => GroundSelection::Lab(Lab::new(l, a, b)),
        (None, Some(rank)) => GroundSelection::Cluster(rank),
        (None, None) => GroundSelection::Detected,
    }
}

/// A sampled color, as `rgb` bytes or a `#RRGGBB` string
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorRequest {
    pub rgb: Option<[u8; 3]>,
    pub hex: Option<String>,
    /// Palette matches to return (match-color only), default 3
    pub top: Option<usize>,
}

impl ColorRequest {
    pub fn color(&self) -> Result<Rgb, AppError> {
        match (&self.rgb, &self.hex) {
            (Some(rgb), _) => Ok(Rgb::from(*rgb)),
            (None, Some(hex)) => Ok(Rgb::from_hex(hex)?),
            (None, None) => Err(AppError::InvalidRequest(
                "either rgb or hex is required".to_string(),
            )),
        }
    }
}

/// Swatch description plus the nearest curated ground mixes
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchColorResponse {
    pub rgb: [u8; 3],
    pub hex: String,
    pub lab: [f64; 3],
    pub lch: [f64; 3],
    pub temperature: String,
    #[schema(value_type = Vec<Object>)]
    pub palette_matches: Vec<PaletteMatch>,
}

/// Closest pigment mixture for a sampled color
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PigmentMatchResponse {
    pub target_rgb: [u8; 3],
    pub result_rgb: [u8; 3],
    pub hex: String,
    pub lab: [f64; 3],
    pub lch: [f64; 3],
    pub recipe: String,
    pub delta_e: f64,
    /// 0..=100, higher is closer
    pub similarity: f64,
    #[schema(value_type = Object)]
    pub mixture: ColorMixture,
}

impl PigmentMatchResponse {
    pub fn new(target: Rgb, found: PigmentMatch) -> Self {
        Self {
            target_rgb: target.as_array(),
            result_rgb: found.result_rgb.as_array(),
            hex: found.hex,
            lab: found.lab.as_array(),
            lch: found.lch.as_array(),
            recipe: found.recipe,
            delta_e: found.delta_e,
            similarity: found.similarity,
            mixture: found.mixture,
        }
    }
}
