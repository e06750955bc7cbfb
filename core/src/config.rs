//! Tunable thresholds for analysis, classification and ground detection
//!
//! Every struct implements `Default` with the documented defaults and
//! deserializes with `#[serde(default)]`, so callers can override a single
//! field from JSON without restating the rest.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of clusters produced by every analysis
pub const CLUSTER_COUNT: usize = 5;

/// Bins in the value histogram (L* quantized to 0..=255)
pub const VALUE_BINS: usize = 256;

/// Bins in the hue histogram (whole degrees)
pub const HUE_BINS: usize = 360;

/// Top-level analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Half-width, in value bins, of the default value band around the peak
    pub value_band_half_width: u8,
    /// Pixels with chroma below this are kept out of the hue histogram and hue masks
    pub hue_neutral_chroma: f64,
    pub temperature: TemperatureParams,
    pub kmeans: KMeansConfig,
    pub ground: GroundHeuristic,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            value_band_half_width: 2,
            hue_neutral_chroma: 2.0,
            temperature: TemperatureParams::default(),
            kmeans: KMeansConfig::default(),
            ground: GroundHeuristic::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.hue_neutral_chroma.is_finite() || self.hue_neutral_chroma < 0.0 {
            return Err(CoreError::invalid(format!(
                "hueNeutralChroma must be a non-negative number, got {}",
                self.hue_neutral_chroma
            )));
        }
        self.temperature.validate()?;
        self.kmeans.validate()?;
        self.ground.validate()
    }
}

/// Warm/cool/neutral classification bands
///
/// A pixel is neutral when its chroma is below `neutral_chroma`; otherwise it
/// is warm when its hue lies within `warm_span` degrees of `warm_center`
/// (circular distance), and cool elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemperatureParams {
    pub warm_center: f64,
    pub warm_span: f64,
    pub neutral_chroma: f64,
}

impl Default for TemperatureParams {
    fn default() -> Self {
        Self {
            warm_center: 30.0,
            warm_span: 75.0,
            neutral_chroma: 8.0,
        }
    }
}

impl TemperatureParams {
    pub fn validate(&self) -> Result<()> {
        if !self.warm_center.is_finite() {
            return Err(CoreError::invalid("warmCenter must be finite"));
        }
        if !(0.0..=180.0).contains(&self.warm_span) {
            return Err(CoreError::invalid(format!(
                "warmSpan must be within 0..=180 degrees, got {}",
                self.warm_span
            )));
        }
        if !self.neutral_chroma.is_finite() || self.neutral_chroma < 0.0 {
            return Err(CoreError::invalid(format!(
                "neutralChroma must be a non-negative number, got {}",
                self.neutral_chroma
            )));
        }
        Ok(())
    }
}

/// K-means iteration limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KMeansConfig {
    /// Upper bound on the strided pixel sample used for fitting
    pub max_samples: usize,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this (ΔE)
    pub epsilon: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_samples: 20_000,
            max_iterations: 50,
            epsilon: 1e-3,
        }
    }
}

impl KMeansConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_samples < CLUSTER_COUNT {
            return Err(CoreError::invalid(format!(
                "maxSamples must be at least {CLUSTER_COUNT}, got {}",
                self.max_samples
            )));
        }
        if self.max_iterations == 0 {
            return Err(CoreError::invalid("maxIterations must be at least 1"));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(CoreError::invalid("epsilon must be a non-negative number"));
        }
        Ok(())
    }
}

/// Criteria for flagging a cluster as the painting's ground
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroundHeuristic {
    pub chroma_max: f64,
    pub l_min: f64,
    pub l_max: f64,
}

impl Default for GroundHeuristic {
    fn default() -> Self {
        Self {
            chroma_max: 8.0,
            l_min: 35.0,
            l_max: 65.0,
        }
    }
}

impl GroundHeuristic {
    pub fn validate(&self) -> Result<()> {
        if self.l_min.is_nan() || self.l_max.is_nan() || self.l_min > self.l_max {
            return Err(CoreError::invalid(format!(
                "ground value band is empty: {}..={}",
                self.l_min, self.l_max
            )));
        }
        if !self.chroma_max.is_finite() || self.chroma_max < 0.0 {
            return Err(CoreError::invalid("ground chromaMax must be a non-negative number"));
        }
        Ok(())
    }

    pub fn accepts(&self, lch: &crate::color::Lch) -> bool {
        lch.c < self.chroma_max && (self.l_min..=self.l_max).contains(&lch.l)
    }
}
