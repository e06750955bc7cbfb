//! Per-pixel selection masks and the overlay views rendered from them
//!
//! A [`MaskMode`] carries its own parameters; [`classify_mask`] decides
//! membership for every pixel of the analysis buffer with one exhaustive
//! match. Views are rendered at whatever resolution the base image has, with
//! the mask upsampled nearest-neighbour to fit.

use image::{RgbImage, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::color::{hue_distance, Lab};
use crate::config::TemperatureParams;
use crate::error::{CoreError, Result};
use crate::stats::{value_bin, Temperature};

/// Overlay color blended into selected pixels by the highlight view
pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 64, 64];

/// Share of the overlay color in a highlighted pixel
const HIGHLIGHT_WEIGHT: f64 = 0.6;

/// Alpha of unselected pixels in the wash view (15% of 255)
pub const WASH_ALPHA: u8 = 38;

/// Allowed value-band tolerance, in value bins
pub const VALUE_TOLERANCE_RANGE: std::ops::RangeInclusive<u8> = 1..=20;

pub const DEFAULT_VALUE_TOLERANCE: u8 = 2;
pub const DEFAULT_HUE_TOLERANCE: f64 = 12.0;
pub const DEFAULT_GROUND_TOLERANCE: f64 = 7.5;

/// Where the ground color comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundSelection {
    /// The cluster flagged by the ground heuristic
    Detected,
    /// Any cluster, by rank
    Cluster(usize),
    /// An explicit Lab color
    Lab(Lab),
}

/// Selection criterion with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskMode {
    /// Quantized L* within `center ± tolerance` value bins
    Value { center: u8, tolerance: u8 },
    /// Hue within `tolerance` degrees of `hue`, chromatic pixels only
    Hue { hue: f64, tolerance: f64 },
    /// Pixels whose nearest cluster has this rank
    Cluster { rank: usize },
    Temperature {
        category: Temperature,
        params: TemperatureParams,
    },
    /// ΔE to the resolved ground color within `tolerance`
    Ground {
        selection: GroundSelection,
        tolerance: f64,
    },
}

impl MaskMode {
    pub fn name(&self) -> &'static str {
        match self {
            MaskMode::Value { .. } => "value",
            MaskMode::Hue { .. } => "hue",
            MaskMode::Cluster { .. } => "cluster",
            MaskMode::Temperature { .. } => "temperature",
            MaskMode::Ground { .. } => "ground",
        }
    }
}

/// Rendering style for a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Highlight,
    Wash,
    Extract,
}

impl View {
    pub const ALL: [View; 3] = [View::Highlight, View::Wash, View::Extract];
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Highlight => write!(f, "highlight"),
            View::Wash => write!(f, "wash"),
            View::Extract => write!(f, "extract"),
        }
    }
}

impl std::str::FromStr for View {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        View::ALL
            .into_iter()
            .find(|view| view.to_string() == s)
            .ok_or_else(|| CoreError::invalid(format!("unknown view: {s}")))
    }
}

/// Boolean selection over a pixel grid
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    selected: Vec<bool>,
    mode: Option<MaskMode>,
}

impl Mask {
    pub fn new(width: u32, height: u32, selected: Vec<bool>) -> Result<Self> {
        if selected.len() != width as usize * height as usize {
            return Err(CoreError::invalid(format!(
                "mask has {} entries for a {}x{} grid",
                selected.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            selected,
            mode: None,
        })
    }

    pub fn with_mode(mut self, mode: MaskMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> Option<&MaskMode> {
        self.mode.as_ref()
    }

    pub fn selected(&self) -> &[bool] {
        &self.selected
    }

    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.selected[(y * self.width + x) as usize]
    }

    pub fn count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Nearest-neighbour resample onto a `width` x `height` grid; an empty
    /// source selects nothing
    pub fn resized(&self, width: u32, height: u32) -> Mask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.selected.is_empty() {
            return Mask {
                width,
                height,
                selected: vec![false; width as usize * height as usize],
                mode: self.mode,
            };
        }

        let src_w = self.width as u64;
        let src_h = self.height as u64;
        let selected = (0..height as u64)
            .into_par_iter()
            .flat_map_iter(|y| {
                let sy = (y * src_h / height as u64) as usize;
                let row = &self.selected[sy * src_w as usize..(sy + 1) * src_w as usize];
                (0..width as u64).map(move |x| row[(x * src_w / width as u64) as usize])
            })
            .collect();

        Mask {
            width,
            height,
            selected,
            mode: self.mode,
        }
    }

    /// Pixels selected in both masks; grids must match
    pub fn intersect(&self, other: &[bool]) -> Result<Mask> {
        if other.len() != self.selected.len() {
            return Err(CoreError::invalid("cannot intersect masks of different sizes"));
        }
        Ok(Mask {
            width: self.width,
            height: self.height,
            selected: self
                .selected
                .par_iter()
                .zip(other)
                .map(|(&a, &b)| a && b)
                .collect(),
            mode: self.mode,
        })
    }
}

/// Highlight, wash and extract renderings of one mask
#[derive(Debug, Clone)]
pub struct MaskViews {
    pub highlight: RgbaImage,
    pub wash: RgbaImage,
    pub extract: RgbaImage,
}

/// Per-pixel membership for `mode` over the analysis buffer
pub fn classify_mask(analysis: &Analysis, mode: &MaskMode) -> Result<Mask> {
    let planes = analysis.planes();

    let selected: Vec<bool> = match *mode {
        MaskMode::Value { center, tolerance } => {
            if !VALUE_TOLERANCE_RANGE.contains(&tolerance) {
                return Err(CoreError::invalid(format!(
                    "value tolerance must be within {}..={} bins, got {}",
                    VALUE_TOLERANCE_RANGE.start(),
                    VALUE_TOLERANCE_RANGE.end(),
                    tolerance
                )));
            }
            let lower = center.saturating_sub(tolerance) as usize;
            let upper = center.saturating_add(tolerance) as usize;
            planes
                .lab()
                .par_iter()
                .map(|lab| (lower..=upper).contains(&value_bin(lab.l)))
                .collect()
        }
        MaskMode::Hue { hue, tolerance } => {
            if !hue.is_finite() {
                return Err(CoreError::invalid("hue must be a finite angle"));
            }
            if !(0.0..=180.0).contains(&tolerance) {
                return Err(CoreError::invalid(format!(
                    "hue tolerance must be within 0..=180 degrees, got {tolerance}"
                )));
            }
            let neutral = analysis.config().hue_neutral_chroma;
            planes
                .lch()
                .par_iter()
                .map(|lch| lch.c >= neutral && hue_distance(lch.h, hue) <= tolerance)
                .collect()
        }
        MaskMode::Cluster { rank } => {
            if rank >= analysis.clusters().len() {
                return Err(CoreError::invalid(format!(
                    "cluster rank {} out of range (0..{})",
                    rank,
                    analysis.clusters().len()
                )));
            }
            analysis
                .labels()
                .par_iter()
                .map(|&label| label as usize == rank)
                .collect()
        }
        MaskMode::Temperature { category, params } => {
            params.validate()?;
            planes
                .lch()
                .par_iter()
                .map(|lch| Temperature::classify(lch, &params) == category)
                .collect()
        }
        MaskMode::Ground {
            selection,
            tolerance,
        } => {
            let target = analysis.resolve_ground(&selection)?;
            within_delta_e(planes.lab(), target, tolerance)?
        }
    };

    let mask = Mask::new(planes.width(), planes.height(), selected)?.with_mode(*mode);
    tracing::debug!(
        "{} mask selected {} of {} pixels",
        mode.name(),
        mask.count(),
        planes.len()
    );
    Ok(mask)
}

/// Pixels within `tolerance` ΔE of `target`
pub fn within_delta_e(lab: &[Lab], target: Lab, tolerance: f64) -> Result<Vec<bool>> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(CoreError::invalid(format!(
            "ground tolerance must be a non-negative number, got {tolerance}"
        )));
    }
    let limit = tolerance * tolerance;
    Ok(lab
        .par_iter()
        .map(|l| l.distance_squared(&target) <= limit)
        .collect())
}

/// Render one view of `mask` over `base`, upsampling the mask to fit
pub fn render_view(base: &RgbImage, mask: &Mask, view: View) -> RgbaImage {
    let (width, height) = base.dimensions();
    let mask = mask.resized(width, height);
    let mut out = RgbaImage::new(width, height);

    out.par_chunks_exact_mut(4)
        .zip(base.par_chunks_exact(3))
        .zip(mask.selected().par_iter())
        .for_each(|((dst, src), &selected)| {
            let [r, g, b] = [src[0], src[1], src[2]];
            let pixel = match (view, selected) {
                (View::Highlight, true) => [
                    blend(HIGHLIGHT_COLOR[0], r),
                    blend(HIGHLIGHT_COLOR[1], g),
                    blend(HIGHLIGHT_COLOR[2], b),
                    255,
                ],
                (View::Highlight, false) | (View::Wash, true) | (View::Extract, true) => {
                    [r, g, b, 255]
                }
                (View::Wash, false) => [r, g, b, WASH_ALPHA],
                (View::Extract, false) => [r, g, b, 0],
            };
            dst.copy_from_slice(&pixel);
        });

    out
}

/// All three views of `mask` over `base`
pub fn render_views(base: &RgbImage, mask: &Mask) -> MaskViews {
    let full = mask.resized(base.width(), base.height());
    MaskViews {
        highlight: render_view(base, &full, View::Highlight),
        wash: render_view(base, &full, View::Wash),
        extract: render_view(base, &full, View::Extract),
    }
}

/// Classify on the analysis buffer and render at the original resolution
pub fn classify_and_render(
    analysis: &Analysis,
    original: &RgbImage,
    mode: &MaskMode,
) -> Result<MaskViews> {
    let mask = classify_mask(analysis, mode)?;
    Ok(render_views(original, &mask))
}

#[inline]
fn blend(overlay: u8, base: u8) -> u8 {
    (HIGHLIGHT_WEIGHT * overlay as f64 + (1.0 - HIGHLIGHT_WEIGHT) * base as f64)
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::color::{Lch, Rgb as Color};
    use crate::config::AnalysisConfig;
    use image::Rgb;

    /// Left half mid gray, right half a saturated teal, bottom row red
    fn sample_image() -> RgbImage {
        RgbImage::from_fn(8, 6, |x, y| {
            if y == 5 {
                Rgb([210, 40, 40])
            } else if x < 4 {
                Rgb([119, 119, 119])
            } else {
                Rgb([20, 150, 150])
            }
        })
    }

    fn sample_analysis() -> Analysis {
        analyze(&sample_image(), &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_value_mask_selects_gray_band() {
        let analysis = sample_analysis();
        let gray_bin = value_bin(Color::new(119, 119, 119).to_lab().l) as u8;
        let mask = classify_mask(
            &analysis,
            &MaskMode::Value {
                center: gray_bin,
                tolerance: 1,
            },
        )
        .unwrap();

        assert!(mask.is_selected(0, 0));
        assert!(!mask.is_selected(0, 5));
        assert_eq!(mask.mode().map(MaskMode::name), Some("value"));
    }

    #[test]
    fn test_value_tolerance_out_of_range() {
        let analysis = sample_analysis();
        for tolerance in [0u8, 21] {
            let err = classify_mask(&analysis, &MaskMode::Value { center: 100, tolerance });
            assert!(matches!(err, Err(CoreError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_hue_mask_excludes_neutrals() {
        let analysis = sample_analysis();
        let teal_hue = Color::new(20, 150, 150).to_lch().h;
        let mask = classify_mask(
            &analysis,
            &MaskMode::Hue {
                hue: teal_hue,
                tolerance: 180.0,
            },
        )
        .unwrap();

        // Every chromatic pixel is within 180°, grays never are
        assert!(mask.is_selected(5, 0));
        assert!(mask.is_selected(0, 5));
        assert!(!mask.is_selected(0, 0));

        let narrow = classify_mask(
            &analysis,
            &MaskMode::Hue {
                hue: teal_hue,
                tolerance: 5.0,
            },
        )
        .unwrap();
        assert_eq!(narrow.count(), 20);
    }

    #[test]
    fn test_hue_mask_wraps_around_zero() {
        let image = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                // Hue just below 360
                Rgb(Lch::new(50.0, 40.0, 355.0).to_lab().to_rgb().as_array())
            } else {
                Rgb(Lch::new(50.0, 40.0, 180.0).to_lab().to_rgb().as_array())
            }
        });
        let analysis = analyze(&image, &AnalysisConfig::default()).unwrap();
        let mask = classify_mask(
            &analysis,
            &MaskMode::Hue {
                hue: 5.0,
                tolerance: 15.0,
            },
        )
        .unwrap();
        assert!(mask.is_selected(0, 0));
        assert!(!mask.is_selected(1, 0));
    }

    #[test]
    fn test_negative_tolerances_rejected() {
        let analysis = sample_analysis();
        assert!(classify_mask(&analysis, &MaskMode::Hue { hue: 10.0, tolerance: -1.0 }).is_err());
        assert!(classify_mask(
            &analysis,
            &MaskMode::Ground {
                selection: GroundSelection::Lab(Lab::new(50.0, 0.0, 0.0)),
                tolerance: -0.5,
            }
        )
        .is_err());
        assert!(classify_mask(&analysis, &MaskMode::Cluster { rank: 5 }).is_err());
    }

    #[test]
    fn test_cluster_masks_partition_pixels() {
        let analysis = sample_analysis();
        let masks: Vec<Mask> = (0..analysis.clusters().len())
            .map(|rank| classify_mask(&analysis, &MaskMode::Cluster { rank }).unwrap())
            .collect();

        for i in 0..analysis.planes().len() {
            let hits = masks.iter().filter(|m| m.selected()[i]).count();
            assert_eq!(hits, 1);
        }
        for (rank, mask) in masks.iter().enumerate() {
            assert_eq!(mask.count() as u64, analysis.clusters()[rank].pixel_count);
            for (i, &s) in mask.selected().iter().enumerate() {
                assert_eq!(s, analysis.labels()[i] as usize == rank);
            }
        }
    }

    #[test]
    fn test_temperature_mask() {
        let analysis = sample_analysis();
        let mask = classify_mask(
            &analysis,
            &MaskMode::Temperature {
                category: Temperature::Neutral,
                params: TemperatureParams::default(),
            },
        )
        .unwrap();
        assert_eq!(mask.count(), 20);
    }

    #[test]
    fn test_ground_mask_with_explicit_lab() {
        let analysis = sample_analysis();
        let gray = Color::new(119, 119, 119).to_lab();
        let mask = classify_mask(
            &analysis,
            &MaskMode::Ground {
                selection: GroundSelection::Lab(gray),
                tolerance: 0.5,
            },
        )
        .unwrap();
        assert_eq!(mask.count(), 20);
    }

    #[test]
    fn test_views_alpha_contract() {
        let base = sample_image();
        let selected: Vec<bool> = (0..48).map(|i| i % 3 == 0).collect();
        let mask = Mask::new(8, 6, selected.clone()).unwrap();
        let views = render_views(&base, &mask);

        for (i, &s) in selected.iter().enumerate() {
            let (x, y) = ((i % 8) as u32, (i / 8) as u32);
            let src = base.get_pixel(x, y);
            let wash = views.wash.get_pixel(x, y);
            let extract = views.extract.get_pixel(x, y);
            let highlight = views.highlight.get_pixel(x, y);

            if s {
                assert_eq!(wash[3], 255);
                assert_eq!(extract[3], 255);
                assert_eq!(&extract.0[..3], &src.0[..]);
                assert_ne!(&highlight.0[..3], &src.0[..]);
            } else {
                assert_eq!(wash[3], WASH_ALPHA);
                assert_eq!(extract[3], 0);
                assert_eq!(&highlight.0[..3], &src.0[..]);
            }
            assert_eq!(highlight[3], 255);
        }
    }

    #[test]
    fn test_views_render_at_original_resolution() {
        let mask = Mask::new(2, 2, vec![true, false, false, true]).unwrap();
        let original = RgbImage::from_pixel(6, 4, Rgb([100, 100, 100]));
        let views = render_views(&original, &mask);

        assert_eq!(views.extract.dimensions(), (6, 4));
        // Top-left quadrant selected, top-right not
        assert_eq!(views.extract.get_pixel(2, 1)[3], 255);
        assert_eq!(views.extract.get_pixel(3, 1)[3], 0);
        assert_eq!(views.extract.get_pixel(5, 3)[3], 255);
    }

    #[test]
    fn test_mask_resize_and_intersect() {
        let mask = Mask::new(2, 1, vec![true, false]).unwrap();
        let up = mask.resized(4, 2);
        assert_eq!(
            up.selected(),
            &[true, true, false, false, true, true, false, false]
        );

        let both = up.intersect(&[true; 8]).unwrap();
        assert_eq!(both.count(), 4);
        assert!(up.intersect(&[true; 3]).is_err());
        assert!(Mask::new(3, 3, vec![false; 4]).is_err());
    }

    #[test]
    fn test_empty_mask_renders_as_unselected() {
        let empty = Mask::new(0, 0, Vec::new()).unwrap();
        assert_eq!(empty.resized(3, 2).selected(), &[false; 6]);
        assert_eq!(Mask::new(4, 0, Vec::new()).unwrap().resized(2, 2).count(), 0);

        let base = RgbImage::from_pixel(2, 2, Rgb([90, 60, 30]));
        let views = render_views(&base, &empty);
        assert_eq!(views.extract.dimensions(), (2, 2));
        assert!(views.extract.pixels().all(|p| p.0[3] == 0));
        assert!(views.wash.pixels().all(|p| p.0 == [90, 60, 30, WASH_ALPHA]));
        assert!(views.highlight.pixels().all(|p| p.0 == [90, 60, 30, 255]));
    }
}
