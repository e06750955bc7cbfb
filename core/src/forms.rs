//! Ground-inside-forms detection
//!
//! Finds passages of ground color that sit inside depicted forms rather than
//! in the open background:
//!
//! 1. BT.601 luminance
//! 2. Canny edges
//! 3. Dilate, then close, to seal small gaps in contours
//! 4. Label 4-connected non-edge regions; regions touching the image border
//!    are open background, everything else is enclosed by a contour
//! 5. Open to drop slivers, then intersect with the ground mask
//!
//! The interior map depends only on the image, so callers that run several
//! ground queries against one analysis can build a [`RegionMap`] once.

use std::collections::HashSet;

use image::{GrayImage, Luma, RgbImage, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{close, dilate, open};
use imageproc::region_labelling::{connected_components, Connectivity};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::Lab;
use crate::error::{CoreError, Result};
use crate::mask::{render_view, within_delta_e, Mask, View};
use crate::stats::ColorPlanes;

/// ΔE tolerance for ground-inside queries; tighter than the plain ground mask
pub const DEFAULT_GROUND_INSIDE_TOLERANCE: f64 = 6.0;

const FOREGROUND: u8 = 255;

/// Edge and morphology parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormsParams {
    /// Hysteresis low threshold on gradient magnitude
    pub canny_low: f32,
    /// Hysteresis high threshold on gradient magnitude
    pub canny_high: f32,
    /// Each step is one pass of a 3x3 square element
    pub dilate_iterations: u8,
    pub close_iterations: u8,
    pub open_iterations: u8,
}

impl Default for FormsParams {
    fn default() -> Self {
        Self {
            canny_low: 60.0,
            canny_high: 150.0,
            dilate_iterations: 1,
            close_iterations: 2,
            open_iterations: 1,
        }
    }
}

/// Pixels enclosed by detected contours
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMap {
    width: u32,
    height: u32,
    interior: Vec<bool>,
}

/// Ground mask restricted to the interior of forms
#[derive(Debug, Clone)]
pub struct GroundInside {
    pub mask: Mask,
    /// Highlighted pixels over interior pixels; 0.0 when nothing is enclosed
    pub coverage: f64,
    pub pixels: usize,
}

/// Rendered result of [`detect_ground_inside_forms`]
#[derive(Debug, Clone)]
pub struct GroundInsideForms {
    pub highlight: RgbaImage,
    pub coverage: f64,
    pub pixels: usize,
}

impl RegionMap {
    pub fn from_image(image: &RgbImage, params: &FormsParams) -> Self {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Self {
                width,
                height,
                interior: Vec::new(),
            };
        }

        let edges = contour_map(&luminance(image), params);
        let enclosed = enclosed_regions(&edges);
        let interior = open(&enclosed, Norm::LInf, params.open_iterations)
            .into_raw()
            .into_par_iter()
            .map(|v| v != 0)
            .collect();

        let map = Self {
            width,
            height,
            interior,
        };
        tracing::debug!(
            "forms: {} of {} pixels enclosed by contours",
            map.interior_pixels(),
            width as usize * height as usize
        );
        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn interior(&self) -> &[bool] {
        &self.interior
    }

    pub fn interior_pixels(&self) -> usize {
        self.interior.iter().filter(|&&i| i).count()
    }

    /// Intersect a ground mask with the interior; both must share one grid
    pub fn ground_inside(&self, ground: &Mask) -> Result<GroundInside> {
        if ground.width() != self.width || ground.height() != self.height {
            return Err(CoreError::invalid(format!(
                "ground mask is {}x{} but regions are {}x{}",
                ground.width(),
                ground.height(),
                self.width,
                self.height
            )));
        }

        let mask = ground.intersect(&self.interior)?;
        let pixels = mask.count();
        let interior = self.interior_pixels();
        let coverage = if interior == 0 {
            0.0
        } else {
            pixels as f64 / interior as f64
        };

        Ok(GroundInside {
            mask,
            coverage,
            pixels,
        })
    }
}

/// Ground pixels (within `tolerance` ΔE of `ground`) enclosed by forms in `image`
pub fn detect_ground_inside_forms(
    image: &RgbImage,
    ground: Lab,
    tolerance: f64,
) -> Result<GroundInsideForms> {
    let planes = ColorPlanes::from_image(image)?;
    let ground_mask = Mask::new(
        planes.width(),
        planes.height(),
        within_delta_e(planes.lab(), ground, tolerance)?,
    )?;

    let regions = RegionMap::from_image(image, &FormsParams::default());
    let inside = regions.ground_inside(&ground_mask)?;

    Ok(GroundInsideForms {
        highlight: render_view(image, &inside.mask, View::Highlight),
        coverage: inside.coverage,
        pixels: inside.pixels,
    })
}

/// ITU-R BT.601 luma
pub fn luminance(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    gray.par_iter_mut()
        .zip(image.par_chunks_exact(3))
        .for_each(|(dst, p)| {
            let y = 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64;
            *dst = y.round().clamp(0.0, 255.0) as u8;
        });
    gray
}

/// Canny edges, thickened and closed so contours with small gaps still seal
fn contour_map(gray: &GrayImage, params: &FormsParams) -> GrayImage {
    let edges = canny(gray, params.canny_low, params.canny_high);
    let edges = if params.dilate_iterations > 0 {
        dilate(&edges, Norm::LInf, params.dilate_iterations)
    } else {
        edges
    };
    if params.close_iterations > 0 {
        close(&edges, Norm::LInf, params.close_iterations)
    } else {
        edges
    }
}

/// Edge pixels plus every non-edge region that does not touch the border
fn enclosed_regions(edges: &GrayImage) -> GrayImage {
    let (width, height) = edges.dimensions();

    // Label the gaps between contours; edge pixels become label 0
    let open_space = GrayImage::from_fn(width, height, |x, y| {
        Luma([if edges.get_pixel(x, y)[0] == 0 { FOREGROUND } else { 0 }])
    });
    let labels = connected_components(&open_space, Connectivity::Four, Luma([0u8]));

    let mut background = HashSet::new();
    for x in 0..width {
        background.insert(labels.get_pixel(x, 0)[0]);
        background.insert(labels.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        background.insert(labels.get_pixel(0, y)[0]);
        background.insert(labels.get_pixel(width - 1, y)[0]);
    }
    background.remove(&0);

    GrayImage::from_fn(width, height, |x, y| {
        let label = labels.get_pixel(x, y)[0];
        Luma([if background.contains(&label) { 0 } else { FOREGROUND }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb as Color;
    use image::Rgb;

    const GRAY: [u8; 3] = [128, 128, 128];
    const INK: [u8; 3] = [20, 20, 20];

    /// Gray canvas with a thick dark square frame enclosing more gray
    fn framed_image() -> RgbImage {
        RgbImage::from_fn(40, 40, |x, y| {
            let in_square = (10..30).contains(&x) && (10..30).contains(&y);
            let in_hole = (14..26).contains(&x) && (14..26).contains(&y);
            if in_square && !in_hole {
                Rgb(INK)
            } else {
                Rgb(GRAY)
            }
        })
    }

    #[test]
    fn test_contours_follow_step_edge() {
        let gray = GrayImage::from_fn(24, 24, |x, _| Luma([if x < 12 { 200 } else { 30 }]));
        let params = FormsParams {
            dilate_iterations: 0,
            close_iterations: 0,
            ..FormsParams::default()
        };
        let edges = contour_map(&gray, &params);

        let columns: Vec<u32> = edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, _, _)| x)
            .collect();
        assert!(!columns.is_empty());
        assert!(columns.iter().all(|x| (10..=13).contains(x)), "{columns:?}");
    }

    #[test]
    fn test_flat_image_has_no_contours() {
        let gray = GrayImage::from_pixel(10, 10, Luma([90]));
        let edges = contour_map(&gray, &FormsParams::default());
        assert!(edges.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_border_regions_are_background() {
        // A closed ring of edge pixels: the middle is enclosed, the outside is not
        let edges = GrayImage::from_fn(9, 9, |x, y| {
            let ring = (2..=6).contains(&x)
                && (2..=6).contains(&y)
                && (x == 2 || x == 6 || y == 2 || y == 6);
            Luma([if ring { FOREGROUND } else { 0 }])
        });
        let enclosed = enclosed_regions(&edges);

        assert_eq!(enclosed.get_pixel(4, 4)[0], FOREGROUND);
        assert_eq!(enclosed.get_pixel(2, 4)[0], FOREGROUND);
        assert_eq!(enclosed.get_pixel(0, 0)[0], 0);
        assert_eq!(enclosed.get_pixel(8, 4)[0], 0);
        assert_eq!(enclosed.pixels().filter(|p| p[0] != 0).count(), 25);
    }

    #[test]
    fn test_open_ring_is_not_enclosed() {
        let edges = GrayImage::from_fn(9, 9, |x, y| {
            let ring = (2..=6).contains(&x)
                && (2..=6).contains(&y)
                && (x == 2 || x == 6 || y == 2 || y == 6);
            let gap = x == 4 && y == 2;
            Luma([if ring && !gap { FOREGROUND } else { 0 }])
        });
        let enclosed = enclosed_regions(&edges);
        assert_eq!(enclosed.get_pixel(4, 4)[0], 0);
    }

    #[test]
    fn test_enclosed_region_found() {
        let regions = RegionMap::from_image(&framed_image(), &FormsParams::default());
        let at = |x: usize, y: usize| regions.interior()[y * 40 + x];

        assert!(at(20, 20));
        assert!(at(12, 20));
        assert!(!at(0, 0));
        assert!(!at(4, 20));
        assert!(!at(35, 35));
    }

    #[test]
    fn test_small_gap_in_frame_is_sealed() {
        let mut image = framed_image();
        for x in 10..14 {
            image.put_pixel(x, 20, Rgb(GRAY));
        }
        let regions = RegionMap::from_image(&image, &FormsParams::default());
        assert!(regions.interior()[20 * 40 + 20]);
        assert!(!regions.interior()[20 * 40 + 2]);
    }

    #[test]
    fn test_ground_inside_forms_on_frame() {
        let image = framed_image();
        let ground = Color::from(GRAY).to_lab();
        let result = detect_ground_inside_forms(&image, ground, 1.0).unwrap();

        assert!(result.pixels > 0);
        assert!(result.coverage > 0.0 && result.coverage <= 1.0);
        assert_eq!(result.highlight.dimensions(), (40, 40));

        // Enclosed gray is highlighted, open background is left alone
        assert_ne!(result.highlight.get_pixel(20, 20).0[..3], GRAY);
        assert_eq!(result.highlight.get_pixel(2, 2).0[..3], GRAY);
    }

    #[test]
    fn test_full_ground_mask_covers_whole_interior() {
        let image = framed_image();
        let regions = RegionMap::from_image(&image, &FormsParams::default());
        let everything = Mask::new(40, 40, vec![true; 1600]).unwrap();
        let inside = regions.ground_inside(&everything).unwrap();

        assert!(inside.pixels > 0);
        assert_eq!(inside.pixels, regions.interior_pixels());
        assert_eq!(inside.coverage, 1.0);
    }

    #[test]
    fn test_no_contours_means_zero_coverage() {
        let image = RgbImage::from_pixel(20, 20, Rgb(GRAY));
        let result = detect_ground_inside_forms(&image, Color::from(GRAY).to_lab(), 5.0).unwrap();
        assert_eq!(result.pixels, 0);
        assert_eq!(result.coverage, 0.0);
    }

    #[test]
    fn test_mismatched_grid_rejected() {
        let regions = RegionMap::from_image(&framed_image(), &FormsParams::default());
        let small = Mask::new(2, 2, vec![true; 4]).unwrap();
        assert!(regions.ground_inside(&small).is_err());
        assert!(detect_ground_inside_forms(&RgbImage::new(0, 0), Lab::default(), 1.0).is_err());
    }
}
