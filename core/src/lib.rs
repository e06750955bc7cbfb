//! Color analysis and paint-mixing engine
//!
//! Reads a decoded RGB image and derives perceptual statistics from it:
//! value and hue histograms, five ranked Lab clusters, warm/cool counts and a
//! guess at the painting's toned ground. Masks built from those statistics
//! render as highlight, wash or extract overlays. Separately, any color can
//! be matched against a small pigment library mixed with a Kubelka–Munk
//! model, or against a curated list of ground mixes.
//!
//! ```no_run
//! use groundfinder_core::{analyze, classify_and_render, AnalysisConfig, MaskMode};
//!
//! # fn run(image: image::RgbImage) -> groundfinder_core::Result<()> {
//! let analysis = analyze(&image, &AnalysisConfig::default())?;
//! let views = classify_and_render(&analysis, &image, &MaskMode::Cluster { rank: 0 })?;
//! assert_eq!(views.extract.dimensions(), image.dimensions());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cluster;
pub mod color;
pub mod config;
pub mod error;
pub mod forms;
pub mod mask;
pub mod palette;
pub mod pigment;
pub mod stats;

pub use analysis::{analyze, Analysis, GroundSuggestion};
pub use cluster::Cluster;
pub use color::{delta_e, Lab, Lch, Rgb};
pub use config::{AnalysisConfig, GroundHeuristic, KMeansConfig, TemperatureParams};
pub use error::{CoreError, Result};
pub use forms::{
    detect_ground_inside_forms, GroundInside, GroundInsideForms, RegionMap,
    DEFAULT_GROUND_INSIDE_TOLERANCE,
};
pub use mask::{
    classify_and_render, classify_mask, render_view, render_views, GroundSelection, Mask,
    MaskMode, MaskViews, View,
};
pub use palette::{GroundPalette, GroundPaletteEntry, PaletteMatch};
pub use pigment::{PigmentLibrary, PigmentMatch, SearchSpace};
pub use stats::{Temperature, TemperatureCounts, ValueMode};
