//! Per-pixel color planes, value/hue histograms and temperature statistics
//!
//! Lab and LCh are computed once per pixel of the analysis buffer and reused
//! by every later stage. Histogram accumulation runs in parallel with
//! per-worker partial histograms merged at the end.

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{hue_distance, Lab, Lch, Rgb};
use crate::config::{TemperatureParams, HUE_BINS, VALUE_BINS};
use crate::error::{CoreError, Result};

/// Lab and LCh for every pixel of an image, row-major
#[derive(Debug, Clone)]
pub struct ColorPlanes {
    width: u32,
    height: u32,
    lab: Vec<Lab>,
    lch: Vec<Lch>,
}

impl ColorPlanes {
    pub fn from_image(image: &RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CoreError::invalid(format!(
                "pixel buffer must not be empty, got {width}x{height}"
            )));
        }

        let lab: Vec<Lab> = image
            .as_raw()
            .par_chunks_exact(3)
            .map(|p| Rgb::new(p[0], p[1], p[2]).to_lab())
            .collect();
        let lch = lab.par_iter().map(Lab::to_lch).collect();

        Ok(Self {
            width,
            height,
            lab,
            lch,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.lab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lab.is_empty()
    }

    pub fn lab(&self) -> &[Lab] {
        &self.lab
    }

    pub fn lch(&self) -> &[Lch] {
        &self.lch
    }
}

/// Quantize L* (0..=100) onto the 0..=255 value scale
#[inline]
pub fn value_bin(l: f64) -> usize {
    ((l.clamp(0.0, 100.0) / 100.0) * 255.0).round() as usize
}

/// Whole-degree hue bin in 0..=359
#[inline]
pub fn hue_bin(h: f64) -> usize {
    (h.floor().max(0.0) as usize).min(HUE_BINS - 1)
}

/// 256-bin histogram of quantized L*
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueHistogram {
    pub bins: Vec<u64>,
}

/// 360-bin hue histogram; near-neutral pixels are counted in `neutral` instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HueHistogram {
    pub bins: Vec<u64>,
    pub neutral: u64,
}

/// Peak of the value histogram and the default band around it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMode {
    pub peak_bin: u8,
    pub lower_bin: u8,
    pub upper_bin: u8,
}

impl ValueHistogram {
    pub fn from_planes(planes: &ColorPlanes) -> Self {
        let bins = planes
            .lab()
            .par_iter()
            .fold(
                || vec![0u64; VALUE_BINS],
                |mut hist, lab| {
                    hist[value_bin(lab.l)] += 1;
                    hist
                },
            )
            .reduce(|| vec![0u64; VALUE_BINS], merge_bins);
        Self { bins }
    }

    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// First maximal bin, with a symmetric window clamped to the histogram range
    pub fn mode(&self, half_width: u8) -> ValueMode {
        let peak = self
            .bins
            .iter()
            .enumerate()
            .fold((0usize, 0u64), |best, (i, &count)| {
                if count > best.1 {
                    (i, count)
                } else {
                    best
                }
            })
            .0;
        let peak = peak as u8;

        ValueMode {
            peak_bin: peak,
            lower_bin: peak.saturating_sub(half_width),
            upper_bin: peak.saturating_add(half_width),
        }
    }
}

impl HueHistogram {
    pub fn from_planes(planes: &ColorPlanes, neutral_chroma: f64) -> Self {
        let (bins, neutral) = planes
            .lch()
            .par_iter()
            .fold(
                || (vec![0u64; HUE_BINS], 0u64),
                |(mut hist, mut neutral), lch| {
                    if lch.c < neutral_chroma {
                        neutral += 1;
                    } else {
                        hist[hue_bin(lch.h)] += 1;
                    }
                    (hist, neutral)
                },
            )
            .reduce(
                || (vec![0u64; HUE_BINS], 0u64),
                |(a, na), (b, nb)| (merge_bins(a, b), na + nb),
            );
        Self { bins, neutral }
    }

    /// Pixels binned by hue, excluding the neutral bucket
    pub fn chromatic_total(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// All pixels seen, including the neutral bucket
    pub fn total(&self) -> u64 {
        self.chromatic_total() + self.neutral
    }
}

fn merge_bins(mut a: Vec<u64>, b: Vec<u64>) -> Vec<u64> {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
    a
}

/// Warm/cool/neutral category of a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Warm,
    Cool,
    Neutral,
}

impl Temperature {
    pub fn classify(lch: &Lch, params: &TemperatureParams) -> Self {
        if lch.c < params.neutral_chroma {
            Temperature::Neutral
        } else if hue_distance(lch.h, params.warm_center) <= params.warm_span {
            Temperature::Warm
        } else {
            Temperature::Cool
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Temperature::Warm => "warm",
            Temperature::Cool => "cool",
            Temperature::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Temperature {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "warm" => Ok(Temperature::Warm),
            "cool" => Ok(Temperature::Cool),
            "neutral" => Ok(Temperature::Neutral),
            other => Err(CoreError::invalid(format!(
                "unknown temperature category: {other}"
            ))),
        }
    }
}

/// Pixel counts per temperature category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TemperatureCounts {
    pub warm: u64,
    pub cool: u64,
    pub neutral: u64,
}

impl TemperatureCounts {
    pub fn from_planes(planes: &ColorPlanes, params: &TemperatureParams) -> Self {
        planes
            .lch()
            .par_iter()
            .fold(TemperatureCounts::default, |mut counts, lch| {
                match Temperature::classify(lch, params) {
                    Temperature::Warm => counts.warm += 1,
                    Temperature::Cool => counts.cool += 1,
                    Temperature::Neutral => counts.neutral += 1,
                }
                counts
            })
            .reduce(TemperatureCounts::default, |a, b| TemperatureCounts {
                warm: a.warm + b.warm,
                cool: a.cool + b.cool,
                neutral: a.neutral + b.neutral,
            })
    }

    pub fn total(&self) -> u64 {
        self.warm + self.cool + self.neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb as Px;

    fn gradient_image() -> RgbImage {
        RgbImage::from_fn(37, 23, |x, y| {
            Px([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
        })
    }

    #[test]
    fn test_empty_buffer_is_rejected() {
        let empty = RgbImage::new(0, 10);
        assert!(matches!(
            ColorPlanes::from_image(&empty),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_histogram_totals_match_pixel_count() {
        let image = gradient_image();
        let planes = ColorPlanes::from_image(&image).unwrap();
        let value = ValueHistogram::from_planes(&planes);
        let hue = HueHistogram::from_planes(&planes, 2.0);

        let pixels = (image.width() * image.height()) as u64;
        assert_eq!(value.bins.len(), 256);
        assert_eq!(hue.bins.len(), 360);
        assert_eq!(value.total(), pixels);
        assert_eq!(hue.total(), pixels);
        assert_eq!(hue.total(), value.total());
    }

    #[test]
    fn test_neutral_pixels_go_to_neutral_bucket() {
        let image = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Px([128, 128, 128])
            } else {
                Px([200, 40, 40])
            }
        });
        let planes = ColorPlanes::from_image(&image).unwrap();
        let hue = HueHistogram::from_planes(&planes, 2.0);

        assert_eq!(hue.neutral, 8);
        assert_eq!(hue.chromatic_total(), 8);
        let red_bin = hue_bin(Rgb::new(200, 40, 40).to_lch().h);
        assert_eq!(hue.bins[red_bin], 8);
    }

    #[test]
    fn test_value_bins_cover_full_scale() {
        assert_eq!(value_bin(0.0), 0);
        assert_eq!(value_bin(100.0), 255);
        assert_eq!(value_bin(-3.0), 0);
        assert_eq!(value_bin(120.0), 255);
        assert_eq!(value_bin(50.0), 128);
        assert_eq!(hue_bin(359.9), 359);
        assert_eq!(hue_bin(0.2), 0);
    }

    #[test]
    fn test_value_mode_window_is_clamped() {
        let mut bins = vec![0u64; 256];
        bins[1] = 10;
        bins[200] = 3;
        let mode = ValueHistogram { bins }.mode(2);
        assert_eq!(mode, ValueMode { peak_bin: 1, lower_bin: 0, upper_bin: 3 });

        let mut bins = vec![0u64; 256];
        bins[254] = 10;
        let mode = ValueHistogram { bins }.mode(5);
        assert_eq!(mode.upper_bin, 255);
        assert_eq!(mode.lower_bin, 249);
    }

    #[test]
    fn test_value_mode_prefers_first_peak() {
        let mut bins = vec![0u64; 256];
        bins[40] = 7;
        bins[90] = 7;
        assert_eq!(ValueHistogram { bins }.mode(2).peak_bin, 40);
    }

    #[test]
    fn test_temperature_classification() {
        let params = TemperatureParams::default();
        let warm = Lch::new(60.0, 30.0, 60.0);
        let cool = Lch::new(60.0, 30.0, 220.0);
        let neutral = Lch::new(60.0, 3.0, 60.0);
        let magenta = Lch::new(60.0, 30.0, 330.0);

        assert_eq!(Temperature::classify(&warm, &params), Temperature::Warm);
        assert_eq!(Temperature::classify(&cool, &params), Temperature::Cool);
        assert_eq!(Temperature::classify(&neutral, &params), Temperature::Neutral);
        assert_eq!(Temperature::classify(&magenta, &params), Temperature::Warm);
    }

    #[test]
    fn test_temperature_counts_sum_to_pixels() {
        let image = gradient_image();
        let planes = ColorPlanes::from_image(&image).unwrap();
        let counts = TemperatureCounts::from_planes(&planes, &TemperatureParams::default());
        assert_eq!(counts.total(), planes.len() as u64);
    }

    #[test]
    fn test_temperature_parse() {
        assert_eq!("cool".parse::<Temperature>().unwrap(), Temperature::Cool);
        assert!("lukewarm".parse::<Temperature>().is_err());
    }
}
