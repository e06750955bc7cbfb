//! Color space conversions for a fixed sRGB / D65 working space
//!
//! sRGB bytes ↔ linear light ↔ CIE XYZ ↔ CIELAB ↔ LCh(ab), plus hex
//! formatting and CIE76 ΔE. Every match and tolerance check in the crate
//! goes through [`delta_e`].

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// D65 reference white in XYZ
pub const D65_WHITE: [f64; 3] = [0.95047, 1.0, 1.08883];

/// CIE threshold between the cube-root and linear segments, (6/29)^3
const LAB_EPSILON: f64 = 216.0 / 24389.0;

/// Slope of the linear segment of f(t)
const LAB_SLOPE: f64 = 903.3 / 116.0;

const LAB_OFFSET: f64 = 16.0 / 116.0;

const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// RGB color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_lab(&self) -> Lab {
        xyz_to_lab(rgb_to_xyz(*self))
    }

    pub fn to_lch(&self) -> Lch {
        self.to_lab().to_lch()
    }

    /// Upper-case `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse `#RRGGBB` or `RRGGBB`
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(CoreError::invalid(format!("unexpected hex color: {hex}")));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| CoreError::invalid(format!("invalid hex color {hex}: {e}")))
        };

        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn as_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(p: image::Rgb<u8>) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// CIE XYZ tristimulus values, Y normalized to 1.0 for reference white
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// CIELAB color, D65-referenced
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    pub fn to_lch(&self) -> Lch {
        lab_to_lch(*self)
    }

    pub fn to_rgb(&self) -> Rgb {
        xyz_to_rgb(lab_to_xyz(*self))
    }

    pub fn chroma(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Squared Euclidean distance, for comparisons where the root is not needed
    #[inline]
    pub fn distance_squared(&self, other: &Lab) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.l, self.a, self.b]
    }
}

/// Cylindrical LCh(ab); hue in degrees within [0, 360)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

impl Lch {
    pub const fn new(l: f64, c: f64, h: f64) -> Self {
        Self { l, c, h }
    }

    pub fn to_lab(&self) -> Lab {
        lch_to_lab(*self)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.l, self.c, self.h]
    }
}

/// Convert an sRGB byte to linear light in [0, 1]
#[inline]
pub fn to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert linear light to an sRGB byte, rounding and clamping out-of-gamut values
#[inline]
pub fn from_linear(c: f64) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let c = if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_xyz(rgb: Rgb) -> Xyz {
    let lin = [to_linear(rgb.r), to_linear(rgb.g), to_linear(rgb.b)];
    let [x, y, z] = mat_mul(&RGB_TO_XYZ, lin);
    Xyz { x, y, z }
}

pub fn xyz_to_rgb(xyz: Xyz) -> Rgb {
    let [r, g, b] = mat_mul(&XYZ_TO_RGB, [xyz.x, xyz.y, xyz.z]);
    Rgb::new(from_linear(r), from_linear(g), from_linear(b))
}

pub fn xyz_to_lab(xyz: Xyz) -> Lab {
    let fx = lab_f(xyz.x / D65_WHITE[0]);
    let fy = lab_f(xyz.y / D65_WHITE[1]);
    let fz = lab_f(xyz.z / D65_WHITE[2]);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

pub fn lab_to_xyz(lab: Lab) -> Xyz {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;

    Xyz {
        x: D65_WHITE[0] * lab_f_inv(fx),
        y: D65_WHITE[1] * lab_f_inv(fy),
        z: D65_WHITE[2] * lab_f_inv(fz),
    }
}

pub fn lab_to_lch(lab: Lab) -> Lch {
    Lch {
        l: lab.l,
        c: lab.chroma(),
        h: normalize_hue(lab.b.atan2(lab.a).to_degrees()),
    }
}

pub fn lch_to_lab(lch: Lch) -> Lab {
    let (sin, cos) = lch.h.to_radians().sin_cos();
    Lab {
        l: lch.l,
        a: lch.c * cos,
        b: lch.c * sin,
    }
}

/// CIE76 color difference
#[inline]
pub fn delta_e(lab1: Lab, lab2: Lab) -> f64 {
    lab1.distance_squared(&lab2).sqrt()
}

/// Wrap any angle in degrees into [0, 360)
#[inline]
pub fn normalize_hue(h: f64) -> f64 {
    let h = h.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Shortest angular distance between two hues, in [0, 180]
#[inline]
pub fn hue_distance(h1: f64, h2: f64) -> f64 {
    let d = (h1 - h2).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[inline]
fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        LAB_SLOPE * t + LAB_OFFSET
    }
}

#[inline]
fn lab_f_inv(f: f64) -> f64 {
    let cube = f * f * f;
    if cube > LAB_EPSILON {
        cube
    } else {
        (f - LAB_OFFSET) / LAB_SLOPE
    }
}

#[inline]
fn mat_mul(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_linear_endpoints() {
        assert_eq!(to_linear(0), 0.0);
        assert!((to_linear(255) - 1.0).abs() < 1e-12);
        // Linear segment below 0.04045 (byte 10 = 0.0392)
        assert!((to_linear(10) - (10.0 / 255.0) / 12.92).abs() < 1e-12);
    }

    #[test]
    fn test_white_and_black_points() {
        let white = Rgb::new(255, 255, 255).to_lab();
        assert!((white.l - 100.0).abs() < 0.01);
        assert!(white.a.abs() < 0.01);
        assert!(white.b.abs() < 0.01);

        let black = Rgb::new(0, 0, 0).to_lab();
        assert!(black.l.abs() < 1e-9);
        assert_eq!(Lab::new(0.0, 0.0, 0.0).to_rgb(), Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_rgb_lab_round_trip_dense_grid() {
        let steps: Vec<u8> = (0..=255u16).step_by(5).map(|v| v as u8).chain([255]).collect();
        for &r in &steps {
            for &g in &steps {
                for &b in &steps {
                    let rgb = Rgb::new(r, g, b);
                    let back = rgb.to_lab().to_rgb();
                    assert!(
                        (back.r as i16 - r as i16).abs() <= 1
                            && (back.g as i16 - g as i16).abs() <= 1
                            && (back.b as i16 - b as i16).abs() <= 1,
                        "{:?} -> {:?}",
                        rgb,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn test_lab_to_lch_axes() {
        let lch = Lab::new(50.0, 20.0, 30.0).to_lch();
        assert_eq!(lch.l, 50.0);
        assert!((lch.c - (20.0f64 * 20.0 + 30.0 * 30.0).sqrt()).abs() < 1e-12);
        assert!((0.0..360.0).contains(&lch.h));

        // Negative b lands in the upper half of the circle
        let lch = Lab::new(50.0, 0.0, -10.0).to_lch();
        assert!((lch.h - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_lch_round_trip() {
        let lab = Lab::new(62.0, -12.5, 33.0);
        let back = lab.to_lch().to_lab();
        assert!(delta_e(lab, back) < 1e-9);
    }

    #[test]
    fn test_hue_helpers() {
        assert_eq!(normalize_hue(-30.0), 330.0);
        assert_eq!(normalize_hue(720.0), 0.0);
        assert!((hue_distance(350.0, 10.0) - 20.0).abs() < 1e-12);
        assert!((hue_distance(10.0, 350.0) - 20.0).abs() < 1e-12);
        assert!((hue_distance(0.0, 180.0) - 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(Rgb::new(255, 0, 0).to_hex(), "#FF0000");
        assert_eq!(Rgb::from_hex("#7B7A64").unwrap(), Rgb::new(0x7B, 0x7A, 0x64));
        assert_eq!(Rgb::from_hex("00ff00").unwrap(), Rgb::new(0, 255, 0));
        assert!(Rgb::from_hex("#FF").is_err());
        assert!(Rgb::from_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_delta_e() {
        let a = Lab::new(50.0, 0.0, 0.0);
        assert_eq!(delta_e(a, a), 0.0);
        assert!((delta_e(a, Lab::new(53.0, 4.0, 0.0)) - 5.0).abs() < 1e-12);
    }
}
