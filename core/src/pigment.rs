//! Subtractive pigment mixing and recipe search
//!
//! Each pigment's reflectance is sampled at three bands (450, 550 and 650 nm)
//! taken from the linear-light value of its blue, green and red channels.
//! Mixtures follow the single-constant Kubelka–Munk model: per band the
//! absorption/scattering ratio `K/S = (1 - R)² / 2R` is averaged by weight and
//! converted back with `R = 1 + K/S - √((K/S)² + 2 K/S)`.
//!
//! The library enumerates every candidate mixture of its [`SearchSpace`] once,
//! at construction, with the mixed color precomputed. Matching a color is then
//! a parallel nearest search over that table.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{delta_e, from_linear, to_linear, Lab, Lch, Rgb};
use crate::error::{CoreError, Result};

/// Reflectance samples per pigment: blue 450 nm, green 550 nm, red 650 nm
pub const BANDS: usize = 3;

/// Floor applied to reflectance so K/S stays finite
pub const MIN_REFLECTANCE: f64 = 1e-4;

pub const WHITE_ID: &str = "titanium-white";

/// Hiding power of a paint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Opacity {
    Opaque,
    SemiOpaque,
    SemiTransparent,
    Transparent,
}

/// Per-band reflectance in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reflectance(pub [f64; BANDS]);

impl Reflectance {
    pub fn from_rgb(rgb: Rgb) -> Self {
        let band = |c: u8| to_linear(c).max(MIN_REFLECTANCE);
        Self([band(rgb.b), band(rgb.g), band(rgb.r)])
    }

    pub fn to_rgb(&self) -> Rgb {
        let [b, g, r] = self.0;
        Rgb::new(from_linear(r), from_linear(g), from_linear(b))
    }

    /// Kubelka–Munk absorption/scattering ratio per band
    pub fn ks(&self) -> [f64; BANDS] {
        self.0.map(|r| (1.0 - r).powi(2) / (2.0 * r))
    }

    pub fn from_ks(ks: [f64; BANDS]) -> Self {
        Self(ks.map(|k| (1.0 + k - (k * k + 2.0 * k).sqrt()).clamp(MIN_REFLECTANCE, 1.0)))
    }
}

/// A paint in the library
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pigment {
    pub id: String,
    pub name: String,
    pub base_rgb: Rgb,
    pub reflectance: Reflectance,
    pub opacity: Opacity,
}

impl Pigment {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_rgb: Rgb, opacity: Opacity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_rgb,
            reflectance: Reflectance::from_rgb(base_rgb),
            opacity,
        }
    }
}

/// Mix reflectances by weight; weights need not sum to one
pub fn mix(components: &[(&Reflectance, f64)]) -> Reflectance {
    let total: f64 = components.iter().map(|(_, w)| w).sum();
    let mut ks = [0.0; BANDS];
    for (reflectance, weight) in components {
        for (acc, k) in ks.iter_mut().zip(reflectance.ks()) {
            *acc += weight / total * k;
        }
    }
    Reflectance::from_ks(ks)
}

/// Which mixtures the matcher considers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchSpace {
    /// Largest part count per pigment in two-pigment mixes
    pub max_pair_parts: u32,
    /// Largest part count per pigment in three-pigment mixes
    pub max_triple_parts: u32,
    /// White shares tried on top of every non-white mix, each in (0, 1)
    pub tint_fractions: Vec<f64>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            max_pair_parts: 4,
            max_triple_parts: 3,
            tint_fractions: vec![0.10, 0.25, 0.50, 0.75],
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> Result<()> {
        if self.max_pair_parts > 12 || self.max_triple_parts > 8 {
            return Err(CoreError::invalid(format!(
                "search space too large: pair parts {} (max 12), triple parts {} (max 8)",
                self.max_pair_parts, self.max_triple_parts
            )));
        }
        if let Some(t) = self
            .tint_fractions
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0 && **t < 1.0))
        {
            return Err(CoreError::invalid(format!(
                "tint fractions must lie strictly between 0 and 1, got {t}"
            )));
        }
        Ok(())
    }
}

/// One pigment's share of a mixture
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixturePart {
    pub id: String,
    pub name: String,
    pub parts: u32,
    /// Share of the whole mixture, white included
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorMixture {
    pub parts: Vec<MixturePart>,
    pub white: Option<String>,
    pub white_proportion: f64,
    pub result_rgb: Rgb,
}

/// Best mixture found for a target color
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PigmentMatch {
    pub result_rgb: Rgb,
    pub hex: String,
    pub lab: Lab,
    pub lch: Lch,
    pub recipe: String,
    pub delta_e: f64,
    /// `100 - ΔE`, clamped to 0..=100
    pub similarity: f64,
    pub mixture: ColorMixture,
}

#[derive(Debug, Clone)]
struct Candidate {
    /// (library index, parts), in library order
    parts: Vec<(usize, u32)>,
    tint: Option<f64>,
    rgb: Rgb,
    lab: Lab,
}

impl Candidate {
    fn components(&self) -> usize {
        self.parts.len() + usize::from(self.tint.is_some())
    }
}

/// Immutable pigment set plus its precomputed candidate mixtures
#[derive(Debug, Clone)]
pub struct PigmentLibrary {
    pigments: Vec<Pigment>,
    white: Option<usize>,
    space: SearchSpace,
    candidates: Vec<Candidate>,
}

impl PigmentLibrary {
    /// Built-in artist palette with the default search space
    pub fn standard() -> Result<Self> {
        let pigments = vec![
            Pigment::new(WHITE_ID, "Titanium White", Rgb::new(255, 255, 255), Opacity::Opaque),
            Pigment::new("cadmium-lemon", "Cadmium Lemon", Rgb::new(250, 236, 40), Opacity::SemiOpaque),
            Pigment::new("cadmium-yellow-medium", "Cadmium Yellow Medium", Rgb::new(250, 190, 0), Opacity::Opaque),
            Pigment::new("cadmium-orange", "Cadmium Orange", Rgb::new(240, 110, 20), Opacity::Opaque),
            Pigment::new("cadmium-red-light", "Cadmium Red Light", Rgb::new(220, 40, 35), Opacity::Opaque),
            Pigment::new("alizarin-crimson", "Alizarin Crimson", Rgb::new(150, 20, 45), Opacity::Transparent),
            Pigment::new("quinacridone-magenta", "Quinacridone Magenta", Rgb::new(160, 35, 95), Opacity::Transparent),
            Pigment::new("dioxazine-purple", "Dioxazine Purple", Rgb::new(70, 30, 95), Opacity::Transparent),
            Pigment::new("ultramarine-blue", "Ultramarine Blue", Rgb::new(35, 45, 150), Opacity::SemiTransparent),
            Pigment::new("phthalo-blue", "Phthalo Blue", Rgb::new(10, 50, 120), Opacity::Transparent),
            Pigment::new("phthalo-green", "Phthalo Green", Rgb::new(0, 90, 70), Opacity::Transparent),
            Pigment::new("sap-green", "Sap Green", Rgb::new(80, 115, 40), Opacity::Transparent),
            Pigment::new("yellow-ochre", "Yellow Ochre", Rgb::new(200, 150, 60), Opacity::Opaque),
            Pigment::new("burnt-sienna", "Burnt Sienna", Rgb::new(140, 65, 30), Opacity::SemiTransparent),
            Pigment::new("burnt-umber", "Burnt Umber", Rgb::new(95, 60, 40), Opacity::Opaque),
            Pigment::new("ivory-black", "Ivory Black", Rgb::new(30, 30, 32), Opacity::Opaque),
        ];
        Self::new(pigments, Some(WHITE_ID), SearchSpace::default())
    }

    /// Build a library; `white_id` names the pigment used for tints, if any
    pub fn new(pigments: Vec<Pigment>, white_id: Option<&str>, space: SearchSpace) -> Result<Self> {
        space.validate()?;
        let white = match white_id {
            Some(id) => Some(
                pigments
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or_else(|| CoreError::invalid(format!("white pigment {id} is not in the library")))?,
            ),
            None => None,
        };

        let mut library = Self {
            pigments,
            white,
            space,
            candidates: Vec::new(),
        };
        library.candidates = library.enumerate();
        tracing::debug!(
            "pigment library: {} pigments, {} candidate mixtures",
            library.pigments.len(),
            library.candidates.len()
        );
        Ok(library)
    }

    pub fn pigments(&self) -> &[Pigment] {
        &self.pigments
    }

    pub fn white(&self) -> Option<&Pigment> {
        self.white.map(|i| &self.pigments[i])
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn get(&self, id: &str) -> Option<&Pigment> {
        self.pigments.iter().find(|p| p.id == id)
    }

    /// Closest mixture to `target` by ΔE
    ///
    /// Ties go to fewer components, then to the lexically smaller pigment
    /// names, then to the recipe text, so the result never depends on
    /// evaluation order.
    pub fn match_pigments(&self, target: Rgb) -> Result<PigmentMatch> {
        let target_lab = target.to_lab();
        let (distance, best) = self
            .candidates
            .par_iter()
            .map(|c| (delta_e(target_lab, c.lab), c))
            .min_by(|a, b| self.compare(a, b))
            .ok_or(CoreError::NoMatchFound)?;

        let recipe = self.recipe(best);
        tracing::debug!("matched {} to {} (ΔE {:.2})", target.to_hex(), recipe, distance);

        Ok(PigmentMatch {
            result_rgb: best.rgb,
            hex: best.rgb.to_hex(),
            lab: best.lab,
            lch: best.lab.to_lch(),
            recipe,
            delta_e: distance,
            similarity: (100.0 - distance).clamp(0.0, 100.0),
            mixture: self.mixture(best),
        })
    }

    fn compare(&self, a: &(f64, &Candidate), b: &(f64, &Candidate)) -> Ordering {
        a.0.total_cmp(&b.0)
            .then_with(|| a.1.components().cmp(&b.1.components()))
            .then_with(|| self.names(a.1).cmp(&self.names(b.1)))
            .then_with(|| self.recipe(a.1).cmp(&self.recipe(b.1)))
    }

    /// Pigment names in the candidate, sorted
    fn names<'a>(&'a self, candidate: &Candidate) -> Vec<&'a str> {
        let mut names: Vec<&str> = candidate
            .parts
            .iter()
            .map(|&(i, _)| self.pigments[i].name.as_str())
            .chain(candidate.tint.and(self.white()).map(|w| w.name.as_str()))
            .collect();
        names.sort_unstable();
        names
    }

    fn recipe(&self, candidate: &Candidate) -> String {
        let mut recipe = match candidate.parts.as_slice() {
            [(i, _)] => self.pigments[*i].name.clone(),
            parts => parts
                .iter()
                .map(|&(i, n)| format!("{} ({})", self.pigments[i].name, n))
                .collect::<Vec<_>>()
                .join(" + "),
        };
        if let (Some(t), Some(white)) = (candidate.tint, self.white()) {
            recipe.push_str(&format!(" + {} ({}%)", white.name, (t * 100.0).round()));
        }
        recipe
    }

    fn mixture(&self, candidate: &Candidate) -> ColorMixture {
        let white_proportion = candidate.tint.unwrap_or(0.0);
        let total: u32 = candidate.parts.iter().map(|(_, n)| n).sum();
        let parts = candidate
            .parts
            .iter()
            .map(|&(i, n)| MixturePart {
                id: self.pigments[i].id.clone(),
                name: self.pigments[i].name.clone(),
                parts: n,
                proportion: (1.0 - white_proportion) * n as f64 / total as f64,
            })
            .collect();

        ColorMixture {
            parts,
            white: candidate.tint.and(self.white()).map(|w| w.id.clone()),
            white_proportion,
            result_rgb: candidate.rgb,
        }
    }

    /// Every mixture of the search space, in a fixed order, with colors computed
    fn enumerate(&self) -> Vec<Candidate> {
        let mut specs: Vec<(Vec<(usize, u32)>, Option<f64>)> = Vec::new();
        let colored: Vec<usize> = (0..self.pigments.len())
            .filter(|&i| Some(i) != self.white)
            .collect();

        // White only ever appears alone or as a tint
        if let Some(w) = self.white {
            specs.push((vec![(w, 1)], None));
        }

        let mut push_tinted = |parts: Vec<(usize, u32)>| {
            if self.white.is_some() {
                for &t in &self.space.tint_fractions {
                    specs.push((parts.clone(), Some(t)));
                }
            }
            specs.push((parts, None));
        };

        for &i in &colored {
            push_tinted(vec![(i, 1)]);
        }
        let pair_ratios = reduced_ratios(2, self.space.max_pair_parts);
        for (x, &i) in colored.iter().enumerate() {
            for &j in &colored[x + 1..] {
                for ratio in &pair_ratios {
                    push_tinted(vec![(i, ratio[0]), (j, ratio[1])]);
                }
            }
        }
        let triple_ratios = reduced_ratios(3, self.space.max_triple_parts);
        for (x, &i) in colored.iter().enumerate() {
            for (y, &j) in colored.iter().enumerate().skip(x + 1) {
                for &k in &colored[y + 1..] {
                    for ratio in &triple_ratios {
                        push_tinted(vec![(i, ratio[0]), (j, ratio[1]), (k, ratio[2])]);
                    }
                }
            }
        }
        specs
            .into_par_iter()
            .map(|(parts, tint)| {
                let rgb = self.mix_parts(&parts, tint).to_rgb();
                Candidate {
                    parts,
                    tint,
                    rgb,
                    lab: rgb.to_lab(),
                }
            })
            .collect()
    }

    fn mix_parts(&self, parts: &[(usize, u32)], tint: Option<f64>) -> Reflectance {
        let total: u32 = parts.iter().map(|(_, n)| n).sum();
        let white_share = tint.unwrap_or(0.0);
        let mut components: Vec<(&Reflectance, f64)> = parts
            .iter()
            .map(|&(i, n)| {
                (
                    &self.pigments[i].reflectance,
                    (1.0 - white_share) * n as f64 / total as f64,
                )
            })
            .collect();
        if let (Some(t), Some(white)) = (tint, self.white()) {
            components.push((&white.reflectance, t));
        }
        mix(&components)
    }
}

/// Part tuples of length `len` over 1..=max_parts with no common factor
fn reduced_ratios(len: usize, max_parts: u32) -> Vec<Vec<u32>> {
    let mut out: Vec<Vec<u32>> = vec![Vec::new()];
    for _ in 0..len {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (1..=max_parts).map(move |n| {
                    let mut next = prefix.clone();
                    next.push(n);
                    next
                })
            })
            .collect();
    }
    out.retain(|ratio| ratio.iter().fold(0, |g, &n| gcd(g, n)) == 1);
    out
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_matches_white_alone() {
        let library = PigmentLibrary::standard().unwrap();
        let result = library.match_pigments(Rgb::new(255, 255, 255)).unwrap();

        assert_eq!(result.recipe, "Titanium White");
        assert!(result.similarity > 99.99);
        assert_eq!(result.result_rgb, Rgb::new(255, 255, 255));
        assert_eq!(result.mixture.parts.len(), 1);
        assert_eq!(result.mixture.parts[0].id, WHITE_ID);
        assert_eq!(result.mixture.white, None);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let library = PigmentLibrary::standard().unwrap();
        for target in [Rgb::new(123, 101, 88), Rgb::new(40, 160, 200), Rgb::new(201, 77, 140)] {
            let a = library.match_pigments(target).unwrap();
            let b = library.match_pigments(target).unwrap();
            assert_eq!(a.recipe, b.recipe);
            assert_eq!(a.similarity.to_bits(), b.similarity.to_bits());
        }
    }

    #[test]
    fn test_pure_pigment_matches_itself() {
        let library = PigmentLibrary::standard().unwrap();
        let umber = library.get("burnt-umber").unwrap().base_rgb;
        let result = library.match_pigments(umber).unwrap();

        assert_eq!(result.recipe, "Burnt Umber");
        assert_eq!(result.delta_e, 0.0);
        assert_eq!(result.similarity, 100.0);
    }

    #[test]
    fn test_similarity_is_bounded() {
        let library = PigmentLibrary::standard().unwrap();
        for target in [Rgb::new(0, 255, 0), Rgb::new(0, 0, 0), Rgb::new(255, 0, 255), Rgb::new(128, 128, 128)] {
            let result = library.match_pigments(target).unwrap();
            assert!((0.0..=100.0).contains(&result.similarity));
            assert!((result.similarity - (100.0 - result.delta_e).clamp(0.0, 100.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_recipe_format() {
        let library = PigmentLibrary::standard().unwrap();
        let index = |id: &str| library.pigments().iter().position(|p| p.id == id).unwrap();
        let candidate = Candidate {
            parts: vec![(index("ultramarine-blue"), 2), (index("burnt-umber"), 1)],
            tint: Some(0.25),
            rgb: Rgb::new(0, 0, 0),
            lab: Lab::default(),
        };
        assert_eq!(
            library.recipe(&candidate),
            "Ultramarine Blue (2) + Burnt Umber (1) + Titanium White (25%)"
        );

        let mixture = library.mixture(&candidate);
        let shares: f64 = mixture.parts.iter().map(|p| p.proportion).sum::<f64>() + mixture.white_proportion;
        assert!((shares - 1.0).abs() < 1e-12);
        assert_eq!(mixture.white.as_deref(), Some(WHITE_ID));
    }

    #[test]
    fn test_reflectance_is_monotonic_and_invertible() {
        let mut previous = 0.0;
        for c in 0..=255u8 {
            let reflectance = Reflectance::from_rgb(Rgb::new(c, c, c));
            assert!(reflectance.0[0] > previous);
            previous = reflectance.0[0];
            assert_eq!(reflectance.to_rgb(), Rgb::new(c, c, c));
            assert_eq!(Reflectance::from_ks(reflectance.ks()).to_rgb(), Rgb::new(c, c, c));
        }
    }

    #[test]
    fn test_mixing_behaves_subtractively() {
        let white = Reflectance::from_rgb(Rgb::new(255, 255, 255));
        let blue = Reflectance::from_rgb(Rgb::new(35, 45, 150));
        let yellow = Reflectance::from_rgb(Rgb::new(250, 190, 0));

        assert_eq!(mix(&[(&blue, 1.0), (&blue, 3.0)]).to_rgb(), blue.to_rgb());

        let tint = mix(&[(&blue, 1.0), (&white, 1.0)]).to_rgb();
        assert!(tint.r >= 35 && tint.g >= 45 && tint.b >= 150);

        // Blue and yellow make a green-leaning mix
        let green = mix(&[(&blue, 1.0), (&yellow, 1.0)]).to_rgb();
        assert!(green.g > green.r && green.g > green.b);
    }

    #[test]
    fn test_reduced_ratios() {
        let pairs = reduced_ratios(2, 4);
        assert_eq!(pairs.len(), 11);
        assert!(pairs.contains(&vec![1, 1]));
        assert!(!pairs.contains(&vec![2, 2]));
        assert!(!pairs.contains(&vec![2, 4]));

        let triples = reduced_ratios(3, 3);
        assert_eq!(triples.len(), 25);
        assert!(reduced_ratios(2, 0).is_empty());
    }

    #[test]
    fn test_ties_compare_sorted_names() {
        let library = PigmentLibrary::new(
            vec![
                Pigment::new("zinc", "Zinc Gray", Rgb::new(120, 120, 120), Opacity::Opaque),
                Pigment::new("cobalt", "Cobalt Blue", Rgb::new(0, 70, 170), Opacity::Opaque),
                Pigment::new("ash", "Ash Gray", Rgb::new(120, 120, 120), Opacity::Opaque),
            ],
            None,
            SearchSpace::default(),
        )
        .unwrap();
        let candidate = |parts: Vec<(usize, u32)>| Candidate {
            parts,
            tint: None,
            rgb: Rgb::new(0, 0, 0),
            lab: Lab::default(),
        };

        // {Zinc Gray, Cobalt Blue} sorts as [Cobalt Blue, Zinc Gray], which
        // is after [Ash Gray, Cobalt Blue] even though Zinc comes first in
        // library order
        let zinc_cobalt = candidate(vec![(0, 1), (1, 1)]);
        let cobalt_ash = candidate(vec![(1, 1), (2, 1)]);
        assert_eq!(library.names(&zinc_cobalt), ["Cobalt Blue", "Zinc Gray"]);
        assert_eq!(
            library.compare(&(1.0, &cobalt_ash), &(1.0, &zinc_cobalt)),
            Ordering::Less
        );

        // Identical swatches: the alphabetically first name wins
        let found = library.match_pigments(Rgb::new(120, 120, 120)).unwrap();
        assert_eq!(found.recipe, "Ash Gray");
    }

    #[test]
    fn test_empty_library_has_no_match() {
        let library = PigmentLibrary::new(Vec::new(), None, SearchSpace::default()).unwrap();
        assert_eq!(library.candidate_count(), 0);
        assert_eq!(
            library.match_pigments(Rgb::new(10, 20, 30)),
            Err(CoreError::NoMatchFound)
        );
    }

    #[test]
    fn test_library_validation() {
        assert!(PigmentLibrary::new(Vec::new(), Some(WHITE_ID), SearchSpace::default()).is_err());

        let space = SearchSpace {
            tint_fractions: vec![0.5, 1.0],
            ..SearchSpace::default()
        };
        assert!(PigmentLibrary::new(Vec::new(), None, space).is_err());
    }
}
