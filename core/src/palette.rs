//! Curated ground mixes and nearest-match lookup

use serde::Serialize;

use crate::color::{delta_e, Lab, Lch, Rgb};
use crate::error::Result;

/// Number of matches returned when the caller does not ask for a count
pub const DEFAULT_MATCHES: usize = 3;

struct Seed {
    id: &'static str,
    name: &'static str,
    hex: &'static str,
    recipe: &'static str,
    notes: &'static str,
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "olive-umber-wash",
        name: "Olive Umber Wash",
        hex: "#7B7A64",
        recipe: "Burnt Umber + Sap Green + Titanium White (4:1:2)",
        notes: "Warm olive neutral that keeps lights clean while anchoring cool passages.",
    },
    Seed {
        id: "raw-sienna-float",
        name: "Warm Sienna Float",
        hex: "#A98B63",
        recipe: "Burnt Sienna + Burnt Umber + Titanium White (5:1:3)",
        notes: "Classic warm ground for luminous yellows and flesh notes.",
    },
    Seed {
        id: "cool-slate",
        name: "Cool Slate",
        hex: "#6F7684",
        recipe: "Ultramarine Blue + Burnt Umber + Titanium White (2:1:4)",
        notes: "Cool gray that lets warms flare; great for metallic or nocturne palettes.",
    },
    Seed {
        id: "warm-neutral-gray",
        name: "Warm Neutral Gray",
        hex: "#8B8074",
        recipe: "Burnt Sienna + Burnt Umber + Titanium White (2:2:3)",
        notes: "Balanced warm gray that harmonises both foliage and skin tones.",
    },
    Seed {
        id: "cold-porcelain",
        name: "Cold Porcelain",
        hex: "#C6C3BD",
        recipe: "Titanium White + Ultramarine Blue + Burnt Umber (10:1:1)",
        notes: "Light neutral for high-key paintings with controlled cools.",
    },
    Seed {
        id: "umber-shadow",
        name: "Deep Umber Shadow",
        hex: "#4E453B",
        recipe: "Burnt Umber + Dioxazine Purple (5:1)",
        notes: "Low-key ground to support strong highlights and atmospheric lights.",
    },
    Seed {
        id: "terra-rosa-veil",
        name: "Terra Rosa Veil",
        hex: "#B57763",
        recipe: "Cadmium Red Light + Burnt Umber + Titanium White (3:1:2)",
        notes: "Rosy warm base beloved in figurative work for subtle flesh vibration.",
    },
    Seed {
        id: "sage-underpaint",
        name: "Sage Underpaint",
        hex: "#7F8F77",
        recipe: "Sap Green + Burnt Umber + Titanium White (3:2:3)",
        notes: "Herbal cool that keeps foliage lively without overpowering warms.",
    },
    Seed {
        id: "cool-mid-gray",
        name: "Cool Mid Gray",
        hex: "#6B6D70",
        recipe: "Ultramarine Blue + Burnt Umber + Titanium White (2:2:4)",
        notes: "Cool mid-value neutral for atmospheric perspective and shadow foundations.",
    },
    Seed {
        id: "warm-mid-gray",
        name: "Warm Mid Gray",
        hex: "#706B65",
        recipe: "Burnt Umber + Burnt Sienna + Titanium White (3:1:3)",
        notes: "Warm mid-value base that harmonizes earth tones and architectural subjects.",
    },
    Seed {
        id: "neutral-light-gray",
        name: "Neutral Light Gray",
        hex: "#A8A8A8",
        recipe: "Titanium White + Ultramarine Blue + Burnt Sienna (10:1:1)",
        notes: "True neutral light gray for high-key works and subtle value control.",
    },
    Seed {
        id: "neutral-mid-gray",
        name: "Neutral Mid Gray",
        hex: "#808080",
        recipe: "Titanium White + Phthalo Blue + Burnt Sienna (5:1:1)",
        notes: "Perfect middle gray for tonal studies and establishing value relationships.",
    },
    Seed {
        id: "neutral-dark-gray",
        name: "Neutral Dark Gray",
        hex: "#505050",
        recipe: "Burnt Umber + Ultramarine Blue (3:1)",
        notes: "Dark neutral foundation for low-key compositions and dramatic lighting.",
    },
    Seed {
        id: "ochre-stone",
        name: "Ochre Stone",
        hex: "#9C8762",
        recipe: "Cadmium Yellow Medium + Burnt Umber + Titanium White (3:1:2)",
        notes: "Earthy golden base perfect for landscapes and warm-light interiors.",
    },
    Seed {
        id: "rose-gray",
        name: "Rose Gray",
        hex: "#9B8A87",
        recipe: "Quinacridone Magenta + Ultramarine Blue + Titanium White (2:1:5)",
        notes: "Subtle rose-tinted neutral for figurative work and soft atmospheric effects.",
    },
    Seed {
        id: "blue-gray-light",
        name: "Blue Gray Light",
        hex: "#9BA5AE",
        recipe: "Sevres Blue + Burnt Umber + Titanium White (2:1:5)",
        notes: "Cool blue-gray for sky studies and creating atmospheric depth.",
    },
    Seed {
        id: "warm-pink-ground",
        name: "Warm Pink Ground",
        hex: "#D4A5A5",
        recipe: "Dianthus Pink + Titanium White (1:3)",
        notes: "Delicate warm ground for portraits and soft atmospheric effects.",
    },
    Seed {
        id: "golden-ochre",
        name: "Golden Ochre",
        hex: "#C2A565",
        recipe: "Cadmium Yellow Medium + Burnt Sienna + Titanium White (4:1:2)",
        notes: "Rich golden ground for warm sunlit scenes and classical techniques.",
    },
    Seed {
        id: "verde-tone",
        name: "Verde Tone",
        hex: "#6B7B6A",
        recipe: "Phthalo Green + Burnt Umber + Titanium White (1:3:3)",
        notes: "Muted green base for landscape work and natural subjects.",
    },
    Seed {
        id: "crimson-shadow",
        name: "Crimson Shadow",
        hex: "#6B4A4A",
        recipe: "Alizarin Crimson + Burnt Umber (2:3)",
        notes: "Deep warm ground for dramatic lighting and rich shadows.",
    },
    Seed {
        id: "orange-clay",
        name: "Orange Clay",
        hex: "#B88560",
        recipe: "Cadmium Orange + Burnt Umber + Titanium White (3:1:2)",
        notes: "Terracotta-inspired ground for warm earth tones and Mediterranean light.",
    },
    Seed {
        id: "violet-gray",
        name: "Violet Gray",
        hex: "#8B7B8A",
        recipe: "Dioxazine Purple + Burnt Umber + Titanium White (1:2:4)",
        notes: "Subtle violet-tinted neutral for evening scenes and cool shadows.",
    },
    Seed {
        id: "phthalo-silver",
        name: "Phthalo Silver",
        hex: "#7A8B8B",
        recipe: "Phthalo Blue + Burnt Sienna + Titanium White (1:1:5)",
        notes: "Silvery cool ground for water scenes and overcast atmospheres.",
    },
    Seed {
        id: "cadmium-neutral",
        name: "Cadmium Neutral",
        hex: "#A89680",
        recipe: "Cadmium Yellow Medium + Quinacridone Magenta + Titanium White (3:1:3)",
        notes: "Warm neutral without umber, for clean modern grounds.",
    },
    Seed {
        id: "blue-green-gray",
        name: "Blue Green Gray",
        hex: "#728A85",
        recipe: "Phthalo Green + Alizarin Crimson + Titanium White (2:1:4)",
        notes: "Complex cool neutral using complementary mixing instead of earth tones.",
    },
    Seed {
        id: "violet-warm-gray",
        name: "Violet Warm Gray",
        hex: "#948885",
        recipe: "Quinacridone Magenta + Sap Green + Titanium White (2:1:4)",
        notes: "Subtle warm gray using complementary colors for optical vibrancy.",
    },
    Seed {
        id: "lemon-gray",
        name: "Lemon Gray",
        hex: "#B5B895",
        recipe: "Cadmium Lemon + Dioxazine Purple + Titanium White (3:1:4)",
        notes: "Cool yellow-gray for soft natural light and botanical subjects.",
    },
    Seed {
        id: "orange-complement-gray",
        name: "Orange Complement Gray",
        hex: "#9A8878",
        recipe: "Cadmium Orange + Ultramarine Blue + Titanium White (2:1:3)",
        notes: "Rich neutral from complementary mixing, warmer alternative to umber grays.",
    },
    Seed {
        id: "magenta-sky",
        name: "Magenta Sky",
        hex: "#AFA5B0",
        recipe: "Quinacridone Magenta + Phthalo Green + Titanium White (1:1:6)",
        notes: "Delicate lavender-gray for atmospheric skies and twilight effects.",
    },
    Seed {
        id: "sevres-pearl",
        name: "Sevres Pearl",
        hex: "#B8C5CC",
        recipe: "Sevres Blue + Cadmium Orange + Titanium White (2:1:7)",
        notes: "Luminous pearl gray with subtle warmth, excellent for high-key works.",
    },
    Seed {
        id: "red-gray-neutral",
        name: "Red Gray Neutral",
        hex: "#8A7A78",
        recipe: "Cadmium Red + Phthalo Green + Titanium White (2:1:4)",
        notes: "Sophisticated neutral using pure pigment complements instead of earth tones.",
    },
];

/// One curated ground color with its mixing recipe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundPaletteEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub hex: &'static str,
    pub recipe: &'static str,
    pub notes: &'static str,
    pub rgb: Rgb,
    pub lab: Lab,
    pub lch: Lch,
}

/// A palette entry ranked against a query color
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteMatch {
    #[serde(flatten)]
    pub entry: GroundPaletteEntry,
    pub delta_e: f64,
}

/// Read-only list of ground mixes with Lab/LCh precomputed
#[derive(Debug, Clone)]
pub struct GroundPalette {
    entries: Vec<GroundPaletteEntry>,
}

impl GroundPalette {
    /// The built-in curated palette
    pub fn standard() -> Result<Self> {
        let entries = SEEDS
            .iter()
            .map(|seed| {
                let rgb = Rgb::from_hex(seed.hex)?;
                let lab = rgb.to_lab();
                Ok(GroundPaletteEntry {
                    id: seed.id,
                    name: seed.name,
                    hex: seed.hex,
                    recipe: seed.recipe,
                    notes: seed.notes,
                    rgb,
                    lab,
                    lch: lab.to_lch(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GroundPaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `top_n` entries closest to `lab` by ΔE, nearest first
    pub fn match_palette(&self, lab: Lab, top_n: usize) -> Vec<PaletteMatch> {
        let mut matches: Vec<PaletteMatch> = self
            .entries
            .iter()
            .map(|entry| PaletteMatch {
                entry: entry.clone(),
                delta_e: delta_e(lab, entry.lab),
            })
            .collect();
        matches.sort_by(|a, b| a.delta_e.total_cmp(&b.delta_e));
        matches.truncate(top_n);
        matches
    }
}
