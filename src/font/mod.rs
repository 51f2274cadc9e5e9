//! # Font Management
//!
//! Text measurement for layout. Every width the engine uses to estimate a
//! block's height comes through [`TextMeasure`], so the PDF and DOCX
//! backends share the packing algorithm and differ only in which reference
//! face they measure with.
//!
//! Helvetica and Helvetica-Bold widths are built in, and Arial resolves to
//! them. A TrueType file can be registered as a custom reference face; its advance
//! widths are read with ttf-parser.

pub mod metrics;

use std::collections::HashMap;
use std::path::Path;

use crate::error::{EasyReadError, Result};
pub use metrics::StandardFontMetrics;

/// Measures the rendered width of a text run.
///
/// Implementations must be pure functions of their inputs so height
/// estimates are reproducible across runs and backends.
pub trait TextMeasure {
    /// Width of `text` in points at `font_size` in the given family.
    fn width(&self, text: &str, font_family: &str, font_size: f64) -> f64;
}

static FALLBACK_FONT: FontData = FontData::Standard(StandardFont::Helvetica);

/// A font registry that maps font family + weight to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
}

impl FontKey {
    pub fn regular(family: &str) -> Self {
        FontKey {
            family: family.to_string(),
            weight: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType face used for measurement.
    Custom(CustomFontMetrics),
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Result<Self> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| EasyReadError::Measurement(format!("invalid font data: {}", e)))?;
        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(EasyReadError::Measurement(
                "font reports zero units per em".to_string(),
            ));
        }

        let mut advance_widths = HashMap::new();
        let mut default_advance = 0u16;

        // Latin, Latin-1 and general punctuation cover Easy Read body text.
        let ranges = [0x20u32..=0x7E, 0xA0..=0x24F, 0x2000..=0x206F];
        for code in ranges.into_iter().flatten() {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Ok(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
        })
    }
}

/// The standard PDF fonts the engine can measure and reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::Helvetica => &metrics::HELVETICA,
            Self::HelveticaBold => &metrics::HELVETICA_BOLD,
        }
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        // Arial is metric-compatible with Helvetica, which is what Word
        // substitutes for it on most systems.
        let standard_mappings = [
            (("Helvetica", 400), StandardFont::Helvetica),
            (("Helvetica", 700), StandardFont::HelveticaBold),
            (("Arial", 400), StandardFont::Helvetica),
            (("Arial", 700), StandardFont::HelveticaBold),
        ];

        for ((family, weight), font) in standard_mappings {
            fonts.insert(
                FontKey {
                    family: family.to_string(),
                    weight,
                },
                FontData::Standard(font),
            );
        }

        Self { fonts }
    }

    /// Look up a font, falling back to Helvetica if not found.
    pub fn resolve(&self, family: &str, weight: u32) -> &FontData {
        let snapped_weight = if weight >= 600 { 700 } else { 400 };
        let candidates = [
            FontKey {
                family: family.to_string(),
                weight: snapped_weight,
            },
            FontKey::regular(family),
            FontKey {
                family: "Helvetica".to_string(),
                weight: snapped_weight,
            },
        ];
        candidates
            .iter()
            .find_map(|key| self.fonts.get(key))
            .unwrap_or(&FALLBACK_FONT)
    }

    /// Register a custom font from raw TrueType bytes.
    pub fn register(&mut self, family: &str, weight: u32, data: &[u8]) -> Result<()> {
        let metrics = CustomFontMetrics::from_font_data(data)?;
        self.fonts.insert(
            FontKey {
                family: family.to_string(),
                weight,
            },
            FontData::Custom(metrics),
        );
        Ok(())
    }

    pub fn contains(&self, family: &str) -> bool {
        self.fonts.keys().any(|k| k.family == family)
    }
}

/// Shared font context used by layout and the render backends.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Load a TrueType file and register it as `family` (regular weight).
    ///
    /// A missing or unparseable file is a measurement error: the build
    /// cannot produce trustworthy heights without its reference face.
    pub fn register_file(&mut self, family: &str, path: &Path) -> Result<()> {
        let data = std::fs::read(path).map_err(|e| {
            EasyReadError::Measurement(format!("cannot read font file {}: {}", path.display(), e))
        })?;
        self.registry.register(family, 400, &data)?;
        log::debug!("registered reference font '{}' from {}", family, path.display());
        Ok(())
    }

    /// Measure the width of a string in points.
    pub fn measure_string(&self, text: &str, family: &str, weight: u32, font_size: f64) -> f64 {
        match self.registry.resolve(family, weight) {
            FontData::Standard(std_font) => std_font.metrics().measure_string(text, font_size, 0.0),
            FontData::Custom(m) => text.chars().map(|ch| m.char_width(ch, font_size)).sum(),
        }
    }
}

impl TextMeasure for FontContext {
    fn width(&self, text: &str, font_family: &str, font_size: f64) -> f64 {
        self.measure_string(text, font_family, 400, font_size)
    }
}
