//! # Document Model
//!
//! The input representation for the layout engine. An Easy Read document is
//! an ordered list of content blocks, each pairing one illustration with one
//! section of simplified text. Block order follows the source document's
//! section order and is never changed: edits replace text in place.
//!
//! The model is deliberately flat. Everything about *where* a block lands
//! (page, slot, offsets) is derived by the layout engine and lives in
//! [`crate::layout`] and [`crate::address`], never here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EasyReadError, Result};

/// Input document as read from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The content blocks, in reading order.
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,

    /// Boxes-per-page template. Callers may override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<LayoutTemplate>,
}

impl Document {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One (image, text) unit: a section of the simplified document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    /// File path, `data:image/...` URI, or raw base64 image data.
    pub image_reference: String,
    pub text: String,
}

impl ContentBlock {
    pub fn new(image_reference: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            image_reference: image_reference.into(),
            text: text.into(),
        }
    }
}

/// Boxes-per-page layout variant.
///
/// Serialized as the bare integer (`3` or `4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LayoutTemplate {
    /// Three boxes per page with a large image cell.
    Three,
    /// Four boxes per page with a smaller image cell.
    #[default]
    Four,
}

impl LayoutTemplate {
    /// Maximum number of blocks placed on one page.
    pub fn boxes_per_page(self) -> usize {
        match self {
            LayoutTemplate::Three => 3,
            LayoutTemplate::Four => 4,
        }
    }
}

impl TryFrom<u32> for LayoutTemplate {
    type Error = EasyReadError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            3 => Ok(LayoutTemplate::Three),
            4 => Ok(LayoutTemplate::Four),
            other => Err(EasyReadError::InvalidTemplate(other)),
        }
    }
}

impl From<LayoutTemplate> for u32 {
    fn from(template: LayoutTemplate) -> u32 {
        template.boxes_per_page() as u32
    }
}

impl FromStr for LayoutTemplate {
    type Err = EasyReadError;

    fn from_str(s: &str) -> Result<Self> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| EasyReadError::InvalidTemplate(0))?;
        LayoutTemplate::try_from(value)
    }
}

impl fmt::Display for LayoutTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.boxes_per_page())
    }
}

/// Output format. Both backends share the same packing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Fixed canvas: blocks are drawn at absolute coordinates.
    #[default]
    Pdf,
    /// Flowed word-processor document (WordprocessingML).
    Docx,
}

impl Backend {
    pub fn extension(self) -> &'static str {
        match self {
            Backend::Pdf => "pdf",
            Backend::Docx => "docx",
        }
    }
}

impl FromStr for Backend {
    type Err = EasyReadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Backend::Pdf),
            "docx" | "word" => Ok(Backend::Docx),
            other => Err(EasyReadError::Render(format!(
                "unknown backend '{}': expected pdf or docx",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Document metadata embedded in the PDF Info dictionary and DOCX core properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Custom { width: f64, height: f64 },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for page margins.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}
