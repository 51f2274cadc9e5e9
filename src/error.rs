//! Structured error types for the Easy Read layout engine.
//!
//! Measurement and asset failures abort a build before anything is written.
//! Packing edge cases never surface here: an oversized block is a
//! [`LayoutWarning`](crate::layout::LayoutWarning), not an error.

use std::path::PathBuf;

use crate::address::BoxSlot;

pub type Result<T> = std::result::Result<T, EasyReadError>;

/// The unified error type returned by all public Easy Read API functions.
#[derive(Debug, thiserror::Error)]
pub enum EasyReadError {
    /// JSON input failed to parse as a valid document or settings file.
    #[error("Failed to parse input: {source}{}", hint_suffix(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    /// A reference font could not be read or parsed.
    #[error("Font error: {0}")]
    Measurement(String),

    /// A block image or logo could not be loaded.
    #[error("Asset error for '{path}': {reason}")]
    Asset { path: String, reason: String },

    /// Strict sessions reject an empty block list instead of emitting a blank page.
    #[error("Document has no content blocks")]
    EmptyInput,

    /// An edit was issued against a layout that has since been rebuilt.
    #[error(
        "Edit for page {page} {slot} targets layout v{requested} but the current layout is v{current}"
    )]
    StaleAddress {
        page: usize,
        slot: BoxSlot,
        requested: u64,
        current: u64,
    },

    /// The (page, slot) pair is not populated in the current layout.
    #[error("No box {slot} on page {page}")]
    UnknownSlot { page: usize, slot: BoxSlot },

    /// Edits need a layout to resolve against.
    #[error("Document has not been laid out yet")]
    NoLayout,

    #[error("Unsupported template {0}: expected 3 or 4 boxes per page")]
    InvalidTemplate(u32),

    #[error("Invalid box slot '{0}': expected box1, box2, ...")]
    InvalidSlot(String),

    /// An external collaborator (extractor, language model, image model) failed.
    #[error("Pipeline stage failed: {0}")]
    Collaborator(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("DOCX packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl EasyReadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EasyReadError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for EasyReadError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the expected schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        EasyReadError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: EasyReadError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.contains("Hint: Check for trailing commas"), "{msg}");
    }

    #[test]
    fn stale_address_message_names_versions() {
        let err = EasyReadError::StaleAddress {
            page: 2,
            slot: BoxSlot::new(3),
            requested: 1,
            current: 2,
        };
        assert_eq!(
            err.to_string(),
            "Edit for page 2 box3 targets layout v1 but the current layout is v2"
        );
    }
}
