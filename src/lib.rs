//! # Easy Read
//!
//! Layout engine for Easy Read documents: each section of a simplified
//! document is a content block (one picture and a few short sentences),
//! and pages hold a fixed number of blocks side by side with the picture on
//! the left and the text on the right.
//!
//! Pagination is decided once, by one planner, before any backend draws a
//! thing. The PDF and DOCX backends receive the same [`layout::Layout`] and
//! only differ in how they render a placed block, so what the user edits
//! page by page is what ends up in the file.
//!
//! ## Architecture
//!
//! ```text
//! Document (JSON) / pipeline
//!       ↓
//!   [text]      greedy line wrapping against a TextMeasure
//!       ↓
//!   [layout]    block heights, page packing, spacing, placement
//!       ↓
//!   [address]   PageMap + versioned AddressIndex for edits
//!       ↓
//!   [pdf|docx]  artifact bytes  →  [output] atomic write
//!   [preview]   per-page PNG thumbnails
//! ```
//!
//! [`session::Session`] ties these together and owns the edit / rebuild
//! cycle.

pub mod address;
pub mod config;
pub mod docx;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod preview;
pub mod session;
pub mod text;

pub use address::{AddressIndex, BoxSlot, EditRequest, LayoutVersion, PageMap};
pub use config::Settings;
pub use error::{EasyReadError, Result};
pub use layout::Layout;
pub use model::{Backend, ContentBlock, Document, LayoutTemplate};
pub use session::{BuildReport, Session, SharedSession};

use font::FontContext;
use layout::LayoutEngine;

/// Lay out a document without rendering it.
///
/// Uses the document's template (template 4 when absent) and the default
/// typography of `backend`.
pub fn plan(document: &Document, backend: Backend) -> Layout {
    let fonts = FontContext::new();
    let geometry = Settings::default()
        .profile(backend)
        .geometry(document.template.unwrap_or_default());
    LayoutEngine::new(&fonts, geometry).paginate(&document.blocks)
}

/// Lay out a document described as JSON.
pub fn plan_json(json: &str, backend: Backend) -> Result<Layout> {
    let document = Document::from_json(json)?;
    Ok(plan(&document, backend))
}

/// Build a document once and write its artifact under `settings.output_dir`.
pub fn build(document: Document, backend: Backend, settings: Settings) -> Result<BuildReport> {
    let template = document.template.unwrap_or_default();
    let mut session = Session::new(document.blocks, template, backend, settings)?;
    session.build()
}
