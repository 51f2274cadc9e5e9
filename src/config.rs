//! Build settings.
//!
//! Everything here is optional in the JSON file; missing fields take the
//! defaults below. Page geometry is deliberately not configurable: it is
//! fixed per backend in [`BackendProfile`](crate::layout::BackendProfile) so
//! that every re-layout packs against the same page.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EasyReadError, Result};
use crate::layout::BackendProfile;
use crate::model::{Backend, Metadata};

/// Family name under which `docx_font_file` is registered for measurement.
pub const DOCX_REFERENCE_FAMILY: &str = "DocxReference";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub header: HeaderFooter,
    pub footer: HeaderFooter,
    /// Directory the artifact is written to.
    pub output_dir: PathBuf,
    /// When set, page thumbnails are written here as `page_N.png`.
    pub preview_dir: Option<PathBuf>,
    /// Thumbnail width in pixels.
    pub preview_width: u32,
    pub min_block_spacing: f64,
    pub body_font_size: f64,
    /// Body font named in the DOCX styles.
    pub docx_font_name: String,
    /// TrueType file used to measure DOCX body text instead of Helvetica metrics.
    pub docx_font_file: Option<PathBuf>,
    /// Directory relative image references are resolved against.
    pub asset_dir: Option<PathBuf>,
    pub metadata: Metadata,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            header: HeaderFooter::default(),
            footer: HeaderFooter::default(),
            output_dir: PathBuf::from("output"),
            preview_dir: None,
            preview_width: 200,
            min_block_spacing: 10.0,
            body_font_size: 14.0,
            docx_font_name: "Arial".to_string(),
            docx_font_file: None,
            asset_dir: None,
            metadata: Metadata::default(),
        }
    }
}

/// Header or footer band content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderFooter {
    pub text: String,
    /// Logo image reference (path, data URI or base64).
    pub logo: Option<String>,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EasyReadError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Fixed, backend-specific artifact path.
    pub fn artifact_path(&self, backend: Backend) -> PathBuf {
        self.output_dir
            .join(format!("easy_read.{}", backend.extension()))
    }

    /// The backend profile with this file's typography overrides applied.
    pub fn profile(&self, backend: Backend) -> BackendProfile {
        let profile = BackendProfile::for_backend(backend)
            .with_font_size(self.body_font_size)
            .with_min_spacing(self.min_block_spacing);
        match (backend, &self.docx_font_file) {
            (Backend::Docx, Some(_)) => profile.with_font_family(DOCX_REFERENCE_FAMILY),
            _ => profile,
        }
    }

    /// Logo references that must load for a build to succeed.
    pub fn logo_sources(&self) -> impl Iterator<Item = &str> {
        [&self.header.logo, &self.footer.logo]
            .into_iter()
            .filter_map(|logo| logo.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let s = Settings::from_json("{}").unwrap();
        assert_eq!(s.output_dir, PathBuf::from("output"));
        assert_eq!(s.min_block_spacing, 10.0);
        assert_eq!(s.preview_width, 200);
        assert!(s.header.logo.is_none());
    }

    #[test]
    fn camel_case_fields() {
        let s = Settings::from_json(
            r#"{
                "header": {"text": "Intelife Easy Read", "logo": "logo.png"},
                "outputDir": "/tmp/out",
                "bodyFontSize": 16,
                "minBlockSpacing": 12.5,
                "metadata": {"title": "Rights"}
            }"#,
        )
        .unwrap();
        assert_eq!(s.header.text, "Intelife Easy Read");
        assert_eq!(s.artifact_path(Backend::Pdf), PathBuf::from("/tmp/out/easy_read.pdf"));
        assert_eq!(s.artifact_path(Backend::Docx), PathBuf::from("/tmp/out/easy_read.docx"));
        assert_eq!(s.profile(Backend::Pdf).font_size, 16.0);
        assert_eq!(s.profile(Backend::Docx).min_spacing, 12.5);
        assert_eq!(s.logo_sources().collect::<Vec<_>>(), vec!["logo.png"]);
    }

    #[test]
    fn docx_font_file_switches_reference_family() {
        let s = Settings {
            docx_font_file: Some(PathBuf::from("calibri.ttf")),
            ..Settings::default()
        };
        assert_eq!(s.profile(Backend::Docx).font_family, DOCX_REFERENCE_FAMILY);
        assert_eq!(s.profile(Backend::Pdf).font_family, "Helvetica");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Settings::from_json_file(Path::new("/no/such/settings.json")).unwrap_err();
        assert!(matches!(err, EasyReadError::Io { .. }));
    }
}
