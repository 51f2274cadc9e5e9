//! Document sessions: build, edit, rebuild.
//!
//! A [`Session`] owns the content blocks, the chosen template and backend,
//! and the result of the last successful build (layout, [`PageMap`] and
//! [`AddressIndex`]). Edits are issued against a layout version and only
//! change text; nothing is re-laid out until [`Session::build`] or
//! [`Session::rebuild`] is called.
//!
//! ```text
//! NoLayout --build--> LaidOut(v1) --edit--> LaidOut(v1, needs rebuild)
//!                          |                      |
//!                          +------rebuild---------+--> LaidOut(v2)
//! ```
//!
//! Methods take `&mut self`, so one session has one writer. Applications
//! that share a session across threads wrap it with [`Session::into_shared`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::address::{AddressIndex, EditRequest, LayoutVersion, PageMap};
use crate::config::{Settings, DOCX_REFERENCE_FAMILY};
use crate::docx::DocxWriter;
use crate::error::{EasyReadError, Result};
use crate::font::FontContext;
use crate::image_loader::ImageStore;
use crate::layout::{Layout, LayoutEngine, LayoutWarning};
use crate::model::{Backend, ContentBlock, LayoutTemplate};
use crate::output::StagedFile;
use crate::pdf::PdfWriter;
use crate::preview::{commit_previews, stage_previews, PreviewRenderer};

pub type SharedSession = Arc<Mutex<Session>>;

/// Lock a shared session. A poisoned lock means a build panicked mid-way.
pub fn lock(shared: &SharedSession) -> Result<MutexGuard<'_, Session>> {
    shared
        .lock()
        .map_err(|_| EasyReadError::Render("session lock poisoned by an earlier panic".to_string()))
}

/// Summary of one successful build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub version: LayoutVersion,
    pub total_pages: usize,
    pub page_counts: Vec<usize>,
    pub artifact: PathBuf,
    pub previews: Vec<PathBuf>,
    pub warnings: Vec<LayoutWarning>,
}

struct LaidOut {
    layout: Layout,
    page_map: PageMap,
    index: AddressIndex,
}

enum State {
    NoLayout,
    LaidOut(Box<LaidOut>),
}

pub struct Session {
    blocks: Vec<ContentBlock>,
    template: LayoutTemplate,
    backend: Backend,
    settings: Settings,
    fonts: FontContext,
    state: State,
    next_version: LayoutVersion,
    needs_rebuild: bool,
    strict_empty: bool,
}

impl Session {
    /// Create a session. Fails only if the DOCX reference font cannot be loaded.
    pub fn new(
        blocks: Vec<ContentBlock>,
        template: LayoutTemplate,
        backend: Backend,
        settings: Settings,
    ) -> Result<Self> {
        let mut fonts = FontContext::new();
        if let (Backend::Docx, Some(path)) = (backend, settings.docx_font_file.as_deref()) {
            fonts.register_file(DOCX_REFERENCE_FAMILY, path)?;
        }
        Ok(Session {
            blocks,
            template,
            backend,
            settings,
            fonts,
            state: State::NoLayout,
            next_version: 1,
            needs_rebuild: false,
            strict_empty: false,
        })
    }

    /// Reject an empty block list with [`EasyReadError::EmptyInput`] instead
    /// of producing a single header/footer-only page.
    pub fn strict_empty(mut self, strict: bool) -> Self {
        self.strict_empty = strict;
        self
    }

    /// Lay out the current blocks without rendering or writing anything.
    pub fn plan(&self) -> Result<Layout> {
        self.plan_with(self.template)
    }

    fn plan_with(&self, template: LayoutTemplate) -> Result<Layout> {
        if self.strict_empty && self.blocks.is_empty() {
            return Err(EasyReadError::EmptyInput);
        }
        let geometry = self.settings.profile(self.backend).geometry(template);
        Ok(LayoutEngine::new(&self.fonts, geometry).paginate(&self.blocks))
    }

    /// Lay out, render and write the artifact (and previews, if configured).
    ///
    /// The artifact and previews are staged next to their targets and only
    /// moved into place once every step has succeeded. On error the previous
    /// artifact and the previous layout stay current.
    pub fn build(&mut self) -> Result<BuildReport> {
        self.build_with(self.template)
    }

    fn build_with(&mut self, template: LayoutTemplate) -> Result<BuildReport> {
        let layout = self.plan_with(template)?;
        let version = self.next_version;

        let refs: Vec<&str> = self.blocks.iter().map(|b| b.image_reference.as_str()).collect();
        let mut images = ImageStore::new();
        images.load_all(
            refs.iter()
                .copied()
                .chain(self.settings.logo_sources())
                .filter(|src| !src.is_empty()),
            self.settings.asset_dir.as_deref(),
        )?;

        let bytes = match self.backend {
            Backend::Pdf => PdfWriter::new().write(&layout, &refs, &images, &self.settings)?,
            Backend::Docx => {
                let texts: Vec<&str> = self.blocks.iter().map(|b| b.text.as_str()).collect();
                DocxWriter::new().write(&layout, &refs, &texts, &images, &self.settings)?
            }
        };

        let thumbnails = match self.settings.preview_dir.as_deref() {
            Some(dir) => {
                let renderer = PreviewRenderer::new(self.settings.preview_width);
                Some((dir, renderer.render(&layout, &refs, &images, &self.settings)?))
            }
            None => None,
        };

        let staged_artifact = StagedFile::stage(&self.artifact_path(), &bytes)?;
        let staged_previews = match thumbnails {
            Some((dir, pngs)) => Some((dir, stage_previews(dir, &pngs)?)),
            None => None,
        };

        let previews = match staged_previews {
            Some((dir, staged)) => commit_previews(dir, staged)?,
            None => Vec::new(),
        };
        let artifact = staged_artifact.commit()?;

        let page_map = PageMap::from_layout(&layout, &self.blocks);
        let index = AddressIndex::from_layout(&layout, version);
        let report = BuildReport {
            version,
            total_pages: layout.total_pages(),
            page_counts: layout.page_counts(),
            artifact,
            previews,
            warnings: layout.warnings.clone(),
        };

        log::info!(
            "built layout v{}: {} block(s) on {} page(s), template {}, {} -> {}",
            version,
            self.blocks.len(),
            report.total_pages,
            template,
            self.backend,
            report.artifact.display()
        );

        self.state = State::LaidOut(Box::new(LaidOut {
            layout,
            page_map,
            index,
        }));
        self.template = template;
        self.next_version += 1;
        self.needs_rebuild = false;
        Ok(report)
    }

    /// Replace the text of one placed block. Returns its content index.
    ///
    /// The edit must name the current layout version. The layout itself is
    /// not recomputed; call [`Session::build`] to reflow.
    pub fn apply_edit(&mut self, edit: &EditRequest) -> Result<usize> {
        let State::LaidOut(current) = &mut self.state else {
            return Err(EasyReadError::NoLayout);
        };

        let version = current.index.version();
        if edit.version != version {
            log::warn!(
                "rejected edit to page {} {}: issued against v{}, current is v{}",
                edit.page,
                edit.slot,
                edit.version,
                version
            );
            return Err(EasyReadError::StaleAddress {
                page: edit.page,
                slot: edit.slot,
                requested: edit.version,
                current: version,
            });
        }

        let index = current
            .index
            .resolve(edit.page, edit.slot)
            .filter(|&i| i < self.blocks.len())
            .ok_or_else(|| {
                log::warn!("rejected edit: no {} on page {}", edit.slot, edit.page);
                EasyReadError::UnknownSlot {
                    page: edit.page,
                    slot: edit.slot,
                }
            })?;

        self.blocks[index].text = edit.text.clone();
        current.page_map.set(edit.page, edit.slot, &edit.text);
        self.needs_rebuild = true;
        log::debug!("edited block {} at page {} {}", index, edit.page, edit.slot);
        Ok(index)
    }

    /// Switch template (if different) and do a full build.
    ///
    /// A template change invalidates every address before the new layout is
    /// computed, so edits against the old shape are rejected even if the
    /// build fails. The session only adopts the new template once the build
    /// succeeds.
    pub fn rebuild(&mut self, template: LayoutTemplate) -> Result<BuildReport> {
        if template != self.template {
            log::info!("template {} -> {}: discarding old addresses", self.template, template);
            if let State::LaidOut(current) = &mut self.state {
                current.index.clear();
            }
        }
        self.build_with(template)
    }

    /// Page → slot → text for the current layout.
    pub fn page_text_boxes(&self) -> Option<&PageMap> {
        match &self.state {
            State::LaidOut(current) => Some(&current.page_map),
            State::NoLayout => None,
        }
    }

    pub fn layout(&self) -> Option<&Layout> {
        match &self.state {
            State::LaidOut(current) => Some(&current.layout),
            State::NoLayout => None,
        }
    }

    pub fn address_index(&self) -> Option<&AddressIndex> {
        match &self.state {
            State::LaidOut(current) => Some(&current.index),
            State::NoLayout => None,
        }
    }

    /// Pages in the current layout; 0 before the first build.
    pub fn total_pages(&self) -> usize {
        self.layout().map_or(0, Layout::total_pages)
    }

    /// Version of the current layout, if any.
    pub fn version(&self) -> Option<LayoutVersion> {
        self.address_index().map(AddressIndex::version)
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn template(&self) -> LayoutTemplate {
        self.template
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True after an edit until the next successful build.
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.settings.artifact_path(self.backend)
    }

    pub fn preview_dir(&self) -> Option<&Path> {
        self.settings.preview_dir.as_deref()
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }
}
