//! Content pipeline: source document to content blocks.
//!
//! Extraction, clustering, simplification and illustration are external
//! services (PDF text extraction, topic clustering, a language model, an
//! image model). They plug in through the traits below; this module only
//! sequences them and reports progress. The blocks it returns feed a
//! [`Session`](crate::session::Session).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{EasyReadError, Result};
use crate::model::ContentBlock;

/// Error type collaborators return; mapped to [`EasyReadError::Collaborator`].
pub type StageError = Box<dyn std::error::Error + Send + Sync>;
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Pulls paragraphs out of a source document.
pub trait TextExtractor: Send {
    fn extract(&self, source: &Path) -> StageResult<Vec<String>>;
}

/// Groups paragraphs into topical sections, preserving reading order.
pub trait SectionClusterer: Send {
    fn cluster(&self, paragraphs: Vec<String>) -> StageResult<Vec<Vec<String>>>;
}

/// Rewrites a section as Easy Read text.
pub trait Simplifier: Send {
    fn simplify(&self, section: &str) -> StageResult<String>;
}

/// Produces an image for a prompt and returns a reference to it.
pub trait Illustrator: Send {
    fn illustrate(&self, prompt: &str, index: usize) -> StageResult<String>;
}

const PROMPT_PREFIX: &str = "A clean, minimalistic image with no text, no labels, and no clutter. \
Focus on the subject only, with a plain background and simple details.";
const PROMPT_SUFFIX: &str =
    "No text, no captions, no labels, no signage, and no writing anywhere in the image.";

/// Wrap simplified text in the image-model instructions.
pub fn image_prompt(text: &str) -> String {
    format!("{} {} {}", PROMPT_PREFIX, text.trim(), PROMPT_SUFFIX)
}

/// Completion percentage shared between a worker and its observers.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU8>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    /// Values above 100 are clamped.
    pub fn set(&self, percent: u8) {
        self.0.store(percent.min(100), Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.get() >= 100
    }
}

fn stage_err(stage: &str, e: StageError) -> EasyReadError {
    EasyReadError::Collaborator(format!("{}: {}", stage, e))
}

pub struct Pipeline {
    extractor: Box<dyn TextExtractor>,
    clusterer: Box<dyn SectionClusterer>,
    simplifier: Box<dyn Simplifier>,
    illustrator: Box<dyn Illustrator>,
}

impl Pipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        clusterer: Box<dyn SectionClusterer>,
        simplifier: Box<dyn Simplifier>,
        illustrator: Box<dyn Illustrator>,
    ) -> Self {
        Self {
            extractor,
            clusterer,
            simplifier,
            illustrator,
        }
    }

    /// Run every stage in order. Progress ends at 100 only on success.
    pub fn run(&self, source: &Path, progress: &Progress) -> Result<Vec<ContentBlock>> {
        progress.set(0);
        let paragraphs = self
            .extractor
            .extract(source)
            .map_err(|e| stage_err("extraction", e))?;
        log::info!("extracted {} paragraph(s) from {}", paragraphs.len(), source.display());
        progress.set(5);

        let sections = self
            .clusterer
            .cluster(paragraphs)
            .map_err(|e| stage_err("clustering", e))?;
        log::info!("clustered into {} section(s)", sections.len());
        progress.set(10);

        let total = sections.len().max(1);
        let mut blocks = Vec::with_capacity(sections.len());
        for (i, section) in sections.iter().enumerate() {
            let joined = section.join(" ");
            if joined.trim().is_empty() {
                log::debug!("section {} is empty, skipped", i);
                continue;
            }
            let text = self
                .simplifier
                .simplify(&joined)
                .map_err(|e| stage_err("simplification", e))?;
            let image = self
                .illustrator
                .illustrate(&image_prompt(&text), i)
                .map_err(|e| stage_err("illustration", e))?;
            blocks.push(ContentBlock::new(image, text));

            let done = 10 + (85 * (i + 1) / total) as u8;
            progress.set(done);
            log::debug!("section {}/{} done", i + 1, total);
        }

        progress.set(100);
        Ok(blocks)
    }

    /// Run on a background thread; poll `progress` from any other thread.
    pub fn spawn(self, source: PathBuf, progress: Progress) -> JoinHandle<Result<Vec<ContentBlock>>> {
        std::thread::spawn(move || self.run(&source, &progress))
    }
}
