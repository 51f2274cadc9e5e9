//! # Pagination Engine
//!
//! Tiles an ordered list of content blocks across pages. This is the one
//! place layout decisions are made: both render backends, the page map and
//! the address index consume the [`Layout`] produced here and never
//! recompute positions themselves.
//!
//! The loop is simple:
//!
//! 1. Open a page.
//! 2. Ask the [`PageLayoutPlanner`] how many of the remaining blocks fit.
//! 3. Place them at the planned offsets in slots `box1`, `box2`, ...
//! 4. Advance past the consumed blocks and repeat until none remain.
//!
//! Blocks are consumed strictly in order, so flattening the pages in
//! page-then-slot order always reproduces the input order. An empty block
//! list still yields one page, which the backends render with header and
//! footer only.

pub mod estimate;
pub mod geometry;
pub mod planner;

use serde::Serialize;

use crate::address::BoxSlot;
use crate::font::TextMeasure;
use crate::model::ContentBlock;
use crate::text::WrappedLine;

pub use estimate::{BlockEstimate, BlockHeightEstimator};
pub use geometry::{BackendProfile, PageGeometry};
pub use planner::{pack, PageLayoutPlanner, PagePlan};

/// Axis-aligned rectangle, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Complete layout for a block list under one geometry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub geometry: PageGeometry,
    pub pages: Vec<LayoutPage>,
    pub warnings: Vec<LayoutWarning>,
}

impl Layout {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Number of blocks on each page.
    pub fn page_counts(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.blocks.len()).collect()
    }

    /// Content indices in page-then-slot order.
    pub fn placement_order(&self) -> Vec<usize> {
        self.pages
            .iter()
            .flat_map(|p| p.blocks.iter().map(|b| b.content_index))
            .collect()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A single laid-out page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPage {
    /// 1-based page number.
    pub number: usize,
    /// Gap after each block on this page.
    pub spacing: f64,
    pub blocks: Vec<PlacedBlock>,
}

/// A block positioned on a page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBlock {
    /// Index into the block list the layout was built from.
    pub content_index: usize,
    pub slot: BoxSlot,
    /// The whole row: image cell and text column.
    pub bounds: Rect,
    /// Square image cell, vertically centred in the row.
    pub image_cell: Rect,
    /// Text column, vertically centred in the row.
    pub text_box: Rect,
    pub lines: Vec<WrappedLine>,
}

/// Non-fatal layout conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutWarning {
    /// A block is taller than a page's usable height and was placed alone.
    #[serde(rename_all = "camelCase")]
    Overflow {
        page: usize,
        content_index: usize,
        height: f64,
        max_height: f64,
    },
}

/// Paginates blocks for one geometry using one text measure.
pub struct LayoutEngine<'a> {
    measure: &'a dyn TextMeasure,
    geometry: PageGeometry,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(measure: &'a dyn TextMeasure, geometry: PageGeometry) -> Self {
        Self { measure, geometry }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Tile all blocks into pages.
    pub fn paginate(&self, blocks: &[ContentBlock]) -> Layout {
        let planner = PageLayoutPlanner::new(self.measure, &self.geometry);
        let mut pages = Vec::new();
        let mut warnings = Vec::new();
        let mut cursor = 0;

        while cursor < blocks.len() {
            let number = pages.len() + 1;
            let (plan, estimates) = planner.plan(&blocks[cursor..]);

            if plan.overflow {
                let height = plan.heights.first().copied().unwrap_or_default();
                log::warn!(
                    "block {} is {:.1}pt tall but page {} only has {:.1}pt; placing it alone",
                    cursor,
                    height,
                    number,
                    self.geometry.usable_height
                );
                warnings.push(LayoutWarning::Overflow {
                    page: number,
                    content_index: cursor,
                    height,
                    max_height: self.geometry.usable_height,
                });
            }

            log::debug!(
                "page {}: {} block(s) from index {}, spacing {:.2}pt",
                number,
                plan.consumed,
                cursor,
                plan.spacing
            );

            let placed = estimates
                .into_iter()
                .zip(plan.offsets.iter().zip(&plan.heights))
                .enumerate()
                .map(|(i, (estimate, (&y, &height)))| {
                    self.place(cursor + i, BoxSlot::new(i + 1), y, height, estimate)
                })
                .collect();

            pages.push(LayoutPage {
                number,
                spacing: plan.spacing,
                blocks: placed,
            });
            cursor += plan.consumed;
        }

        if pages.is_empty() {
            pages.push(LayoutPage {
                number: 1,
                spacing: self.geometry.min_spacing,
                blocks: Vec::new(),
            });
        }

        Layout {
            geometry: self.geometry.clone(),
            pages,
            warnings,
        }
    }

    fn place(
        &self,
        content_index: usize,
        slot: BoxSlot,
        y: f64,
        height: f64,
        estimate: BlockEstimate,
    ) -> PlacedBlock {
        let g = &self.geometry;
        PlacedBlock {
            content_index,
            slot,
            bounds: Rect {
                x: g.block_x,
                y,
                width: g.block_width,
                height,
            },
            image_cell: Rect {
                x: g.block_x,
                y: y + (height - g.image_cell) / 2.0,
                width: g.image_cell,
                height: g.image_cell,
            },
            text_box: Rect {
                x: g.text_x,
                y: y + (height - estimate.text_height) / 2.0,
                width: g.text_width,
                height: estimate.text_height,
            },
            lines: estimate.lines,
        }
    }
}
