//! Block height estimation.
//!
//! A block occupies a row: a square image cell on the left and a text column
//! on the right. Its height is whichever is taller. The text height comes
//! from the greedy wrapper, so it is an approximation of what the final
//! renderer will do, but a reproducible one.

use crate::font::TextMeasure;
use crate::model::ContentBlock;
use crate::text::{LineWrapper, WrappedLine};

use super::geometry::PageGeometry;

/// Height of one block plus the lines that produced it.
#[derive(Debug, Clone)]
pub struct BlockEstimate {
    pub height: f64,
    pub text_height: f64,
    pub lines: Vec<WrappedLine>,
}

pub struct BlockHeightEstimator<'a> {
    measure: &'a dyn TextMeasure,
    geometry: &'a PageGeometry,
}

impl<'a> BlockHeightEstimator<'a> {
    /// The geometry fixes the template: image cell, text column and font.
    pub fn new(measure: &'a dyn TextMeasure, geometry: &'a PageGeometry) -> Self {
        Self { measure, geometry }
    }

    pub fn estimate(&self, block: &ContentBlock) -> BlockEstimate {
        let g = self.geometry;
        let lines = LineWrapper::new(self.measure, &g.font_family).wrap(
            &block.text,
            g.text_width,
            g.font_size,
        );
        let text_height = lines.len() as f64 * g.line_height;
        BlockEstimate {
            height: g.image_cell.max(text_height),
            text_height,
            lines,
        }
    }

    /// Never less than the image cell.
    pub fn height(&self, block: &ContentBlock) -> f64 {
        self.estimate(block).height
    }
}
