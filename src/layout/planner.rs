//! # Page Packing
//!
//! Decides how many whole blocks go on one page and how the leftover space
//! is shared between them. Blocks are never split across pages.
//!
//! The rules, applied identically on every build so that a re-layout after
//! an edit reproduces the same decisions for unchanged content:
//!
//! 1. Take blocks in order while their summed height fits the usable page
//!    height, up to the template's boxes-per-page.
//! 2. If not even the first block fits, place it anyway. Pagination must
//!    always make progress; the overflow is reported as a warning.
//! 3. Spread the leftover height evenly: `spacing = (max - sum) / n`, one
//!    gap after each block. If that is below the minimum spacing, drop the
//!    last block and recompute, stopping at one block.

use crate::font::TextMeasure;
use crate::model::ContentBlock;

use super::estimate::{BlockEstimate, BlockHeightEstimator};
use super::geometry::PageGeometry;

/// The packing decision for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    /// Blocks consumed from the front of the remaining list.
    pub consumed: usize,
    /// Top y of each consumed block.
    pub offsets: Vec<f64>,
    /// Estimated height of each consumed block.
    pub heights: Vec<f64>,
    /// Vertical gap after each block.
    pub spacing: f64,
    /// The first block alone was taller than the page.
    pub overflow: bool,
}

impl PagePlan {
    fn empty(min_spacing: f64) -> Self {
        PagePlan {
            consumed: 0,
            offsets: Vec::new(),
            heights: Vec::new(),
            spacing: min_spacing,
            overflow: false,
        }
    }
}

/// Pack block heights onto one page.
///
/// `heights` are the estimated heights of the remaining blocks in order;
/// only the first `cap` are considered. Returns a plan consuming at least one
/// block whenever `heights` is non-empty. Offsets start at `top`.
pub fn pack(
    heights: &[f64],
    max_page_height: f64,
    cap: usize,
    min_spacing: f64,
    top: f64,
) -> PagePlan {
    if heights.is_empty() || cap == 0 {
        return PagePlan::empty(min_spacing);
    }

    let mut n = 0;
    let mut sum = 0.0;
    for &h in heights.iter().take(cap) {
        if sum + h > max_page_height {
            break;
        }
        sum += h;
        n += 1;
    }

    let overflow = n == 0;
    if overflow {
        n = 1;
        sum = heights[0];
    }

    let mut spacing = (max_page_height - sum) / n as f64;
    while spacing < min_spacing && n > 1 {
        n -= 1;
        sum -= heights[n];
        spacing = (max_page_height - sum) / n as f64;
    }
    let spacing = spacing.max(min_spacing);

    let mut offsets = Vec::with_capacity(n);
    let mut y = top;
    for &h in &heights[..n] {
        offsets.push(y);
        y += h + spacing;
    }

    PagePlan {
        consumed: n,
        offsets,
        heights: heights[..n].to_vec(),
        spacing,
        overflow,
    }
}

/// Plans one page at a time over a block list.
pub struct PageLayoutPlanner<'a> {
    estimator: BlockHeightEstimator<'a>,
    geometry: &'a PageGeometry,
}

impl<'a> PageLayoutPlanner<'a> {
    pub fn new(measure: &'a dyn TextMeasure, geometry: &'a PageGeometry) -> Self {
        Self {
            estimator: BlockHeightEstimator::new(measure, geometry),
            geometry,
        }
    }

    /// Plan the next page from `remaining` with this geometry's usable height.
    ///
    /// Returns the plan and the estimates of the consumed blocks.
    pub fn plan(&self, remaining: &[ContentBlock]) -> (PagePlan, Vec<BlockEstimate>) {
        self.plan_with_height(remaining, self.geometry.usable_height)
    }

    pub fn plan_with_height(
        &self,
        remaining: &[ContentBlock],
        max_page_height: f64,
    ) -> (PagePlan, Vec<BlockEstimate>) {
        let cap = self.geometry.boxes_per_page();
        let mut estimates: Vec<BlockEstimate> = remaining
            .iter()
            .take(cap)
            .map(|b| self.estimator.estimate(b))
            .collect();
        let heights: Vec<f64> = estimates.iter().map(|e| e.height).collect();

        let plan = pack(
            &heights,
            max_page_height,
            cap,
            self.geometry.min_spacing,
            self.geometry.content_top,
        );
        estimates.truncate(plan.consumed);
        (plan, estimates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_fits_up_to_cap() {
        let plan = pack(&[100.0, 100.0, 100.0, 100.0, 100.0], 700.0, 4, 10.0, 0.0);
        assert_eq!(plan.consumed, 4);
        assert!((plan.spacing - 75.0).abs() < 1e-9);
        assert_eq!(plan.offsets, vec![0.0, 175.0, 350.0, 525.0]);
        assert!(!plan.overflow);
    }

    #[test]
    fn stops_before_the_block_that_overflows() {
        let plan = pack(&[300.0, 300.0, 300.0], 700.0, 4, 10.0, 50.0);
        assert_eq!(plan.consumed, 2);
        assert!((plan.spacing - 50.0).abs() < 1e-9);
        assert_eq!(plan.offsets, vec![50.0, 400.0]);
    }

    #[test]
    fn oversized_block_is_forced() {
        let plan = pack(&[900.0, 100.0], 700.0, 4, 10.0, 0.0);
        assert_eq!(plan.consumed, 1);
        assert!(plan.overflow);
        assert_eq!(plan.heights, vec![900.0]);
        assert_eq!(plan.spacing, 10.0);
    }

    #[test]
    fn tight_fit_drops_a_block_to_honour_min_spacing() {
        // 3 x 230 = 690 fits in 700 but leaves 3.3pt per gap.
        let plan = pack(&[230.0, 230.0, 230.0], 700.0, 4, 10.0, 0.0);
        assert_eq!(plan.consumed, 2);
        assert!((plan.spacing - 120.0).abs() < 1e-9);
    }

    #[test]
    fn single_tight_block_keeps_going() {
        let plan = pack(&[695.0], 700.0, 4, 10.0, 0.0);
        assert_eq!(plan.consumed, 1);
        assert!(!plan.overflow);
        assert_eq!(plan.spacing, 10.0);
    }

    #[test]
    fn empty_input_consumes_nothing() {
        let plan = pack(&[], 700.0, 4, 10.0, 0.0);
        assert_eq!(plan.consumed, 0);
        assert!(plan.offsets.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn always_makes_progress(
                heights in proptest::collection::vec(1.0f64..2000.0, 1..12),
                max in 50.0f64..1000.0,
                cap in 1usize..6,
            ) {
                let plan = pack(&heights, max, cap, 10.0, 0.0);
                prop_assert!(plan.consumed >= 1);
                prop_assert!(plan.consumed <= cap.min(heights.len()));
                prop_assert_eq!(plan.offsets.len(), plan.consumed);
            }

            #[test]
            fn non_overflowing_pages_fit(
                heights in proptest::collection::vec(1.0f64..400.0, 1..12),
                max in 400.0f64..1000.0,
            ) {
                let plan = pack(&heights, max, 4, 10.0, 0.0);
                let sum: f64 = plan.heights.iter().sum();
                prop_assert!(!plan.overflow);
                prop_assert!(sum <= max + 1e-9);
                prop_assert!(plan.spacing >= 10.0);
                for pair in plan.offsets.windows(2) {
                    prop_assert!(pair[1] > pair[0]);
                }
            }
        }
    }
}
