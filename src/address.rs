//! # Box Addressing
//!
//! Maps rendered positions back to source content so an edit made against a
//! page preview lands on the right [`ContentBlock`](crate::model::ContentBlock).
//!
//! Both the [`PageMap`] and the [`AddressIndex`] are rebuilt from the same
//! [`Layout`] on every build, so they always agree. The index carries the
//! layout version it was built from; an [`EditRequest`] issued against an
//! older version is rejected instead of being applied to whatever block
//! happens to occupy that slot now.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EasyReadError, Result};
use crate::layout::Layout;
use crate::model::ContentBlock;

/// Monotonic layout counter. The first successful build is version 1.
pub type LayoutVersion = u64;

/// A template-relative position on a page: `box1`, `box2`, ...
///
/// Slots are numbered top to bottom starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxSlot(usize);

impl BoxSlot {
    /// Slot numbers start at 1. Zero is clamped to 1.
    pub fn new(number: usize) -> Self {
        BoxSlot(number.max(1))
    }

    pub fn number(self) -> usize {
        self.0
    }

    /// Zero-based position on the page.
    pub fn index(self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for BoxSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box{}", self.0)
    }
}

impl FromStr for BoxSlot {
    type Err = EasyReadError;

    /// Accepts `box3`, `Box3` or a bare `3`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("box")
            .or_else(|| trimmed.strip_prefix("Box"))
            .unwrap_or(trimmed);
        match digits.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(BoxSlot(n)),
            _ => Err(EasyReadError::InvalidSlot(s.to_string())),
        }
    }
}

impl Serialize for BoxSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BoxSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Page number (1-based) → slot → text, in page-then-slot order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PageMap {
    pages: BTreeMap<usize, BTreeMap<BoxSlot, String>>,
}

impl PageMap {
    /// Build the map from a layout and the blocks it was computed from.
    ///
    /// Every layout page gets an entry, including a page with no blocks.
    pub fn from_layout(layout: &Layout, blocks: &[ContentBlock]) -> Self {
        let mut pages = BTreeMap::new();
        for page in &layout.pages {
            let slots = page
                .blocks
                .iter()
                .filter_map(|placed| {
                    blocks
                        .get(placed.content_index)
                        .map(|b| (placed.slot, b.text.clone()))
                })
                .collect();
            pages.insert(page.number, slots);
        }
        PageMap { pages }
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page: usize) -> Option<&BTreeMap<BoxSlot, String>> {
        self.pages.get(&page)
    }

    pub fn get(&self, page: usize, slot: BoxSlot) -> Option<&str> {
        self.pages.get(&page)?.get(&slot).map(String::as_str)
    }

    /// Number of boxes across all pages.
    pub fn box_count(&self) -> usize {
        self.pages.values().map(BTreeMap::len).sum()
    }

    /// Texts in page-then-slot order.
    pub fn flatten(&self) -> Vec<&str> {
        self.pages
            .values()
            .flat_map(|slots| slots.values().map(String::as_str))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeMap<BoxSlot, String>)> {
        self.pages.iter().map(|(n, slots)| (*n, slots))
    }

    /// Replace the text of an existing slot. Returns false if the slot is absent.
    pub(crate) fn set(&mut self, page: usize, slot: BoxSlot, text: &str) -> bool {
        match self.pages.get_mut(&page).and_then(|s| s.get_mut(&slot)) {
            Some(entry) => {
                *entry = text.to_string();
                true
            }
            None => false,
        }
    }
}

/// (page, slot) → content index, tagged with the layout version it describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressIndex {
    version: LayoutVersion,
    #[serde(serialize_with = "serialize_entries")]
    entries: BTreeMap<(usize, BoxSlot), usize>,
}

fn serialize_entries<S: Serializer>(
    entries: &BTreeMap<(usize, BoxSlot), usize>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(
        entries
            .iter()
            .map(|((page, slot), index)| (format!("{}:{}", page, slot), index)),
    )
}

impl AddressIndex {
    pub fn from_layout(layout: &Layout, version: LayoutVersion) -> Self {
        let entries = layout
            .pages
            .iter()
            .flat_map(|page| {
                page.blocks
                    .iter()
                    .map(move |placed| ((page.number, placed.slot), placed.content_index))
            })
            .collect();
        AddressIndex { version, entries }
    }

    pub fn version(&self) -> LayoutVersion {
        self.version
    }

    pub fn resolve(&self, page: usize, slot: BoxSlot) -> Option<usize> {
        self.entries.get(&(page, slot)).copied()
    }

    /// Where a content block landed, if it was placed.
    pub fn locate(&self, content_index: usize) -> Option<(usize, BoxSlot)> {
        self.entries
            .iter()
            .find(|(_, &index)| index == content_index)
            .map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every address. The version is kept so stale edits still report it.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// An edit to one box, issued against a specific layout version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub version: LayoutVersion,
    pub page: usize,
    pub slot: BoxSlot,
    pub text: String,
}

impl EditRequest {
    pub fn new(version: LayoutVersion, page: usize, slot: BoxSlot, text: impl Into<String>) -> Self {
        Self {
            version,
            page,
            slot,
            text: text.into(),
        }
    }

    /// Parse the `PAGE:SLOT=TEXT` form used on the command line.
    pub fn parse_assignment(version: LayoutVersion, assignment: &str) -> Result<Self> {
        let (address, text) = assignment
            .split_once('=')
            .ok_or_else(|| EasyReadError::InvalidSlot(assignment.to_string()))?;
        let (page, slot) = address
            .split_once(':')
            .ok_or_else(|| EasyReadError::InvalidSlot(address.to_string()))?;
        let page = page
            .trim()
            .parse::<usize>()
            .map_err(|_| EasyReadError::InvalidSlot(address.to_string()))?;
        Ok(EditRequest::new(version, page, slot.parse()?, text))
    }
}
