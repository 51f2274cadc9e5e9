//! # Page Geometry
//!
//! The fixed physical contract between the packing algorithm and a render
//! backend. A [`BackendProfile`] holds everything that differs between the
//! PDF canvas and the flowed DOCX document; [`BackendProfile::geometry`]
//! resolves it for one template into a read-only [`PageGeometry`].
//!
//! Coordinates are in points, measured from the top-left corner of the page.
//! The PDF writer flips them when it emits content streams.

use serde::Serialize;

use crate::model::{Backend, Edges, LayoutTemplate, PageSize};

/// Backend-specific page and typography constants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProfile {
    pub backend: Backend,
    pub page_size: PageSize,
    pub margin: Edges,
    /// Height of the header band (logo + text).
    pub header_height: f64,
    /// Height of the footer band.
    pub footer_height: f64,
    /// Gap between a band and the content area.
    pub band_gap: f64,
    /// Width of the image + text row. Centred in the content area.
    pub block_width: f64,
    /// Square image cell edge for template 3.
    pub image_cell_three: f64,
    /// Square image cell edge for template 4.
    pub image_cell_four: f64,
    /// Horizontal gap between the image cell and the text column.
    pub column_gap: f64,
    /// Reference font used to measure body text.
    pub font_family: String,
    pub font_size: f64,
    pub line_height_factor: f64,
    /// Minimum vertical space after each block.
    pub min_spacing: f64,
}

impl BackendProfile {
    /// A4 canvas with Helvetica body text.
    pub fn pdf() -> Self {
        let page_size = PageSize::A4;
        let margin = Edges::symmetric(25.0, 40.0);
        let content_width = page_size.dimensions().0 - margin.horizontal();
        BackendProfile {
            backend: Backend::Pdf,
            page_size,
            margin,
            header_height: 25.0,
            footer_height: 25.0,
            band_gap: 10.0,
            block_width: content_width,
            image_cell_three: content_width / 3.0,
            image_cell_four: content_width / 4.0,
            column_gap: 10.0,
            font_family: "Helvetica".to_string(),
            font_size: 14.0,
            line_height_factor: 1.5,
            min_spacing: 10.0,
        }
    }

    /// US Letter flowed document with Arial body text.
    ///
    /// Image cells are 2in and 1.5in inside a 6in table; the header and
    /// footer parts each reserve half an inch.
    pub fn docx() -> Self {
        BackendProfile {
            backend: Backend::Docx,
            page_size: PageSize::Letter,
            margin: Edges::uniform(72.0),
            header_height: 36.0,
            footer_height: 36.0,
            band_gap: 0.0,
            block_width: 432.0,
            image_cell_three: 144.0,
            image_cell_four: 108.0,
            column_gap: 11.52,
            font_family: "Arial".to_string(),
            font_size: 14.0,
            line_height_factor: 1.2,
            min_spacing: 10.0,
        }
    }

    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Pdf => Self::pdf(),
            Backend::Docx => Self::docx(),
        }
    }

    pub fn with_font_size(mut self, font_size: f64) -> Self {
        if font_size > 0.0 {
            self.font_size = font_size;
        }
        self
    }

    pub fn with_min_spacing(mut self, min_spacing: f64) -> Self {
        if min_spacing >= 0.0 {
            self.min_spacing = min_spacing;
        }
        self
    }

    /// Measure body text with a different registered family.
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn image_cell(&self, template: LayoutTemplate) -> f64 {
        match template {
            LayoutTemplate::Three => self.image_cell_three,
            LayoutTemplate::Four => self.image_cell_four,
        }
    }

    /// Resolve the page geometry for one template.
    pub fn geometry(&self, template: LayoutTemplate) -> PageGeometry {
        let (page_width, page_height) = self.page_size.dimensions();
        let header_reserve = self.header_height + self.band_gap;
        let footer_reserve = self.footer_height + self.band_gap;
        let content_width = page_width - self.margin.horizontal();
        let block_x = self.margin.left + (content_width - self.block_width).max(0.0) / 2.0;
        let image_cell = self.image_cell(template);
        let text_x = block_x + image_cell + self.column_gap;

        PageGeometry {
            backend: self.backend,
            template,
            page_width,
            page_height,
            margin: self.margin,
            header_height: self.header_height,
            footer_height: self.footer_height,
            header_reserve,
            footer_reserve,
            content_top: self.margin.top + header_reserve,
            content_width,
            usable_height: page_height - self.margin.vertical() - header_reserve - footer_reserve,
            block_x,
            block_width: self.block_width,
            image_cell,
            text_x,
            text_width: (block_x + self.block_width - text_x).max(0.0),
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            line_height: self.font_size * self.line_height_factor,
            min_spacing: self.min_spacing,
        }
    }
}

/// Resolved geometry for one (backend, template) pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub backend: Backend,
    pub template: LayoutTemplate,
    pub page_width: f64,
    pub page_height: f64,
    pub margin: Edges,
    pub header_height: f64,
    pub footer_height: f64,
    pub header_reserve: f64,
    pub footer_reserve: f64,
    /// Y of the first block on every page.
    pub content_top: f64,
    pub content_width: f64,
    /// Page height minus margins and header/footer reservations.
    pub usable_height: f64,
    pub block_x: f64,
    pub block_width: f64,
    /// Edge of the square image cell.
    pub image_cell: f64,
    pub text_x: f64,
    pub text_width: f64,
    pub font_family: String,
    pub font_size: f64,
    /// Baseline-to-baseline distance.
    pub line_height: f64,
    pub min_spacing: f64,
}

impl PageGeometry {
    /// Y of the top of the footer band.
    pub fn footer_top(&self) -> f64 {
        self.page_height - self.margin.bottom - self.footer_height
    }

    pub fn content_bottom(&self) -> f64 {
        self.content_top + self.usable_height
    }

    pub fn boxes_per_page(&self) -> usize {
        self.template.boxes_per_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_usable_height_subtracts_reservations() {
        let g = BackendProfile::pdf().geometry(LayoutTemplate::Four);
        let expected = 841.89 - 25.0 - 25.0 - 35.0 - 35.0;
        assert!((g.usable_height - expected).abs() < 1e-9);
        assert!((g.content_top - 60.0).abs() < 1e-9);
        assert!((g.content_bottom() - (g.footer_top() - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn template_three_has_larger_image_and_narrower_text() {
        for profile in [BackendProfile::pdf(), BackendProfile::docx()] {
            let three = profile.geometry(LayoutTemplate::Three);
            let four = profile.geometry(LayoutTemplate::Four);
            assert!(three.image_cell > four.image_cell);
            assert!(three.text_width < four.text_width);
        }
    }

    #[test]
    fn full_template_of_images_fits_the_page() {
        for profile in [BackendProfile::pdf(), BackendProfile::docx()] {
            for template in [LayoutTemplate::Three, LayoutTemplate::Four] {
                let g = profile.geometry(template);
                let images = g.image_cell * template.boxes_per_page() as f64;
                let spacing = (g.usable_height - images) / template.boxes_per_page() as f64;
                assert!(
                    spacing >= g.min_spacing,
                    "{:?} template {} leaves only {spacing}pt",
                    profile.backend,
                    template
                );
            }
        }
    }

    #[test]
    fn docx_table_is_centred() {
        let g = BackendProfile::docx().geometry(LayoutTemplate::Three);
        assert!((g.block_x - 90.0).abs() < 1e-9);
        assert!((g.text_x + g.text_width - (90.0 + 432.0)).abs() < 1e-9);
        assert!((g.usable_height - (792.0 - 144.0 - 72.0)).abs() < 1e-9);
    }

    #[test]
    fn line_spacing_stays_in_easy_read_range() {
        for profile in [BackendProfile::pdf(), BackendProfile::docx()] {
            let g = profile.geometry(LayoutTemplate::Four);
            let factor = g.line_height / g.font_size;
            assert!(
                (1.2 - 1e-9..=1.5 + 1e-9).contains(&factor),
                "{:?} line height is {factor}x the font size",
                profile.backend
            );
        }
        let docx = BackendProfile::docx().geometry(LayoutTemplate::Three);
        assert!((docx.line_height - 14.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn overrides_ignore_nonsense() {
        let p = BackendProfile::pdf().with_font_size(-1.0).with_min_spacing(-5.0);
        assert_eq!(p.font_size, 14.0);
        assert_eq!(p.min_spacing, 10.0);
    }
}
