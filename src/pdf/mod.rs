//! # PDF Backend
//!
//! Takes a [`Layout`] and writes a valid PDF file. This is a from-scratch
//! PDF 1.7 writer: the subset an Easy Read document needs (one standard
//! font, raster images, a few rules) is small enough that writing the bytes
//! ourselves keeps the backend self-contained and the output reproducible.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, images)
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Body text uses Type1 Helvetica with WinAnsiEncoding, the same face the
//! layout engine measured with, so wrapped lines land where they were
//! planned. Nothing here moves a block: positions come from the layout.

use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::config::Settings;
use crate::error::Result;
use crate::font::StandardFont;
use crate::image_loader::{ImagePixelData, ImageStore, JpegColorSpace, LoadedImage};
use crate::layout::{Layout, LayoutPage, PageGeometry, Rect};
use crate::model::Metadata;

/// Header/footer text size.
const BAND_FONT_SIZE: f64 = 11.0;
/// Logo cell width; its height is the band height.
const LOGO_WIDTH: f64 = 50.0;
const RULE_GREY: f64 = 0.6;

/// Resource names for the two fonts every page references.
const BODY_FONT: &str = "F1";
const BAND_FONT: &str = "F2";

pub struct PdfWriter;

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// XObject ids, referenced as /Im0, /Im1, ...
    image_objects: Vec<usize>,
    /// Pixel size of each entry in `image_objects`.
    image_sizes: Vec<(u32, u32)>,
    /// Image source → index into `image_objects`.
    image_index: HashMap<String, usize>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        let id = self.objects.len();
        self.objects.push(PdfObject { data });
        id
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write laid-out pages to a PDF byte vector.
    ///
    /// Every image referenced by a placed block or a logo must already be
    /// in `images`; a missing one is drawn as a grey placeholder.
    pub fn write(
        &self,
        layout: &Layout,
        block_images: &[&str],
        images: &ImageStore,
        settings: &Settings,
    ) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder {
            objects: Vec::new(),
            image_objects: Vec::new(),
            image_sizes: Vec::new(),
            image_index: HashMap::new(),
        };

        // 0 = placeholder (PDF objects are 1-indexed), 1 = Catalog, 2 = Pages
        for _ in 0..3 {
            builder.push(Vec::new());
        }

        let body_font_id = builder.push(Self::type1_font_dict(StandardFont::Helvetica));
        let band_font_id = builder.push(Self::type1_font_dict(StandardFont::HelveticaBold));

        self.register_images(&mut builder, layout, block_images, images, settings);

        let resources_id = builder.push(
            self.build_resource_dict(&builder, body_font_id, band_font_id)
                .into_bytes(),
        );

        let g = &layout.geometry;
        let mut page_obj_ids = Vec::with_capacity(layout.pages.len());
        for page in &layout.pages {
            let content = self.build_content_stream_for_page(page, g, block_images, &builder, settings);
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);

            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_obj_id = builder.push(content_data);

            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources {} 0 R >>",
                g.page_width, g.page_height, content_obj_id, resources_id
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = builder.push(Self::info_dict(&settings.metadata).into_bytes());

        Ok(self.serialize(&builder, info_obj_id))
    }

    fn type1_font_dict(font: StandardFont) -> Vec<u8> {
        format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
            font.pdf_name()
        )
        .into_bytes()
    }

    fn info_dict(metadata: &Metadata) -> String {
        let mut info = String::from("<< ");
        if let Some(ref title) = metadata.title {
            let _ = write!(info, "/Title {} ", Self::text_string(title));
        }
        if let Some(ref author) = metadata.author {
            let _ = write!(info, "/Author {} ", Self::text_string(author));
        }
        if let Some(ref subject) = metadata.subject {
            let _ = write!(info, "/Subject {} ", Self::text_string(subject));
        }
        info.push_str("/Producer (easyread) /Creator (easyread) >>");
        info
    }

    /// Write each distinct image once, in first-use order.
    fn register_images(
        &self,
        builder: &mut PdfBuilder,
        layout: &Layout,
        block_images: &[&str],
        images: &ImageStore,
        settings: &Settings,
    ) {
        let placed = layout
            .pages
            .iter()
            .flat_map(|p| p.blocks.iter())
            .filter_map(|b| block_images.get(b.content_index).copied());
        let sources: Vec<&str> = settings.logo_sources().chain(placed).collect();

        for src in sources {
            if builder.image_index.contains_key(src) {
                continue;
            }
            if let Some(image) = images.get(src) {
                let obj_id = Self::write_image_xobject(builder, image);
                builder.image_index.insert(src.to_string(), builder.image_objects.len());
                builder.image_objects.push(obj_id);
                builder.image_sizes.push((image.width_px, image.height_px));
            }
        }
    }

    /// Write a single image as one or two XObject PDF objects.
    /// Returns the main XObject ID.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };

                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace {} \
                     /BitsPerComponent 8 \
                     /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                );
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                let smask_id = alpha.as_ref().map(|alpha_data| {
                    let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                    let mut smask_data: Vec<u8> = Vec::new();
                    let _ = write!(
                        smask_data,
                        "<< /Type /XObject /Subtype /Image \
                         /Width {} /Height {} \
                         /ColorSpace /DeviceGray \
                         /BitsPerComponent 8 \
                         /Filter /FlateDecode \
                         /Length {} >>\nstream\n",
                        image.width_px,
                        image.height_px,
                        compressed_alpha.len()
                    );
                    smask_data.extend_from_slice(&compressed_alpha);
                    smask_data.extend_from_slice(b"\nendstream");
                    builder.push(smask_data)
                });

                let compressed_rgb = compress_to_vec_zlib(rgb, 6);
                let smask_ref = smask_id
                    .map(|id| format!(" /SMask {} 0 R", id))
                    .unwrap_or_default();

                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceRGB \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {}{} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_rgb.len(),
                    smask_ref
                );
                obj_data.extend_from_slice(&compressed_rgb);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }
        }
    }

    /// One resource dictionary shared by every page.
    fn build_resource_dict(&self, builder: &PdfBuilder, body_font_id: usize, band_font_id: usize) -> String {
        let mut dict = format!(
            "<< /Font << /{} {} 0 R /{} {} 0 R >>",
            BODY_FONT, body_font_id, BAND_FONT, band_font_id
        );
        if !builder.image_objects.is_empty() {
            dict.push_str(" /XObject <<");
            for (i, obj_id) in builder.image_objects.iter().enumerate() {
                let _ = write!(dict, " /Im{} {} 0 R", i, obj_id);
            }
            dict.push_str(" >>");
        }
        dict.push_str(" >>");
        dict
    }

    /// Build the PDF content stream for a single page.
    fn build_content_stream_for_page(
        &self,
        page: &LayoutPage,
        g: &PageGeometry,
        block_images: &[&str],
        builder: &PdfBuilder,
        settings: &Settings,
    ) -> String {
        let mut stream = String::new();

        self.write_header(&mut stream, g, builder, settings);
        self.write_footer(&mut stream, g, builder, settings);

        for placed in &page.blocks {
            let src = block_images.get(placed.content_index).copied().unwrap_or_default();
            self.write_image(&mut stream, g, builder, src, &placed.image_cell);

            let _ = writeln!(stream, "BT\n0 0 0 rg\n/{} {:.1} Tf", BODY_FONT, g.font_size);
            for (i, line) in placed.lines.iter().enumerate() {
                if line.text.is_empty() {
                    continue;
                }
                let line_top = placed.text_box.y + i as f64 * g.line_height;
                let baseline = line_top + (g.line_height - g.font_size) / 2.0 + g.font_size * 0.8;
                let _ = writeln!(
                    stream,
                    "1 0 0 1 {:.2} {:.2} Tm\n({}) Tj",
                    placed.text_box.x,
                    g.page_height - baseline,
                    Self::encode_winansi(&line.text)
                );
            }
            stream.push_str("ET\n");
        }

        stream
    }

    /// Logo at the left margin, bold text beside it, rule beneath.
    fn write_header(&self, stream: &mut String, g: &PageGeometry, builder: &PdfBuilder, settings: &Settings) {
        let band_top = g.margin.top;
        let mut text_x = g.margin.left;

        if let Some(logo) = settings.header.logo.as_deref() {
            let cell = Rect {
                x: g.margin.left,
                y: band_top,
                width: LOGO_WIDTH,
                height: g.header_height,
            };
            self.write_image(stream, g, builder, logo, &cell);
            text_x += LOGO_WIDTH + 10.0;
        }

        if !settings.header.text.is_empty() {
            let baseline = band_top + (g.header_height + BAND_FONT_SIZE * 0.7) / 2.0;
            let _ = writeln!(
                stream,
                "BT\n0.2 0.2 0.2 rg\n/{} {:.1} Tf\n1 0 0 1 {:.2} {:.2} Tm\n({}) Tj\nET",
                BAND_FONT,
                BAND_FONT_SIZE,
                text_x,
                g.page_height - baseline,
                Self::encode_winansi(&settings.header.text)
            );
        }

        let rule_y = band_top + g.header_height + (g.header_reserve - g.header_height) / 2.0;
        self.write_rule(stream, g, rule_y);
    }

    /// Logo at the right margin, text right-aligned to its left, rule above.
    fn write_footer(&self, stream: &mut String, g: &PageGeometry, builder: &PdfBuilder, settings: &Settings) {
        let band_top = g.footer_top();
        let right = g.page_width - g.margin.right;
        let mut text_right = right;

        if let Some(logo) = settings.footer.logo.as_deref() {
            let cell = Rect {
                x: right - LOGO_WIDTH,
                y: band_top,
                width: LOGO_WIDTH,
                height: g.footer_height,
            };
            self.write_image(stream, g, builder, logo, &cell);
            text_right -= LOGO_WIDTH + 10.0;
        }

        if !settings.footer.text.is_empty() {
            let width = StandardFont::HelveticaBold
                .metrics()
                .measure_string(&settings.footer.text, BAND_FONT_SIZE, 0.0);
            let baseline = band_top + (g.footer_height + BAND_FONT_SIZE * 0.7) / 2.0;
            let _ = writeln!(
                stream,
                "BT\n0.2 0.2 0.2 rg\n/{} {:.1} Tf\n1 0 0 1 {:.2} {:.2} Tm\n({}) Tj\nET",
                BAND_FONT,
                BAND_FONT_SIZE,
                (text_right - width).max(g.margin.left),
                g.page_height - baseline,
                Self::encode_winansi(&settings.footer.text)
            );
        }

        let rule_y = band_top - (g.footer_reserve - g.footer_height) / 2.0;
        self.write_rule(stream, g, rule_y);
    }

    fn write_rule(&self, stream: &mut String, g: &PageGeometry, y: f64) {
        let pdf_y = g.page_height - y;
        let _ = writeln!(
            stream,
            "q\n{:.2} G\n0.5 w\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ",
            RULE_GREY,
            g.margin.left,
            pdf_y,
            g.page_width - g.margin.right,
            pdf_y
        );
    }

    /// Draw an image fitted into `cell`, or a grey placeholder if it is unknown.
    fn write_image(&self, stream: &mut String, g: &PageGeometry, builder: &PdfBuilder, src: &str, cell: &Rect) {
        match builder.image_index.get(src) {
            Some(&idx) => {
                let (w_px, h_px) = builder.image_sizes[idx];
                let r = crate::image_loader::fit_contain(w_px, h_px, cell);
                let _ = writeln!(
                    stream,
                    "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ",
                    r.width,
                    r.height,
                    r.x,
                    g.page_height - r.y - r.height,
                    idx
                );
            }
            None => {
                let _ = writeln!(
                    stream,
                    "q\n0.9 0.9 0.9 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ",
                    cell.x,
                    g.page_height - cell.y - cell.height,
                    cell.width,
                    cell.height
                );
            }
        }
    }

    /// Escape special characters in a PDF string.
    fn escape_pdf_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }

    /// A PDF text string: a literal when the text is printable ASCII,
    /// otherwise UTF-16BE hex with a byte order mark.
    fn text_string(s: &str) -> String {
        if s.chars().all(|c| (' '..='~').contains(&c)) {
            return format!("({})", Self::escape_pdf_string(s));
        }
        let mut out = String::from("<FEFF");
        for unit in s.encode_utf16() {
            let _ = write!(out, "{:04X}", unit);
        }
        out.push('>');
        out
    }

    /// Encode text as a WinAnsi PDF string body, escaping as needed.
    fn encode_winansi(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            let b = Self::unicode_to_winansi(ch).unwrap_or(b'?');
            match b {
                b'\\' => out.push_str("\\\\"),
                b'(' => out.push_str("\\("),
                b')' => out.push_str("\\)"),
                0x20..=0x7E => out.push(b as char),
                _ => {
                    let _ = write!(out, "\\{:03o}", b);
                }
            }
        }
        out
    }

    /// Map a Unicode codepoint to a WinAnsiEncoding byte value.
    ///
    /// WinAnsiEncoding is based on Windows-1252. Most codepoints in
    /// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
    /// contains special mappings for smart quotes, bullets, dashes, etc.
    fn unicode_to_winansi(ch: char) -> Option<u8> {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
            return Some(cp as u8);
        }
        match cp {
            0x20AC => Some(0x80), // Euro sign
            0x201A => Some(0x82), // Single low-9 quotation mark
            0x0192 => Some(0x83), // Latin small letter f with hook
            0x201E => Some(0x84), // Double low-9 quotation mark
            0x2026 => Some(0x85), // Horizontal ellipsis
            0x2020 => Some(0x86), // Dagger
            0x2021 => Some(0x87), // Double dagger
            0x02C6 => Some(0x88), // Modifier letter circumflex accent
            0x2030 => Some(0x89), // Per mille sign
            0x0160 => Some(0x8A), // Latin capital letter S with caron
            0x2039 => Some(0x8B), // Single left-pointing angle quotation
            0x0152 => Some(0x8C), // Latin capital ligature OE
            0x017D => Some(0x8E), // Latin capital letter Z with caron
            0x2018 => Some(0x91), // Left single quotation mark
            0x2019 => Some(0x92), // Right single quotation mark
            0x201C => Some(0x93), // Left double quotation mark
            0x201D => Some(0x94), // Right double quotation mark
            0x2022 => Some(0x95), // Bullet
            0x2013 => Some(0x96), // En dash
            0x2014 => Some(0x97), // Em dash
            0x02DC => Some(0x98), // Small tilde
            0x2122 => Some(0x99), // Trade mark sign
            0x0161 => Some(0x9A), // Latin small letter s with caron
            0x203A => Some(0x9B), // Single right-pointing angle quotation
            0x0153 => Some(0x9C), // Latin small ligature oe
            0x017E => Some(0x9E), // Latin small letter z with caron
            0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
            _ => None,
        }
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;
    use crate::layout::{BackendProfile, LayoutEngine};
    use crate::model::{ContentBlock, LayoutTemplate};

    fn layout_for(blocks: &[ContentBlock]) -> Layout {
        let ctx = FontContext::new();
        LayoutEngine::new(&ctx, BackendProfile::pdf().geometry(LayoutTemplate::Four)).paginate(blocks)
    }

    fn page_streams(pdf: &[u8]) -> Vec<String> {
        let mut streams = Vec::new();
        let mut rest = pdf;
        let marker = b"/Filter /FlateDecode >>\nstream\n";
        while let Some(pos) = rest.windows(marker.len()).position(|w| w == marker) {
            let start = pos + marker.len();
            let header = String::from_utf8_lossy(&rest[..pos]);
            let len: usize = header
                .rsplit("/Length ")
                .next()
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse().ok())
                .unwrap();
            let raw = miniz_oxide::inflate::decompress_to_vec_zlib(&rest[start..start + len]).unwrap();
            streams.push(String::from_utf8_lossy(&raw).into_owned());
            rest = &rest[start + len..];
        }
        streams
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(PdfWriter::escape_pdf_string("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(PdfWriter::escape_pdf_string("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn info_strings_outside_ascii_are_utf16() {
        assert_eq!(PdfWriter::text_string("Your (Rights)"), "(Your \\(Rights\\))");
        assert_eq!(PdfWriter::text_string("Café"), "<FEFF00430061006600E9>");
        assert_eq!(PdfWriter::text_string("🏠"), "<FEFFD83CDFE0>");

        let metadata = Metadata {
            title: Some("Café rights".to_string()),
            author: Some("Support team".to_string()),
            ..Metadata::default()
        };
        let info = PdfWriter::info_dict(&metadata);
        assert!(info.contains("/Title <FEFF"), "{info}");
        assert!(info.contains("/Author (Support team)"), "{info}");
        assert!(info.is_ascii());
    }

    #[test]
    fn winansi_encoding() {
        assert_eq!(PdfWriter::encode_winansi("caf\u{e9}"), "caf\\351");
        assert_eq!(PdfWriter::encode_winansi("\u{2019}"), "\\222");
        assert_eq!(PdfWriter::encode_winansi("\u{4E2D}"), "?");
    }

    #[test]
    fn empty_layout_produces_single_page_pdf() {
        let layout = layout_for(&[]);
        let bytes = PdfWriter::new()
            .write(&layout, &[], &ImageStore::new(), &Settings::default())
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/BaseFont /Helvetica "));
    }

    #[test]
    fn blocks_and_bands_are_drawn() {
        let blocks = vec![
            ContentBlock::new("missing.png", "You have rights."),
            ContentBlock::new("missing.png", "We listen to you."),
        ];
        let layout = layout_for(&blocks);
        let settings = Settings {
            header: crate::config::HeaderFooter {
                text: "Easy Read (Rights)".to_string(),
                logo: None,
            },
            footer: crate::config::HeaderFooter {
                text: "Page footer".to_string(),
                logo: None,
            },
            metadata: Metadata {
                title: Some("Your Rights".to_string()),
                ..Metadata::default()
            },
            ..Settings::default()
        };
        let refs: Vec<&str> = blocks.iter().map(|b| b.image_reference.as_str()).collect();
        let bytes = PdfWriter::new()
            .write(&layout, &refs, &ImageStore::new(), &settings)
            .unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Title (Your Rights)"));

        let streams = page_streams(&bytes);
        assert_eq!(streams.len(), 1);
        let page = &streams[0];
        assert!(page.contains("(You have rights.) Tj"));
        assert!(page.contains("(We listen to you.) Tj"));
        assert!(page.contains("(Easy Read \\(Rights\\)) Tj"));
        assert!(page.contains("(Page footer) Tj"));
        // Unknown images become placeholders.
        assert_eq!(page.matches("0.9 0.9 0.9 rg").count(), 2);
    }

    #[test]
    fn shared_image_is_embedded_once() {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        img.save(&path).unwrap();
        let src = path.to_string_lossy().into_owned();

        let mut store = ImageStore::new();
        store.load_all([src.as_str()], None).unwrap();

        let blocks: Vec<ContentBlock> = (0..5).map(|i| ContentBlock::new(src.clone(), format!("Block {i}"))).collect();
        let layout = layout_for(&blocks);
        let refs: Vec<&str> = blocks.iter().map(|b| b.image_reference.as_str()).collect();
        let bytes = PdfWriter::new()
            .write(&layout, &refs, &store, &Settings::default())
            .unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert_eq!(text.matches("/Subtype /Image").count(), 1);
        assert!(text.contains("/Count 2"));
        let streams = page_streams(&bytes);
        assert_eq!(streams[0].matches("/Im0 Do").count(), 4);
        assert_eq!(streams[1].matches("/Im0 Do").count(), 1);
    }
}
