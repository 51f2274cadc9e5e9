//! # DOCX Backend
//!
//! Writes the layout as a WordprocessingML package. Unlike the PDF canvas,
//! a word processor flows content itself, so this backend steers Word into
//! reproducing the planned pages instead of placing anything absolutely:
//!
//! - every block is a one-row, two-column table (image cell, text cell)
//!   whose row may not split across pages;
//! - consecutive blocks are separated by a spacer paragraph of exact
//!   height equal to the page's planned spacing;
//! - each planned page after the first starts with a `pageBreakBefore`
//!   paragraph, so a page holds exactly the blocks the planner gave it.
//!
//! Text lines are not emitted individually: each source paragraph becomes a
//! Word paragraph with an exact line pitch and Word wraps it. The planner's
//! estimate and Word's wrapping can disagree by a line; the page breaks
//! keep that from moving blocks between pages.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{HeaderFooter, Settings};
use crate::error::{EasyReadError, Result};
use crate::image_loader::{fit_contain, ImageStore};
use crate::layout::{Layout, PageGeometry, PlacedBlock, Rect};
use crate::text::split_paragraphs;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const LOGO_BOX: f64 = 72.0;
const BAND_FONT_HALF_POINTS: &str = "22";

fn twips(pt: f64) -> String {
    format!("{}", (pt * 20.0).round() as i64)
}

fn emu(pt: f64) -> String {
    format!("{}", (pt * 12700.0).round() as i64)
}

fn add_part(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, bytes: &[u8]) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)?;
    zip.write_all(bytes).map_err(zip::result::ZipError::from)?;
    Ok(())
}

fn xml_err<E: Display>(e: E) -> EasyReadError {
    EasyReadError::Render(format!("XML write failed: {}", e))
}

/// Thin event writer over quick-xml.
struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;
        Ok(Xml { writer })
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut el = BytesStart::new(name.to_string());
        for &(key, value) in attrs {
            el.push_attribute((key, value));
        }
        el
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Start(Self::element(name, attrs)))
            .map_err(xml_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Empty(Self::element(name, attrs)))
            .map_err(xml_err)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)
    }

    /// `<name attrs>text</name>`
    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// An image part and the relationship that points at it.
struct MediaEntry {
    rel_id: String,
    part_name: String,
    width_px: u32,
    height_px: u32,
}

/// Media parts and relationships for one XML part (document, header, footer).
#[derive(Default)]
struct PartMedia {
    entries: HashMap<String, MediaEntry>,
    order: Vec<String>,
}

impl PartMedia {
    fn rels(&self, extra: &[(&str, &str, &str)]) -> Result<Vec<u8>> {
        let mut xml = Xml::new()?;
        xml.start("Relationships", &[("xmlns", NS_PKG_RELS)])?;
        for &(id, kind, target) in extra {
            xml.empty("Relationship", &[("Id", id), ("Type", kind), ("Target", target)])?;
        }
        for src in &self.order {
            let entry = &self.entries[src];
            xml.empty(
                "Relationship",
                &[
                    ("Id", &entry.rel_id),
                    ("Type", REL_IMAGE),
                    ("Target", &entry.part_name),
                ],
            )?;
        }
        xml.end("Relationships")?;
        Ok(xml.finish())
    }
}

/// Shared state while one package is assembled.
struct Package<'a> {
    images: &'a ImageStore,
    /// media file name → bytes, written once.
    media_files: Vec<(String, Vec<u8>)>,
    /// image source → media file name.
    media_names: HashMap<String, String>,
    next_drawing_id: usize,
}

impl<'a> Package<'a> {
    /// Relationship for `src` within `part`, adding the media file on first use.
    fn media_for(&mut self, part: &mut PartMedia, src: &str, prefix: &str) -> Result<Option<String>> {
        if let Some(entry) = part.entries.get(src) {
            return Ok(Some(entry.rel_id.clone()));
        }
        let Some(image) = self.images.get(src) else {
            return Ok(None);
        };

        let file_name = match self.media_names.get(src) {
            Some(name) => name.clone(),
            None => {
                let (bytes, ext) = image.embeddable()?;
                let name = format!("image{}.{}", self.media_files.len() + 1, ext);
                self.media_files.push((name.clone(), bytes));
                self.media_names.insert(src.to_string(), name.clone());
                name
            }
        };

        let rel_id = format!("{}{}", prefix, part.order.len() + 1);
        part.entries.insert(
            src.to_string(),
            MediaEntry {
                rel_id: rel_id.clone(),
                part_name: format!("media/{}", file_name),
                width_px: image.width_px,
                height_px: image.height_px,
            },
        );
        part.order.push(src.to_string());
        Ok(Some(rel_id))
    }

    fn drawing_id(&mut self) -> usize {
        self.next_drawing_id += 1;
        self.next_drawing_id
    }
}

pub struct DocxWriter;

impl Default for DocxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write the layout to DOCX bytes.
    ///
    /// `block_images[i]` is the image reference of content block `i`.
    pub fn write(
        &self,
        layout: &Layout,
        block_images: &[&str],
        block_texts: &[&str],
        images: &ImageStore,
        settings: &Settings,
    ) -> Result<Vec<u8>> {
        let mut package = Package {
            images,
            media_files: Vec::new(),
            media_names: HashMap::new(),
            next_drawing_id: 0,
        };

        let mut doc_media = PartMedia::default();
        let document = self.document_xml(layout, block_images, block_texts, &mut package, &mut doc_media)?;

        let mut header_media = PartMedia::default();
        let header = self.band_xml("w:hdr", &settings.header, false, &layout.geometry, &mut package, &mut header_media)?;
        let mut footer_media = PartMedia::default();
        let footer = self.band_xml("w:ftr", &settings.footer, true, &layout.geometry, &mut package, &mut footer_media)?;

        let doc_rels = doc_media.rels(&[
            ("rIdStyles", "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles", "styles.xml"),
            ("rIdHeader", "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header", "header1.xml"),
            ("rIdFooter", "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer", "footer1.xml"),
        ])?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        add_part(&mut zip, "[Content_Types].xml", &self.content_types_xml()?)?;
        add_part(&mut zip, "_rels/.rels", &self.root_rels_xml()?)?;
        add_part(&mut zip, "docProps/core.xml", &self.core_xml(settings)?)?;
        add_part(&mut zip, "word/document.xml", &document)?;
        add_part(&mut zip, "word/styles.xml", &self.styles_xml(&layout.geometry, settings)?)?;
        add_part(&mut zip, "word/header1.xml", &header)?;
        add_part(&mut zip, "word/footer1.xml", &footer)?;
        add_part(&mut zip, "word/_rels/document.xml.rels", &doc_rels)?;
        add_part(&mut zip, "word/_rels/header1.xml.rels", &header_media.rels(&[])?)?;
        add_part(&mut zip, "word/_rels/footer1.xml.rels", &footer_media.rels(&[])?)?;
        for (name, bytes) in &package.media_files {
            add_part(&mut zip, &format!("word/media/{}", name), bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    fn document_xml(
        &self,
        layout: &Layout,
        block_images: &[&str],
        block_texts: &[&str],
        package: &mut Package<'_>,
        media: &mut PartMedia,
    ) -> Result<Vec<u8>> {
        let g = &layout.geometry;
        let mut xml = Xml::new()?;
        xml.start(
            "w:document",
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        )?;
        xml.start("w:body", &[])?;

        for (page_idx, page) in layout.pages.iter().enumerate() {
            if page_idx > 0 {
                self.exact_paragraph(&mut xml, 1.0, true)?;
            }
            for (k, placed) in page.blocks.iter().enumerate() {
                if k > 0 {
                    self.exact_paragraph(&mut xml, page.spacing, false)?;
                }
                let src = block_images.get(placed.content_index).copied().unwrap_or_default();
                let text = block_texts.get(placed.content_index).copied().unwrap_or_default();
                let rel = package.media_for(media, src, "rIdImg")?;
                self.block_table(&mut xml, g, placed, rel.as_deref(), text, media, package)?;
            }
        }

        // Word needs a paragraph after a trailing table.
        self.exact_paragraph(&mut xml, 1.0, false)?;
        self.section_properties(&mut xml, g)?;

        xml.end("w:body")?;
        xml.end("w:document")?;
        Ok(xml.finish())
    }

    /// Empty paragraph of exact height, optionally starting a new page.
    fn exact_paragraph(&self, xml: &mut Xml, height: f64, page_break_before: bool) -> Result<()> {
        let line = twips(height.max(1.0));
        xml.start("w:p", &[])?;
        xml.start("w:pPr", &[])?;
        if page_break_before {
            xml.empty("w:pageBreakBefore", &[])?;
        }
        xml.empty(
            "w:spacing",
            &[("w:before", "0"), ("w:after", "0"), ("w:line", &line), ("w:lineRule", "exact")],
        )?;
        xml.start("w:rPr", &[])?;
        xml.empty("w:sz", &[("w:val", "2")])?;
        xml.end("w:rPr")?;
        xml.end("w:pPr")?;
        xml.end("w:p")
    }

    #[allow(clippy::too_many_arguments)]
    fn block_table(
        &self,
        xml: &mut Xml,
        g: &PageGeometry,
        placed: &PlacedBlock,
        image_rel: Option<&str>,
        text: &str,
        media: &PartMedia,
        package: &mut Package<'_>,
    ) -> Result<()> {
        let image_col = g.text_x - g.block_x;
        let text_col = g.text_width;

        xml.start("w:tbl", &[])?;
        xml.start("w:tblPr", &[])?;
        xml.empty("w:tblW", &[("w:w", &twips(g.block_width)), ("w:type", "dxa")])?;
        xml.empty("w:jc", &[("w:val", "center")])?;
        xml.empty("w:tblLayout", &[("w:type", "fixed")])?;
        xml.start("w:tblCellMar", &[])?;
        for side in ["w:top", "w:left", "w:bottom", "w:right"] {
            xml.empty(side, &[("w:w", "0"), ("w:type", "dxa")])?;
        }
        xml.end("w:tblCellMar")?;
        xml.end("w:tblPr")?;

        xml.start("w:tblGrid", &[])?;
        xml.empty("w:gridCol", &[("w:w", &twips(image_col))])?;
        xml.empty("w:gridCol", &[("w:w", &twips(text_col))])?;
        xml.end("w:tblGrid")?;

        xml.start("w:tr", &[])?;
        xml.start("w:trPr", &[])?;
        xml.empty("w:cantSplit", &[])?;
        xml.empty(
            "w:trHeight",
            &[("w:val", &twips(placed.bounds.height)), ("w:hRule", "atLeast")],
        )?;
        xml.end("w:trPr")?;

        // Image cell
        self.cell_start(xml, image_col)?;
        xml.start("w:p", &[])?;
        xml.start("w:pPr", &[])?;
        xml.empty("w:spacing", &[("w:before", "0"), ("w:after", "0")])?;
        xml.end("w:pPr")?;
        if let Some(rel) = image_rel {
            let entry = media.entries.values().find(|e| e.rel_id == rel);
            if let Some(entry) = entry {
                let cell = Rect {
                    x: 0.0,
                    y: 0.0,
                    width: g.image_cell,
                    height: g.image_cell,
                };
                let fitted = fit_contain(entry.width_px, entry.height_px, &cell);
                let id = package.drawing_id();
                self.inline_drawing(xml, rel, id, fitted.width, fitted.height)?;
            }
        }
        xml.end("w:p")?;
        xml.end("w:tc")?;

        // Text cell: one Word paragraph per source paragraph.
        self.cell_start(xml, text_col)?;
        let line = twips(g.line_height);
        let paragraphs = split_paragraphs(text);
        let paragraphs = if paragraphs.is_empty() { vec![""] } else { paragraphs };
        for paragraph in paragraphs {
            xml.start("w:p", &[])?;
            xml.start("w:pPr", &[])?;
            xml.empty(
                "w:spacing",
                &[("w:before", "0"), ("w:after", "0"), ("w:line", &line), ("w:lineRule", "exact")],
            )?;
            xml.end("w:pPr")?;
            if !paragraph.trim().is_empty() {
                xml.start("w:r", &[])?;
                xml.leaf("w:t", &[("xml:space", "preserve")], paragraph.trim())?;
                xml.end("w:r")?;
            }
            xml.end("w:p")?;
        }
        xml.end("w:tc")?;

        xml.end("w:tr")?;
        xml.end("w:tbl")
    }

    fn cell_start(&self, xml: &mut Xml, width: f64) -> Result<()> {
        xml.start("w:tc", &[])?;
        xml.start("w:tcPr", &[])?;
        xml.empty("w:tcW", &[("w:w", &twips(width)), ("w:type", "dxa")])?;
        xml.empty("w:vAlign", &[("w:val", "center")])?;
        xml.end("w:tcPr")
    }

    /// An inline DrawingML picture run.
    fn inline_drawing(&self, xml: &mut Xml, rel: &str, id: usize, width: f64, height: f64) -> Result<()> {
        let (cx, cy) = (emu(width), emu(height));
        let id = id.to_string();
        let name = format!("Picture {}", id);

        xml.start("w:r", &[])?;
        xml.start("w:drawing", &[])?;
        xml.start("wp:inline", &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")])?;
        xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
        xml.empty("wp:docPr", &[("id", &id), ("name", &name)])?;
        xml.start("a:graphic", &[("xmlns:a", NS_A)])?;
        xml.start("a:graphicData", &[("uri", NS_PIC)])?;
        xml.start("pic:pic", &[("xmlns:pic", NS_PIC)])?;
        xml.start("pic:nvPicPr", &[])?;
        xml.empty("pic:cNvPr", &[("id", &id), ("name", &name)])?;
        xml.empty("pic:cNvPicPr", &[])?;
        xml.end("pic:nvPicPr")?;
        xml.start("pic:blipFill", &[])?;
        xml.empty("a:blip", &[("r:embed", rel)])?;
        xml.start("a:stretch", &[])?;
        xml.empty("a:fillRect", &[])?;
        xml.end("a:stretch")?;
        xml.end("pic:blipFill")?;
        xml.start("pic:spPr", &[])?;
        xml.start("a:xfrm", &[])?;
        xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
        xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        xml.end("a:xfrm")?;
        xml.start("a:prstGeom", &[("prst", "rect")])?;
        xml.empty("a:avLst", &[])?;
        xml.end("a:prstGeom")?;
        xml.end("pic:spPr")?;
        xml.end("pic:pic")?;
        xml.end("a:graphicData")?;
        xml.end("a:graphic")?;
        xml.end("wp:inline")?;
        xml.end("w:drawing")?;
        xml.end("w:r")
    }

    /// Header (logo left, text beside, rule beneath) or footer (text then
    /// logo, right-aligned, rule above).
    fn band_xml(
        &self,
        root: &str,
        band: &HeaderFooter,
        is_footer: bool,
        g: &PageGeometry,
        package: &mut Package<'_>,
        media: &mut PartMedia,
    ) -> Result<Vec<u8>> {
        let band_height = if is_footer { g.footer_height } else { g.header_height };
        let mut xml = Xml::new()?;
        xml.start(
            root,
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        )?;
        xml.start("w:p", &[])?;
        xml.start("w:pPr", &[])?;
        xml.start("w:pBdr", &[])?;
        xml.empty(
            if is_footer { "w:top" } else { "w:bottom" },
            &[("w:val", "single"), ("w:sz", "4"), ("w:space", "1"), ("w:color", "999999")],
        )?;
        xml.end("w:pBdr")?;
        xml.empty("w:spacing", &[("w:before", "0"), ("w:after", "0")])?;
        xml.empty("w:jc", &[("w:val", if is_footer { "right" } else { "left" })])?;
        xml.end("w:pPr")?;

        let logo = match band.logo.as_deref() {
            Some(src) => {
                let prefix = if is_footer { "rIdFooterLogo" } else { "rIdHeaderLogo" };
                match package.media_for(media, src, prefix)? {
                    Some(rel) => {
                        let entry = &media.entries[src];
                        let cell = Rect {
                            x: 0.0,
                            y: 0.0,
                            width: LOGO_BOX,
                            height: band_height,
                        };
                        Some((rel, fit_contain(entry.width_px, entry.height_px, &cell)))
                    }
                    None => None,
                }
            }
            None => None,
        };

        if !is_footer {
            if let Some((rel, size)) = &logo {
                let id = package.drawing_id();
                self.inline_drawing(&mut xml, rel, id, size.width, size.height)?;
            }
        }
        if !band.text.is_empty() {
            let text = if logo.is_some() && !is_footer {
                format!(" {}", band.text)
            } else if logo.is_some() {
                format!("{} ", band.text)
            } else {
                band.text.clone()
            };
            xml.start("w:r", &[])?;
            xml.start("w:rPr", &[])?;
            xml.empty("w:b", &[])?;
            xml.empty("w:sz", &[("w:val", BAND_FONT_HALF_POINTS)])?;
            xml.end("w:rPr")?;
            xml.leaf("w:t", &[("xml:space", "preserve")], &text)?;
            xml.end("w:r")?;
        }
        if is_footer {
            if let Some((rel, size)) = &logo {
                let id = package.drawing_id();
                self.inline_drawing(&mut xml, rel, id, size.width, size.height)?;
            }
        }

        xml.end("w:p")?;
        xml.end(root)?;
        Ok(xml.finish())
    }

    /// Page size and margins. The top and bottom margins include the band
    /// reservations so the body starts where the layout's content area does.
    fn section_properties(&self, xml: &mut Xml, g: &PageGeometry) -> Result<()> {
        xml.start("w:sectPr", &[])?;
        xml.empty("w:headerReference", &[("w:type", "default"), ("r:id", "rIdHeader")])?;
        xml.empty("w:footerReference", &[("w:type", "default"), ("r:id", "rIdFooter")])?;
        xml.empty("w:pgSz", &[("w:w", &twips(g.page_width)), ("w:h", &twips(g.page_height))])?;
        xml.empty(
            "w:pgMar",
            &[
                ("w:top", &twips(g.margin.top + g.header_reserve)),
                ("w:right", &twips(g.margin.right)),
                ("w:bottom", &twips(g.margin.bottom + g.footer_reserve)),
                ("w:left", &twips(g.margin.left)),
                ("w:header", &twips(g.margin.top)),
                ("w:footer", &twips(g.margin.bottom)),
                ("w:gutter", "0"),
            ],
        )?;
        xml.end("w:sectPr")
    }

    fn styles_xml(&self, g: &PageGeometry, settings: &Settings) -> Result<Vec<u8>> {
        let font = settings.docx_font_name.as_str();
        let size = format!("{}", (g.font_size * 2.0).round() as i64);
        let mut xml = Xml::new()?;
        xml.start("w:styles", &[("xmlns:w", NS_W)])?;
        xml.start("w:docDefaults", &[])?;
        xml.start("w:rPrDefault", &[])?;
        xml.start("w:rPr", &[])?;
        xml.empty(
            "w:rFonts",
            &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font), ("w:eastAsia", font)],
        )?;
        xml.empty("w:sz", &[("w:val", &size)])?;
        xml.empty("w:szCs", &[("w:val", &size)])?;
        xml.end("w:rPr")?;
        xml.end("w:rPrDefault")?;
        xml.start("w:pPrDefault", &[])?;
        xml.start("w:pPr", &[])?;
        xml.empty("w:spacing", &[("w:after", "0")])?;
        xml.end("w:pPr")?;
        xml.end("w:pPrDefault")?;
        xml.end("w:docDefaults")?;
        xml.end("w:styles")?;
        Ok(xml.finish())
    }

    fn content_types_xml(&self) -> Result<Vec<u8>> {
        let main = "application/vnd.openxmlformats-officedocument.wordprocessingml";
        let mut xml = Xml::new()?;
        xml.start(
            "Types",
            &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")],
        )?;
        for (ext, kind) in [
            ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
            ("xml", "application/xml"),
            ("png", "image/png"),
            ("jpeg", "image/jpeg"),
        ] {
            xml.empty("Default", &[("Extension", ext), ("ContentType", kind)])?;
        }
        let overrides = [
            ("/word/document.xml", format!("{}.document.main+xml", main)),
            ("/word/styles.xml", format!("{}.styles+xml", main)),
            ("/word/header1.xml", format!("{}.header+xml", main)),
            ("/word/footer1.xml", format!("{}.footer+xml", main)),
            (
                "/docProps/core.xml",
                "application/vnd.openxmlformats-package.core-properties+xml".to_string(),
            ),
        ];
        for (part, kind) in &overrides {
            xml.empty("Override", &[("PartName", part), ("ContentType", kind)])?;
        }
        xml.end("Types")?;
        Ok(xml.finish())
    }

    fn root_rels_xml(&self) -> Result<Vec<u8>> {
        PartMedia::default().rels(&[
            (
                "rId1",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
                "word/document.xml",
            ),
            (
                "rId2",
                "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
                "docProps/core.xml",
            ),
        ])
    }

    fn core_xml(&self, settings: &Settings) -> Result<Vec<u8>> {
        let meta = &settings.metadata;
        let mut xml = Xml::new()?;
        xml.start(
            "cp:coreProperties",
            &[
                ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
                ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ],
        )?;
        if let Some(title) = &meta.title {
            xml.leaf("dc:title", &[], title)?;
        }
        if let Some(subject) = &meta.subject {
            xml.leaf("dc:subject", &[], subject)?;
        }
        xml.leaf("dc:creator", &[], meta.author.as_deref().unwrap_or("easyread"))?;
        xml.end("cp:coreProperties")?;
        Ok(xml.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;
    use crate::layout::{BackendProfile, LayoutEngine};
    use crate::model::{ContentBlock, LayoutTemplate, Metadata};
    use std::io::Read;

    fn build(blocks: &[ContentBlock], images: &ImageStore, settings: &Settings) -> Vec<u8> {
        let ctx = FontContext::new();
        let layout = LayoutEngine::new(&ctx, BackendProfile::docx().geometry(LayoutTemplate::Three))
            .paginate(blocks);
        let refs: Vec<&str> = blocks.iter().map(|b| b.image_reference.as_str()).collect();
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        DocxWriter::new()
            .write(&layout, &refs, &texts, images, settings)
            .unwrap()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn png(dir: &std::path::Path, name: &str) -> String {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(8, 4, image::Rgba([200, 10, 10, 255]))
            .save(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn package_has_required_parts() {
        let bytes = build(&[], &ImageStore::new(), &Settings::default());
        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/header1.xml",
            "word/footer1.xml",
            "word/_rels/document.xml.rels",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
        let doc = read_part(&bytes, "word/document.xml");
        assert!(!doc.contains("<w:tbl>"));
        assert!(doc.contains("<w:pgSz w:w=\"12240\" w:h=\"15840\"/>"));
    }

    #[test]
    fn one_table_per_block_and_breaks_between_pages() {
        let blocks: Vec<ContentBlock> = (0..5)
            .map(|i| ContentBlock::new("none.png", format!("Section {i} & more")))
            .collect();
        let bytes = build(&blocks, &ImageStore::new(), &Settings::default());
        let doc = read_part(&bytes, "word/document.xml");
        assert_eq!(doc.matches("<w:tbl>").count(), 5);
        assert_eq!(doc.matches("<w:cantSplit/>").count(), 5);
        // Template 3: pages of 3 + 2.
        assert_eq!(doc.matches("<w:pageBreakBefore/>").count(), 1);
        assert!(doc.contains("Section 0 &amp; more"));
    }

    #[test]
    fn paragraphs_split_on_newlines() {
        let blocks = vec![ContentBlock::new("none.png", "First line.\n\nSecond line.")];
        let bytes = build(&blocks, &ImageStore::new(), &Settings::default());
        let doc = read_part(&bytes, "word/document.xml");
        assert!(doc.contains(">First line.</w:t>"));
        assert!(doc.contains(">Second line.</w:t>"));
    }

    #[test]
    fn images_and_logos_are_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let pic = png(dir.path(), "pic.png");
        let logo = png(dir.path(), "logo.png");
        let settings = Settings {
            header: HeaderFooter {
                text: "Easy Read".to_string(),
                logo: Some(logo.clone()),
            },
            metadata: Metadata {
                title: Some("Rights".to_string()),
                ..Metadata::default()
            },
            ..Settings::default()
        };
        let mut store = ImageStore::new();
        store.load_all([pic.as_str(), logo.as_str()], None).unwrap();

        let blocks = vec![
            ContentBlock::new(pic.clone(), "One"),
            ContentBlock::new(pic.clone(), "Two"),
        ];
        let bytes = build(&blocks, &store, &settings);

        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let media: Vec<&str> = archive.file_names().filter(|n| n.starts_with("word/media/")).collect();
        assert_eq!(media.len(), 2, "{media:?}");

        let doc = read_part(&bytes, "word/document.xml");
        assert_eq!(doc.matches("<w:drawing>").count(), 2);
        let rels = read_part(&bytes, "word/_rels/document.xml.rels");
        assert_eq!(rels.matches("relationships/image").count(), 1);

        let header = read_part(&bytes, "word/header1.xml");
        assert!(header.contains("r:embed=\"rIdHeaderLogo1\""));
        assert!(header.contains("Easy Read"));
        assert!(read_part(&bytes, "docProps/core.xml").contains("<dc:title>Rights</dc:title>"));
    }

    #[test]
    fn units() {
        assert_eq!(twips(72.0), "1440");
        assert_eq!(emu(1.0), "12700");
    }
}
