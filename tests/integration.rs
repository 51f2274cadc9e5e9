//! Integration tests for the Easy Read layout pipeline.
//!
//! These exercise the path from blocks to written artifacts:
//! - pagination scenarios (capacity, overflow, empty input)
//! - determinism, conservation and order of the page map
//! - the versioned edit / rebuild cycle
//! - PDF and DOCX output structure, atomic replacement, previews

use std::io::Read;
use std::path::Path;

use easyread::address::{BoxSlot, PageMap};
use easyread::layout::LayoutWarning;
use easyread::{
    Backend, ContentBlock, Document, EasyReadError, EditRequest, LayoutTemplate, Session, Settings,
};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

// ─── Helpers ────────────────────────────────────────────────────

fn write_picture(dir: &Path, name: &str, w: u32, h: u32) -> String {
    let path = dir.join(name);
    RgbaImage::from_pixel(w, h, Rgba([40, 160, 90, 255])).save(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn blocks(picture: &str, n: usize) -> Vec<ContentBlock> {
    (0..n)
        .map(|i| ContentBlock::new(picture, format!("Short sentence number {i}.")))
        .collect()
}

fn settings(dir: &Path) -> Settings {
    Settings {
        output_dir: dir.join("out"),
        ..Settings::default()
    }
}

fn doc(blocks: Vec<ContentBlock>, template: LayoutTemplate) -> Document {
    Document {
        blocks,
        template: Some(template),
    }
}

fn page_map(document: &Document, backend: Backend) -> PageMap {
    let layout = easyread::plan(document, backend);
    PageMap::from_layout(&layout, &document.blocks)
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 50, "PDF too small to be valid");
    assert!(bytes.starts_with(b"%PDF-1.7"), "Missing PDF header");
    assert!(bytes.windows(5).any(|w| w == b"%%EOF"), "Missing %%EOF marker");
    assert!(bytes.windows(4).any(|w| w == b"xref"), "Missing xref table");
    assert!(bytes.windows(7).any(|w| w == b"trailer"), "Missing trailer");
}

fn pdf_page_count(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes).matches("/Type /Page ").count()
}

fn docx_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

// ─── Pagination Scenarios ───────────────────────────────────────

#[test]
fn test_five_blocks_template_four_spill_to_second_page() {
    let map = page_map(&doc(blocks("a.png", 5), LayoutTemplate::Four), Backend::Pdf);
    assert_eq!(map.total_pages(), 2);
    let first: Vec<String> = map.page(1).unwrap().keys().map(|s| s.to_string()).collect();
    assert_eq!(first, vec!["box1", "box2", "box3", "box4"]);
    let second: Vec<String> = map.page(2).unwrap().keys().map(|s| s.to_string()).collect();
    assert_eq!(second, vec!["box1"]);
}

#[test]
fn test_oversized_block_is_forced_onto_its_own_page() {
    let long = "Everyone has the right to be treated fairly and kindly. ".repeat(400);
    for backend in [Backend::Pdf, Backend::Docx] {
        let document = doc(vec![ContentBlock::new("a.png", long.clone())], LayoutTemplate::Four);
        let layout = easyread::plan(&document, backend);
        assert_eq!(layout.total_pages(), 1, "{backend}");
        assert_eq!(layout.page_counts(), vec![1]);
        assert!(matches!(
            layout.warnings.as_slice(),
            [LayoutWarning::Overflow { page: 1, content_index: 0, .. }]
        ));
    }
}

#[test]
fn test_oversized_block_between_normal_blocks() {
    let mut input = blocks("a.png", 4);
    input.insert(1, ContentBlock::new("a.png", "word ".repeat(3000)));
    let layout = easyread::plan(&doc(input, LayoutTemplate::Four), Backend::Pdf);
    assert_eq!(layout.placement_order(), vec![0, 1, 2, 3, 4]);
    assert_eq!(layout.page_counts()[1], 1, "oversized block must sit alone");
}

#[test]
fn test_empty_input_gives_one_blank_page() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(Vec::new(), LayoutTemplate::Four, Backend::Pdf, settings(dir.path())).unwrap();
    let report = session.build().unwrap();
    assert_eq!(report.total_pages, 1);
    assert_eq!(session.page_text_boxes().unwrap().box_count(), 0);

    let bytes = std::fs::read(&report.artifact).unwrap();
    assert_valid_pdf(&bytes);
    assert_eq!(pdf_page_count(&bytes), 1);
}

#[test]
fn test_strict_empty_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(Vec::new(), LayoutTemplate::Three, Backend::Docx, settings(dir.path()))
        .unwrap()
        .strict_empty(true);
    assert!(matches!(session.build(), Err(EasyReadError::EmptyInput)));
    assert!(!session.artifact_path().exists());
}

#[test]
fn test_template_sensitivity() {
    let input = blocks("a.png", 10);
    let three = page_map(&doc(input.clone(), LayoutTemplate::Three), Backend::Pdf);
    let four = page_map(&doc(input.clone(), LayoutTemplate::Four), Backend::Pdf);

    let counts = |m: &PageMap| m.iter().map(|(_, slots)| slots.len()).collect::<Vec<_>>();
    assert_eq!(counts(&three), vec![3, 3, 3, 1]);
    assert_eq!(counts(&four), vec![4, 4, 2]);

    let texts: Vec<&str> = input.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(three.flatten(), texts);
    assert_eq!(four.flatten(), texts);
}

#[test]
fn test_document_json_round_trip_into_plan() {
    let json = r#"{
        "template": 3,
        "blocks": [
            {"imageReference": "a.png", "text": "One"},
            {"imageReference": "b.png", "text": "Two"}
        ]
    }"#;
    let layout = easyread::plan_json(json, Backend::Pdf).unwrap();
    assert_eq!(layout.geometry.template, LayoutTemplate::Three);
    assert_eq!(layout.page_counts(), vec![2]);

    let bad = easyread::plan_json(r#"{"template": 5, "blocks": []}"#, Backend::Pdf);
    assert!(matches!(bad, Err(EasyReadError::Parse { .. })));
}

// ─── Determinism, Conservation, Order ───────────────────────────

#[test]
fn test_repeated_builds_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 12, 9);
    let mut input = blocks(&picture, 7);
    input[2].text = "A longer section.\nIt has a second paragraph.\n\nAnd a third one after a blank line.".into();

    let mut session = Session::new(input, LayoutTemplate::Four, Backend::Pdf, settings(dir.path())).unwrap();
    let first = session.build().unwrap();
    let first_map = session.page_text_boxes().unwrap().clone();
    let second = session.build().unwrap();

    assert_eq!(first.page_counts, second.page_counts);
    assert_eq!(&first_map, session.page_text_boxes().unwrap());
    assert_eq!(second.version, first.version + 1);
}

fn arb_blocks() -> impl Strategy<Value = Vec<ContentBlock>> {
    prop::collection::vec(
        prop::collection::vec("[a-z]{1,12}", 0..120).prop_map(|words| words.join(" ")),
        0..25,
    )
    .prop_map(|texts| {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| ContentBlock::new(format!("img{i}.png"), text))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_page_map_conserves_and_orders_blocks(
        input in arb_blocks(),
        three in any::<bool>(),
        docx in any::<bool>(),
    ) {
        let template = if three { LayoutTemplate::Three } else { LayoutTemplate::Four };
        let backend = if docx { Backend::Docx } else { Backend::Pdf };
        let document = doc(input.clone(), template);
        let layout = easyread::plan(&document, backend);
        let map = PageMap::from_layout(&layout, &document.blocks);

        prop_assert_eq!(map.box_count(), input.len());
        prop_assert_eq!(layout.placement_order(), (0..input.len()).collect::<Vec<_>>());
        let texts: Vec<&str> = input.iter().map(|b| b.text.as_str()).collect();
        prop_assert_eq!(map.flatten(), texts);
        prop_assert!(map.total_pages() >= 1);
        for (_, slots) in map.iter() {
            prop_assert!(slots.len() <= template.boxes_per_page());
        }
        for page in layout.pages.iter().filter(|p| !p.blocks.is_empty()) {
            let slots: Vec<usize> = page.blocks.iter().map(|b| b.slot.number()).collect();
            prop_assert_eq!(slots, (1..=page.blocks.len()).collect::<Vec<_>>());
        }
    }
}

// ─── Edit / Rebuild Cycle ───────────────────────────────────────

#[test]
fn test_edit_round_trip_then_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 10, 10);
    let mut session = Session::new(blocks(&picture, 6), LayoutTemplate::Four, Backend::Pdf, settings(dir.path())).unwrap();
    let v1 = session.build().unwrap().version;

    let edit = EditRequest::parse_assignment(v1, "2:box2=X").unwrap();
    let index = session.apply_edit(&edit).unwrap();
    assert_eq!(index, 5);
    assert_eq!(session.page_text_boxes().unwrap().get(2, BoxSlot::new(2)), Some("X"));
    assert_eq!(session.blocks()[5].text, "X");

    // The old version is stale once the rebuild lands.
    let v2 = session.build().unwrap().version;
    assert_eq!(v2, v1 + 1);
    let stale = session.apply_edit(&EditRequest::new(v1, 1, BoxSlot::new(1), "late"));
    assert!(matches!(
        stale,
        Err(EasyReadError::StaleAddress { requested, current, .. }) if requested == v1 && current == v2
    ));
    assert_eq!(session.blocks()[0].text, "Short sentence number 0.");
}

#[test]
fn test_edit_to_missing_slot_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 10, 10);
    let mut session = Session::new(blocks(&picture, 5), LayoutTemplate::Four, Backend::Pdf, settings(dir.path())).unwrap();
    let v = session.build().unwrap().version;

    for (page, slot) in [(2, 2), (3, 1), (0, 1)] {
        let err = session
            .apply_edit(&EditRequest::new(v, page, BoxSlot::new(slot), "x"))
            .unwrap_err();
        assert!(matches!(err, EasyReadError::UnknownSlot { .. }), "page {page} box{slot}");
    }
    assert!(!session.needs_rebuild());
}

#[test]
fn test_edit_before_first_build() {
    let mut session = Session::new(blocks("a.png", 1), LayoutTemplate::Four, Backend::Pdf, Settings::default()).unwrap();
    let err = session.apply_edit(&EditRequest::new(1, 1, BoxSlot::new(1), "x")).unwrap_err();
    assert!(matches!(err, EasyReadError::NoLayout));
}

#[test]
fn test_template_switch_reshapes_page_map() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 10, 10);
    let mut session = Session::new(blocks(&picture, 8), LayoutTemplate::Four, Backend::Docx, settings(dir.path())).unwrap();
    session.build().unwrap();
    assert_eq!(session.total_pages(), 2);

    let report = session.rebuild(LayoutTemplate::Three).unwrap();
    assert_eq!(report.page_counts, vec![3, 3, 2]);
    assert_eq!(session.page_text_boxes().unwrap().box_count(), 8);
    assert_eq!(session.address_index().unwrap().len(), 8);
}

// ─── Artifacts ──────────────────────────────────────────────────

#[test]
fn test_pdf_artifact_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 30, 20);
    let cfg = Settings {
        header: easyread::config::HeaderFooter {
            text: "Easy Read".into(),
            logo: Some(picture.clone()),
        },
        ..settings(dir.path())
    };
    let report = easyread::build(doc(blocks(&picture, 5), LayoutTemplate::Four), Backend::Pdf, cfg).unwrap();

    assert_eq!(report.artifact, dir.path().join("out").join("easy_read.pdf"));
    let bytes = std::fs::read(&report.artifact).unwrap();
    assert_valid_pdf(&bytes);
    assert_eq!(pdf_page_count(&bytes), 2);
}

#[test]
fn test_docx_artifact_follows_planned_pages() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 30, 20);
    let report = easyread::build(doc(blocks(&picture, 7), LayoutTemplate::Three), Backend::Docx, settings(dir.path())).unwrap();

    assert_eq!(report.artifact, dir.path().join("out").join("easy_read.docx"));
    assert_eq!(report.page_counts, vec![3, 3, 1]);
    let bytes = std::fs::read(&report.artifact).unwrap();
    assert!(bytes.starts_with(b"PK"), "DOCX is a zip package");

    let document = docx_part(&bytes, "word/document.xml");
    assert_eq!(document.matches("<w:cantSplit/>").count(), 7);
    assert_eq!(document.matches("<w:pageBreakBefore/>").count(), 2);
    assert!(document.contains("Short sentence number 6."));
    assert!(docx_part(&bytes, "[Content_Types].xml").contains("image/png"));
}

#[test]
fn test_failed_build_leaves_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 10, 10);
    let mut session = Session::new(blocks(&picture, 3), LayoutTemplate::Four, Backend::Pdf, settings(dir.path())).unwrap();
    let report = session.build().unwrap();
    let before = std::fs::read(&report.artifact).unwrap();

    std::fs::write(&picture, b"not an image").unwrap();
    let err = session.build().unwrap_err();
    assert!(matches!(err, EasyReadError::Asset { .. }));
    assert_eq!(std::fs::read(&report.artifact).unwrap(), before);
    assert_eq!(session.version(), Some(report.version));
}

#[test]
fn test_previews_regenerated_per_build() {
    let dir = tempfile::tempdir().unwrap();
    let picture = write_picture(dir.path(), "p.png", 10, 10);
    let preview_dir = dir.path().join("previews");
    let cfg = Settings {
        preview_dir: Some(preview_dir.clone()),
        ..settings(dir.path())
    };
    let mut session = Session::new(blocks(&picture, 9), LayoutTemplate::Four, Backend::Pdf, cfg).unwrap();
    let report = session.build().unwrap();
    assert_eq!(report.previews.len(), 3);
    let thumb = image::open(preview_dir.join("page_3.png")).unwrap();
    assert_eq!(thumb.width(), 200);

    session.rebuild(LayoutTemplate::Three).unwrap();
    assert!(preview_dir.join("page_3.png").exists());
    session.rebuild(LayoutTemplate::Four).unwrap();
    assert!(!preview_dir.join("page_4.png").exists());
}

#[test]
fn test_relative_references_resolve_against_asset_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_picture(dir.path(), "rel.png", 10, 10);
    let cfg = Settings {
        asset_dir: Some(dir.path().to_path_buf()),
        ..settings(dir.path())
    };
    let report = easyread::build(doc(blocks("rel.png", 2), LayoutTemplate::Four), Backend::Pdf, cfg).unwrap();
    assert!(report.artifact.exists());
}
