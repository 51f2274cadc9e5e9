//! Page thumbnails.
//!
//! Draws a small PNG per page from the same [`Layout`] the backends render,
//! for the page-by-page edit view. Text is shown as grey bars of the
//! measured line widths rather than glyphs. The whole set is regenerated on
//! every build: stale `page_*.png` files are removed first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::config::Settings;
use crate::error::{EasyReadError, Result};
use crate::image_loader::{fit_contain, ImageStore};
use crate::layout::{Layout, LayoutPage, PageGeometry, Rect};
use crate::output::StagedFile;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RULE: Rgba<u8> = Rgba([153, 153, 153, 255]);
const TEXT_BAR: Rgba<u8> = Rgba([110, 110, 110, 255]);
const PLACEHOLDER: Rgba<u8> = Rgba([229, 229, 229, 255]);

pub struct PreviewRenderer {
    width_px: u32,
}

impl PreviewRenderer {
    pub fn new(width_px: u32) -> Self {
        Self {
            width_px: width_px.max(16),
        }
    }

    /// Render every page to PNG bytes, in page order.
    pub fn render(
        &self,
        layout: &Layout,
        block_images: &[&str],
        images: &ImageStore,
        settings: &Settings,
    ) -> Result<Vec<Vec<u8>>> {
        let g = &layout.geometry;
        let scale = self.width_px as f64 / g.page_width;
        let height_px = (g.page_height * scale).round().max(1.0) as u32;

        let mut decoded: HashMap<&str, RgbaImage> = HashMap::new();
        let mut pngs = Vec::with_capacity(layout.pages.len());

        for page in &layout.pages {
            let mut canvas = RgbaImage::from_pixel(self.width_px, height_px, WHITE);
            self.draw_bands(&mut canvas, g, scale, images, settings, &mut decoded)?;
            self.draw_blocks(&mut canvas, page, g, scale, block_images, images, &mut decoded)?;
            pngs.push(encode_png(&canvas)?);
        }
        Ok(pngs)
    }

    fn draw_bands<'s>(
        &self,
        canvas: &mut RgbaImage,
        g: &PageGeometry,
        scale: f64,
        images: &ImageStore,
        settings: &'s Settings,
        decoded: &mut HashMap<&'s str, RgbaImage>,
    ) -> Result<()> {
        let header_rule = g.margin.top + g.header_height + (g.header_reserve - g.header_height) / 2.0;
        let footer_rule = g.footer_top() - (g.footer_reserve - g.footer_height) / 2.0;
        for y in [header_rule, footer_rule] {
            let rule = Rect {
                x: g.margin.left,
                y,
                width: g.page_width - g.margin.horizontal(),
                height: 0.5,
            };
            fill_rect(canvas, &rule, scale, RULE);
        }

        if let Some(logo) = settings.header.logo.as_deref() {
            let cell = Rect {
                x: g.margin.left,
                y: g.margin.top,
                width: 50.0,
                height: g.header_height,
            };
            self.draw_image(canvas, logo, &cell, scale, images, decoded)?;
        }
        if let Some(logo) = settings.footer.logo.as_deref() {
            let cell = Rect {
                x: g.page_width - g.margin.right - 50.0,
                y: g.footer_top(),
                width: 50.0,
                height: g.footer_height,
            };
            self.draw_image(canvas, logo, &cell, scale, images, decoded)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_blocks<'s>(
        &self,
        canvas: &mut RgbaImage,
        page: &LayoutPage,
        g: &PageGeometry,
        scale: f64,
        block_images: &[&'s str],
        images: &ImageStore,
        decoded: &mut HashMap<&'s str, RgbaImage>,
    ) -> Result<()> {
        for placed in &page.blocks {
            let src = block_images.get(placed.content_index).copied().unwrap_or_default();
            self.draw_image(canvas, src, &placed.image_cell, scale, images, decoded)?;

            let bar_height = g.font_size * 0.6;
            for (i, line) in placed.lines.iter().enumerate() {
                let center = placed.text_box.y + (i as f64 + 0.5) * g.line_height;
                let bar = Rect {
                    x: placed.text_box.x,
                    y: center - bar_height / 2.0,
                    width: line.width,
                    height: bar_height,
                };
                fill_rect(canvas, &bar, scale, TEXT_BAR);
            }
        }
        Ok(())
    }

    fn draw_image<'s>(
        &self,
        canvas: &mut RgbaImage,
        src: &'s str,
        cell: &Rect,
        scale: f64,
        images: &ImageStore,
        decoded: &mut HashMap<&'s str, RgbaImage>,
    ) -> Result<()> {
        let Some(loaded) = images.get(src) else {
            fill_rect(canvas, cell, scale, PLACEHOLDER);
            return Ok(());
        };
        if !decoded.contains_key(src) {
            decoded.insert(src, loaded.to_rgba()?);
        }
        let Some(pixels) = decoded.get(src) else {
            return Ok(());
        };

        let fitted = fit_contain(pixels.width(), pixels.height(), cell);
        let w = (fitted.width * scale).round().max(1.0) as u32;
        let h = (fitted.height * scale).round().max(1.0) as u32;
        let thumb = imageops::resize(pixels, w, h, FilterType::Triangle);
        imageops::overlay(
            canvas,
            &thumb,
            (fitted.x * scale).round() as i64,
            (fitted.y * scale).round() as i64,
        );
        Ok(())
    }
}

/// Fill a page-space rectangle, clipped to the canvas. Always at least one pixel tall.
fn fill_rect(canvas: &mut RgbaImage, rect: &Rect, scale: f64, color: Rgba<u8>) {
    let x0 = (rect.x * scale).floor().max(0.0) as u32;
    let y0 = (rect.y * scale).floor().max(0.0) as u32;
    let x1 = ((rect.x + rect.width) * scale).ceil().max(0.0) as u32;
    let y1 = ((rect.y + rect.height) * scale).ceil().max(0.0) as u32;
    let x1 = x1.min(canvas.width());
    let y1 = y1.max(y0 + 1).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        canvas.as_raw(),
        canvas.width(),
        canvas.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Delete every `page_*.png` in `dir`. A missing directory is not an error.
pub fn clear_previews(dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EasyReadError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| EasyReadError::io(dir, e))?.path();
        let is_preview = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("page_") && n.ends_with(".png"));
        if is_preview {
            std::fs::remove_file(&path).map_err(|e| EasyReadError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write `pngs` to temporary files in `dir` without touching existing pages.
pub fn stage_previews(dir: &Path, pngs: &[Vec<u8>]) -> Result<Vec<StagedFile>> {
    pngs.iter()
        .enumerate()
        .map(|(i, png)| StagedFile::stage(&dir.join(format!("page_{}.png", i + 1)), png))
        .collect()
}

/// Remove the old pages in `dir` and move the staged ones into place.
pub fn commit_previews(dir: &Path, staged: Vec<StagedFile>) -> Result<Vec<PathBuf>> {
    let removed = clear_previews(dir)?;
    let written = staged
        .into_iter()
        .map(StagedFile::commit)
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "previews: removed {}, wrote {} in {}",
        removed,
        written.len(),
        dir.display()
    );
    Ok(written)
}

/// Replace the previews in `dir` with `pngs` as `page_1.png`, `page_2.png`, ...
pub fn write_previews(dir: &Path, pngs: &[Vec<u8>]) -> Result<Vec<PathBuf>> {
    let staged = stage_previews(dir, pngs)?;
    commit_previews(dir, staged)
}
