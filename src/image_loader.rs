//! # Image Loading and Decoding
//!
//! Loads block illustrations and header/footer logos from file paths, data
//! URIs, or raw base64 strings. JPEG images pass through to the PDF without
//! re-encoding (DCTDecode). PNG and WebP images are decoded to RGB pixels
//! with a separate alpha channel for SMask transparency.
//!
//! The original encoded bytes are kept as well: the DOCX backend embeds them
//! as media parts and the preview renderer decodes them again at thumbnail
//! size. Any failure here is fatal for the build.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::{EasyReadError, Result};
use crate::layout::Rect;

/// A fully loaded image ready for embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
    pub format: SourceFormat,
    /// The encoded bytes as read from the source.
    pub source: Vec<u8>,
}

/// The pixel data in a format the PDF serializer can consume directly.
#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes. Embedded directly with DCTDecode.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded RGB pixels + optional alpha channel.
    Decoded {
        /// width * height * 3 bytes (RGB)
        rgb: Vec<u8>,
        /// width * height bytes (grayscale alpha). None if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

/// JPEG color space for the PDF /ColorSpace entry.
#[derive(Debug, Clone, Copy)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Webp,
}

impl LoadedImage {
    /// Bytes and file extension suitable for a DOCX media part.
    ///
    /// Word has no WebP support, so WebP is re-encoded as PNG.
    pub fn embeddable(&self) -> Result<(Vec<u8>, &'static str)> {
        match self.format {
            SourceFormat::Jpeg => Ok((self.source.clone(), "jpeg")),
            SourceFormat::Png => Ok((self.source.clone(), "png")),
            SourceFormat::Webp => {
                let rgba = self.to_rgba()?;
                let mut buf = Vec::new();
                let encoder = image::codecs::png::PngEncoder::new(&mut buf);
                image::ImageEncoder::write_image(
                    encoder,
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ColorType::Rgba8,
                )?;
                Ok((buf, "png"))
            }
        }
    }

    /// Decode to RGBA pixels.
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory(&self.source)?.to_rgba8())
    }
}

/// Scale `width_px` x `height_px` to fit inside `cell`, preserving aspect ratio.
pub fn fit_contain(width_px: u32, height_px: u32, cell: &Rect) -> Rect {
    if width_px == 0 || height_px == 0 {
        return *cell;
    }
    let scale = (cell.width / width_px as f64).min(cell.height / height_px as f64);
    let width = width_px as f64 * scale;
    let height = height_px as f64 * scale;
    Rect {
        x: cell.x + (cell.width - width) / 2.0,
        y: cell.y + (cell.height - height) / 2.0,
        width,
        height,
    }
}

/// Load an image from a source string.
///
/// Supported `src` formats:
/// - `data:image/...;base64,...` data URI
/// - File path. Relative paths are resolved against `base_dir` if given.
/// - Raw base64-encoded image data
pub fn load_image(src: &str, base_dir: Option<&Path>) -> Result<LoadedImage> {
    let raw_bytes = read_source_bytes(src, base_dir)?;
    decode_image_bytes(&raw_bytes).map_err(|reason| EasyReadError::Asset {
        path: display_name(src),
        reason,
    })
}

/// Loaded images keyed by their source string, each loaded once.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: HashMap<String, LoadedImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every reference that is not already present.
    pub fn load_all<'s>(
        &mut self,
        sources: impl IntoIterator<Item = &'s str>,
        base_dir: Option<&Path>,
    ) -> Result<()> {
        for src in sources {
            if !self.images.contains_key(src) {
                let image = load_image(src, base_dir)?;
                log::debug!(
                    "loaded image {} ({}x{})",
                    display_name(src),
                    image.width_px,
                    image.height_px
                );
                self.images.insert(src.to_string(), image);
            }
        }
        Ok(())
    }

    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Shorten data URIs and base64 blobs for error messages.
fn display_name(src: &str) -> String {
    if src.starts_with("data:") || src.len() > 120 {
        let head: String = src.chars().take(32).collect();
        format!("{}...", head)
    } else {
        src.to_string()
    }
}

/// Resolve the source string to raw image bytes.
fn read_source_bytes(src: &str, base_dir: Option<&Path>) -> Result<Vec<u8>> {
    let asset_err = |reason: String| EasyReadError::Asset {
        path: display_name(src),
        reason,
    };

    if src.trim().is_empty() {
        return Err(asset_err("empty image reference".to_string()));
    }

    // Data URI: data:image/png;base64,iVBOR...
    if src.starts_with("data:image/") {
        let comma_pos = src
            .find(',')
            .ok_or_else(|| asset_err("invalid data URI: missing comma".to_string()))?;
        return base64_decode(&src[comma_pos + 1..]).map_err(asset_err);
    }

    let path = resolve_path(src, base_dir);
    if path.is_file() {
        return std::fs::read(&path)
            .map_err(|e| asset_err(format!("failed to read {}: {}", path.display(), e)));
    }

    // Explicit path prefixes never fall back to base64.
    if looks_like_path(src) {
        return Err(asset_err(format!("file not found: {}", path.display())));
    }

    base64_decode(src).map_err(|_| asset_err("not a readable file or base64 image data".to_string()))
}

fn resolve_path(src: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(src);
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn looks_like_path(src: &str) -> bool {
    src.starts_with('/')
        || src.starts_with("./")
        || src.starts_with("../")
        || [".png", ".jpg", ".jpeg", ".webp"]
            .iter()
            .any(|ext| src.to_ascii_lowercase().ends_with(ext))
}

fn base64_decode(input: &str) -> std::result::Result<Vec<u8>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| format!("base64 decode error: {}", e))
}

/// Detect image format from magic bytes and decode accordingly.
fn decode_image_bytes(data: &[u8]) -> std::result::Result<LoadedImage, String> {
    if data.len() < 4 {
        return Err("image data too short".to_string());
    }

    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) {
        decode_to_rgb(data, SourceFormat::Png)
    } else if is_webp(data) {
        decode_to_rgb(data, SourceFormat::Webp)
    } else {
        Err("unsupported image format (expected JPEG, PNG or WebP)".to_string())
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// JPEG: read dimensions and color space without decoding pixels.
fn decode_jpeg(data: &[u8]) -> std::result::Result<LoadedImage, String> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("JPEG format detection error: {}", e))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| format!("failed to read JPEG dimensions: {}", e))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: detect_jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
        format: SourceFormat::Jpeg,
        source: data.to_vec(),
    })
}

/// Scan JPEG markers for the SOF segment and read its component count.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2; // skip SOI
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return if data[i + 9] == 1 {
                JpegColorSpace::DeviceGray
            } else {
                JpegColorSpace::DeviceRGB
            };
        }
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}

/// PNG / WebP: decode to RGBA, split into RGB + alpha.
fn decode_to_rgb(data: &[u8], format: SourceFormat) -> std::result::Result<LoadedImage, String> {
    let img = image::load_from_memory(data).map_err(|e| format!("failed to decode image: {}", e))?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
        has_transparency |= pixel[3] != 255;
    }

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: has_transparency.then_some(alpha),
        },
        width_px: width,
        height_px: height,
        format,
        source: data.to_vec(),
    })
}
