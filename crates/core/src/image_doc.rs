//! Built-in raster image document handler
//!
//! Opens a PNG or JPEG as a single-page document whose page draws the
//! image at its natural size. The native resolution is probed from the
//! container metadata (PNG pHYs, JPEG JFIF density); a failed probe leaves
//! the resolution unknown and never fails the open.

use crate::document::Document;
use crate::handler::DocumentHandler;
use pagemill_cache::{ResourceStore, StoreItem, StoreKey};
use pagemill_doc_model::{Error, Rect, Result};
use pagemill_render::{Device, Image};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::Arc;

/// Page size is computed from pixel dimensions at this density when the
/// container declares none.
const DEFAULT_DPI: f32 = 96.0;

pub(crate) struct RasterImageHandler;

impl DocumentHandler for RasterImageHandler {
    fn name(&self) -> &'static str {
        "raster-image"
    }

    fn recognizes(&self, declared_type: &str) -> bool {
        matches!(declared_type, "png" | "jpg" | "jpeg")
    }

    fn open(&self, data: Arc<[u8]>, store: &Arc<ResourceStore>) -> Result<Box<dyn Document>> {
        let decoded = image::load_from_memory(&data)
            .map_err(|e| Error::CannotOpenStream(e.to_string()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();

        let resolution = probe_png_dpi(&data).or_else(|| probe_jfif_dpi(&data));
        let image = Arc::new(Image {
            width,
            height,
            rgba: decoded.into_raw(),
            xres: resolution.map(|(x, _)| x),
            yres: resolution.map(|(_, y)| y),
        });

        let mut hasher = DefaultHasher::new();
        hasher.write(&data);
        let key: StoreKey = hasher.finish();
        store.insert(key, Arc::clone(&image) as Arc<dyn StoreItem>);

        Ok(Box::new(ImageDocument { image, resolution }))
    }
}

struct ImageDocument {
    image: Arc<Image>,
    resolution: Option<(f32, f32)>,
}

impl ImageDocument {
    fn bounds(&self) -> Rect {
        let (xres, yres) = self.resolution.unwrap_or((DEFAULT_DPI, DEFAULT_DPI));
        Rect::new(
            0.0,
            0.0,
            self.image.width as f32 * 72.0 / xres,
            self.image.height as f32 * 72.0 / yres,
        )
    }
}

impl Document for ImageDocument {
    fn page_count(&self) -> Result<usize> {
        Ok(1)
    }

    fn page_bounds(&self, index: usize) -> Result<Rect> {
        if index != 0 {
            return Err(Error::CannotLoadPage(index));
        }
        Ok(self.bounds())
    }

    fn run_page(
        &self,
        index: usize,
        device: &mut dyn Device,
        _include_annotations: bool,
    ) -> Result<()> {
        if index != 0 {
            return Err(Error::CannotLoadPage(index));
        }
        device.draw_image(&self.image, &self.bounds(), &pagemill_doc_model::Matrix::IDENTITY)
    }

    fn image_resolution(&self) -> Option<(f32, f32)> {
        self.resolution
    }
}

/// Read the pHYs chunk of a PNG, if present with a metric unit
fn probe_png_dpi(data: &[u8]) -> Option<(f32, f32)> {
    const SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let rest = data.strip_prefix(SIGNATURE)?;

    let mut offset = 0;
    while rest.len() >= offset + 8 {
        let length = u32::from_be_bytes(rest[offset..offset + 4].try_into().ok()?) as usize;
        let kind = &rest[offset + 4..offset + 8];
        let body = rest.get(offset + 8..offset + 8 + length)?;

        if kind == b"pHYs" && length == 9 {
            let ppu_x = u32::from_be_bytes(body[0..4].try_into().ok()?);
            let ppu_y = u32::from_be_bytes(body[4..8].try_into().ok()?);
            // unit 1 = pixels per meter; 0 means aspect ratio only
            if body[8] != 1 {
                return None;
            }
            return Some((ppu_x as f32 * 0.0254, ppu_y as f32 * 0.0254));
        }
        if kind == b"IDAT" || kind == b"IEND" {
            return None;
        }
        offset += 8 + length + 4; // header + body + crc
    }
    None
}

/// Read the JFIF APP0 density fields of a JPEG, if declared in real units
fn probe_jfif_dpi(data: &[u8]) -> Option<(f32, f32)> {
    let rest = data.strip_prefix(&[0xFF, 0xD8])?;
    // APP0 must follow SOI directly in a JFIF file
    if rest.len() < 16 || rest[0] != 0xFF || rest[1] != 0xE0 || &rest[4..9] != b"JFIF\0" {
        return None;
    }
    let units = rest[11];
    let xdensity = u16::from_be_bytes([rest[12], rest[13]]) as f32;
    let ydensity = u16::from_be_bytes([rest[14], rest[15]]) as f32;
    if xdensity == 0.0 || ydensity == 0.0 {
        return None;
    }
    match units {
        1 => Some((xdensity, ydensity)),
        2 => Some((xdensity * 2.54, ydensity * 2.54)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![0x7Fu8; (width * height * 4) as usize];
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    /// Insert a pHYs chunk right after IHDR
    fn with_phys(png: &[u8], ppu: u32) -> Vec<u8> {
        let ihdr_end = 8 + 8 + 13 + 4;
        let mut body = Vec::new();
        body.extend_from_slice(&ppu.to_be_bytes());
        body.extend_from_slice(&ppu.to_be_bytes());
        body.push(1);

        let mut out = png[..ihdr_end].to_vec();
        out.extend_from_slice(&9u32.to_be_bytes());
        out.extend_from_slice(b"pHYs");
        out.extend_from_slice(&body);
        out.extend_from_slice(&[0u8; 4]); // probe does not check the crc
        out.extend_from_slice(&png[ihdr_end..]);
        out
    }

    fn open(bytes: Vec<u8>, declared: &str) -> Box<dyn Document> {
        let store = Arc::new(ResourceStore::new(1 << 20));
        RasterImageHandler
            .open(Arc::from(bytes.into_boxed_slice()), &store)
            .unwrap_or_else(|e| panic!("open {declared}: {e}"))
    }

    #[test]
    fn test_png_opens_as_single_page() {
        let doc = open(png_bytes(96, 48), "png");
        assert_eq!(doc.page_count().unwrap(), 1);
        // 96x48 px at the default 96 dpi is 72x36 points
        assert_eq!(doc.page_bounds(0).unwrap(), Rect::new(0.0, 0.0, 72.0, 36.0));
        assert!(doc.page_bounds(1).is_err());
    }

    #[test]
    fn test_probe_failure_is_none_not_error() {
        let doc = open(png_bytes(4, 4), "png");
        assert_eq!(doc.image_resolution(), None);
    }

    #[test]
    fn test_phys_chunk_yields_dpi() {
        // 11811 pixels per meter is 300 dpi
        let doc = open(with_phys(&png_bytes(4, 4), 11811), "png");
        let (x, y) = doc.image_resolution().unwrap();
        assert!((x - 300.0).abs() < 0.5, "x = {x}");
        assert!((y - 300.0).abs() < 0.5, "y = {y}");
    }

    #[test]
    fn test_garbage_bytes_cannot_open() {
        let store = Arc::new(ResourceStore::new(1 << 20));
        let err = RasterImageHandler
            .open(Arc::from(vec![0u8; 16].into_boxed_slice()), &store)
            .err()
            .unwrap();
        assert!(matches!(err, Error::CannotOpenStream(_)));
    }

    #[test]
    fn test_jfif_density_probe() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        jpeg.extend_from_slice(b"JFIF\0");
        jpeg.extend_from_slice(&[1, 2]); // version
        jpeg.push(1); // units: dpi
        jpeg.extend_from_slice(&150u16.to_be_bytes());
        jpeg.extend_from_slice(&151u16.to_be_bytes());
        assert_eq!(probe_jfif_dpi(&jpeg), Some((150.0, 151.0)));
    }

    #[test]
    fn test_decoded_image_lands_in_store() {
        let store = Arc::new(ResourceStore::new(1 << 20));
        let doc = RasterImageHandler
            .open(Arc::from(png_bytes(8, 8).into_boxed_slice()), &store)
            .unwrap();
        assert_eq!(store.size(), 8 * 8 * 4);
        drop(doc);
    }
}
