//! Pixel buffers produced by rasterization
//!
//! A pixmap owns its samples and remembers where it sits in device space.
//! Alpha targets clear to fully transparent, opaque targets clear to white,
//! so partially rendered output is blank rather than garbage.

use pagemill_cache::StoreItem;
use pagemill_doc_model::{ColorFormat, IRect};

/// An owned pixel buffer positioned in device space
#[derive(Debug, Clone)]
pub struct Pixmap {
    /// Device-space origin of the top-left pixel
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    /// `width * height * bytes_per_pixel` samples, row-major
    pub samples: Vec<u8>,
}

impl Pixmap {
    /// Allocate a cleared pixmap covering `bbox`
    pub fn new(bbox: IRect, format: ColorFormat) -> Self {
        let width = bbox.width() as u32;
        let height = bbox.height() as u32;
        let mut pix = Self {
            x: bbox.x0,
            y: bbox.y0,
            width,
            height,
            format,
            samples: vec![0; width as usize * height as usize * format.bytes_per_pixel()],
        };
        pix.clear();
        pix
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Reset to the blank state: transparent if the format carries alpha,
    /// white otherwise
    pub fn clear(&mut self) {
        let value = if self.format.has_alpha() { 0x00 } else { 0xFF };
        self.samples.fill(value);
    }

    /// Read one pixel as RGBA, regardless of the stored layout
    ///
    /// Opaque formats report alpha 255. Coordinates are local to the
    /// pixmap, not device space.
    pub fn rgba_at(&self, px: u32, py: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let i = py as usize * self.stride() + px as usize * bpp;
        let p = &self.samples[i..i + bpp];
        let (r, g, b) = if self.format.is_bgr() { (p[2], p[1], p[0]) } else { (p[0], p[1], p[2]) };
        let a = if self.format.has_alpha() { p[3] } else { 0xFF };
        [r, g, b, a]
    }

    /// Samples repacked as tightly packed RGB, alpha dropped
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b, _] = self.rgba_at(x, y);
                out.extend_from_slice(&[r, g, b]);
            }
        }
        out
    }

    /// Samples repacked as tightly packed RGBA
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                out.extend_from_slice(&self.rgba_at(x, y));
            }
        }
        out
    }
}

impl StoreItem for Pixmap {
    fn size_bytes(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(w: i32, h: i32) -> IRect {
        IRect { x0: 0, y0: 0, x1: w, y1: h }
    }

    #[test]
    fn test_alpha_pixmap_clears_transparent() {
        let pix = Pixmap::new(bbox(2, 2), ColorFormat::Rgba);
        assert!(pix.samples.iter().all(|&s| s == 0x00));
        assert_eq!(pix.samples.len(), 2 * 2 * 4);
    }

    #[test]
    fn test_opaque_pixmap_clears_white() {
        let pix = Pixmap::new(bbox(3, 1), ColorFormat::Bgr);
        assert!(pix.samples.iter().all(|&s| s == 0xFF));
        assert_eq!(pix.samples.len(), 3 * 3);
    }

    #[test]
    fn test_rgba_at_swizzles_bgr() {
        let mut pix = Pixmap::new(bbox(1, 1), ColorFormat::Bgra);
        pix.samples.copy_from_slice(&[10, 20, 30, 40]);
        assert_eq!(pix.rgba_at(0, 0), [30, 20, 10, 40]);
    }

    #[test]
    fn test_to_rgb_drops_alpha() {
        let mut pix = Pixmap::new(bbox(1, 1), ColorFormat::Rgba);
        pix.samples.copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(pix.to_rgb(), vec![1, 2, 3]);
    }

    #[test]
    fn test_offset_preserved_from_bbox() {
        let pix = Pixmap::new(IRect { x0: -5, y0: 7, x1: 10, y1: 17 }, ColorFormat::Rgb);
        assert_eq!((pix.x, pix.y), (-5, 7));
        assert_eq!((pix.width, pix.height), (15, 10));
    }
}
