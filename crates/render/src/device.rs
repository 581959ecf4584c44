//! Device model for page content
//!
//! A device receives a page's drawing operations. Recording devices build
//! display lists, the draw device rasterizes into a pixmap, the bbox device
//! measures, and the structured-text device collects character geometry.
//! Document handlers only ever talk to the `Device` trait, so every
//! consumer of page content goes through the same seam.

use pagemill_cache::StoreItem;
use pagemill_doc_model::{Color, Matrix, Point, Quad, Rect, Result};
use std::sync::Arc;

/// A decoded raster image
///
/// Samples are always RGBA, 8 bits per channel. Decoded images are cached
/// in the resource store, so they are shared by reference.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// RGBA samples, `width * height * 4` bytes
    pub rgba: Vec<u8>,
    /// Native resolution in dots per inch, if the source declared one
    pub xres: Option<f32>,
    pub yres: Option<f32>,
}

impl Image {
    /// Sample a pixel, clamping out-of-range coordinates to the edge
    pub fn sample(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

impl StoreItem for Image {
    fn size_bytes(&self) -> usize {
        self.rgba.len()
    }
}

/// Writing direction of a text line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Horizontal,
    Vertical,
}

/// One positioned character within a text span
#[derive(Debug, Clone, Copy)]
pub struct CharGeom {
    pub codepoint: char,
    pub color: Color,
    /// Baseline origin
    pub origin: Point,
    /// Font size in points
    pub size: f32,
    /// Visual extent; not axis-aligned for rotated or skewed text
    pub quad: Quad,
}

impl CharGeom {
    pub fn transform(&self, m: &Matrix) -> CharGeom {
        let expansion = (m.a * m.d - m.b * m.c).abs().sqrt();
        CharGeom {
            origin: m.transform_point(self.origin),
            quad: self.quad.transform(m),
            size: self.size * expansion,
            ..*self
        }
    }
}

/// A run of characters sharing one writing mode and direction
///
/// Corresponds to one line of extracted text.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub wmode: WriteMode,
    /// Unit direction of the baseline
    pub dir: Point,
    pub chars: Vec<CharGeom>,
}

impl TextSpan {
    /// Bounding rect of all character quads
    pub fn bounds(&self) -> Rect {
        let mut out = Rect::EMPTY;
        for ch in &self.chars {
            out = out.union(&ch.quad.bounds());
        }
        out
    }

    pub fn transform(&self, m: &Matrix) -> TextSpan {
        TextSpan {
            wmode: self.wmode,
            dir: self.dir,
            chars: self.chars.iter().map(|c| c.transform(m)).collect(),
        }
    }
}

/// Receiver for page drawing operations
///
/// `ctm` transforms the operation's page-space coordinates into the
/// device's target space. Implementations must tolerate operations outside
/// their clip; they are free to ignore them.
pub trait Device {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()>;

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()>;

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()>;

    /// Flush any pending state. Called exactly once, after the last
    /// operation, on the success path.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Bounds-only device: unions the extent of everything drawn through it
#[derive(Debug, Default)]
pub struct BboxDevice {
    bounds: Rect,
}

impl BboxDevice {
    pub fn new() -> Self {
        Self { bounds: Rect::EMPTY }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

impl Device for BboxDevice {
    fn fill_rect(&mut self, rect: &Rect, _color: Color, ctm: &Matrix) -> Result<()> {
        self.bounds = self.bounds.union(&rect.transform(ctm));
        Ok(())
    }

    fn draw_image(&mut self, _image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        self.bounds = self.bounds.union(&rect.transform(ctm));
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        self.bounds = self.bounds.union(&span.bounds().transform(ctm));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_at(x: f32, y: f32, w: f32, h: f32) -> CharGeom {
        CharGeom {
            codepoint: 'a',
            color: Color::BLACK,
            origin: Point::new(x, y + h),
            size: h,
            quad: Quad::from_rect(&Rect::from_origin_size(x, y, w, h)),
        }
    }

    #[test]
    fn test_bbox_device_unions_rects() {
        let mut dev = BboxDevice::new();
        dev.fill_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK, &Matrix::IDENTITY)
            .unwrap();
        dev.fill_rect(&Rect::new(20.0, 20.0, 30.0, 40.0), Color::BLACK, &Matrix::IDENTITY)
            .unwrap();
        assert_eq!(dev.bounds(), Rect::new(0.0, 0.0, 30.0, 40.0));
    }

    #[test]
    fn test_bbox_device_applies_transform() {
        let mut dev = BboxDevice::new();
        dev.fill_rect(
            &Rect::new(0.0, 0.0, 10.0, 10.0),
            Color::BLACK,
            &Matrix::scale(3.0, 3.0),
        )
        .unwrap();
        assert_eq!(dev.bounds(), Rect::new(0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_text_span_bounds_cover_all_chars() {
        let span = TextSpan {
            wmode: WriteMode::Horizontal,
            dir: Point::new(1.0, 0.0),
            chars: vec![char_at(0.0, 0.0, 6.0, 10.0), char_at(6.0, 0.0, 6.0, 10.0)],
        };
        assert_eq!(span.bounds(), Rect::new(0.0, 0.0, 12.0, 10.0));
    }

    #[test]
    fn test_image_sample_clamps_at_edges() {
        let img = Image {
            width: 2,
            height: 1,
            rgba: vec![1, 2, 3, 255, 4, 5, 6, 255],
            xres: None,
            yres: None,
        };
        assert_eq!(img.sample(0, 0), [1, 2, 3, 255]);
        assert_eq!(img.sample(9, 9), [4, 5, 6, 255]);
    }
}
