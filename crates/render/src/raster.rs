//! Software rasterization of display lists
//!
//! `render` allocates a pixmap sized for the requested region and zoom,
//! `render_into` rasterizes into a caller-owned buffer. Both are driven by
//! the same draw device: rect fills, nearest-neighbor image blits and
//! glyph-box text fills, composited src-over.

use crate::device::{Device, Image, TextSpan};
use crate::display_list::DisplayList;
use crate::pixmap::Pixmap;
use pagemill_doc_model::{Color, ColorFormat, Cookie, Error, IRect, Matrix, Rect, Result};
use std::sync::Arc;

/// A borrowed pixel buffer positioned in device space
struct RasterTarget<'a> {
    samples: &'a mut [u8],
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    format: ColorFormat,
}

impl<'a> RasterTarget<'a> {
    /// Composite one source-over pixel at absolute device coordinates
    ///
    /// Out-of-target coordinates are ignored.
    fn blend(&mut self, dx: i32, dy: i32, src: [u8; 4]) {
        let px = dx - self.x;
        let py = dy - self.y;
        if px < 0 || py < 0 || px >= self.width as i32 || py >= self.height as i32 {
            return;
        }
        let a = src[3] as u32;
        if a == 0 {
            return;
        }

        let bpp = self.format.bytes_per_pixel();
        let i = py as usize * self.width as usize * bpp + px as usize * bpp;
        let dst = &mut self.samples[i..i + bpp];
        let (ri, gi, bi) = if self.format.is_bgr() { (2, 1, 0) } else { (0, 1, 2) };

        if a == 255 {
            dst[ri] = src[0];
            dst[gi] = src[1];
            dst[bi] = src[2];
            if self.format.has_alpha() {
                dst[3] = 255;
            }
            return;
        }

        let inv = 255 - a;
        dst[ri] = ((src[0] as u32 * a + dst[ri] as u32 * inv) / 255) as u8;
        dst[gi] = ((src[1] as u32 * a + dst[gi] as u32 * inv) / 255) as u8;
        dst[bi] = ((src[2] as u32 * a + dst[bi] as u32 * inv) / 255) as u8;
        if self.format.has_alpha() {
            dst[3] = (a + dst[3] as u32 * inv / 255) as u8;
        }
    }

    fn fill_box(&mut self, bbox: IRect, src: [u8; 4]) {
        for dy in bbox.y0..bbox.y1 {
            for dx in bbox.x0..bbox.x1 {
                self.blend(dx, dy, src);
            }
        }
    }
}

/// Device that rasterizes into a target buffer
pub struct DrawDevice<'a> {
    target: RasterTarget<'a>,
}

impl<'a> DrawDevice<'a> {
    pub fn new(pixmap: &'a mut Pixmap) -> Self {
        Self {
            target: RasterTarget {
                x: pixmap.x,
                y: pixmap.y,
                width: pixmap.width,
                height: pixmap.height,
                format: pixmap.format,
                samples: &mut pixmap.samples,
            },
        }
    }

    fn over(samples: &'a mut [u8], bbox: IRect, format: ColorFormat) -> Self {
        Self {
            target: RasterTarget {
                samples,
                x: bbox.x0,
                y: bbox.y0,
                width: bbox.width() as u32,
                height: bbox.height() as u32,
                format,
            },
        }
    }
}

impl Device for DrawDevice<'_> {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()> {
        let bbox = rect.transform(ctm).round();
        self.target.fill_box(bbox, [color.r, color.g, color.b, 255]);
        Ok(())
    }

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        if image.width == 0 || image.height == 0 {
            return Err(Error::CannotRender("zero-sized image".into()));
        }
        let bbox = rect.transform(ctm).round();
        let (w, h) = (bbox.width(), bbox.height());
        if w <= 0 || h <= 0 {
            return Ok(());
        }
        // Nearest-neighbor: map each destination pixel center back to source
        for dy in 0..h {
            let sy = (dy as i64 * image.height as i64 / h as i64) as u32;
            for dx in 0..w {
                let sx = (dx as i64 * image.width as i64 / w as i64) as u32;
                self.target.blend(bbox.x0 + dx, bbox.y0 + dy, image.sample(sx, sy));
            }
        }
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        // Glyph-box fill: each character covers its quad in its own color
        for ch in &span.chars {
            let bbox = ch.quad.transform(ctm).bounds().round();
            self.target.fill_box(bbox, [ch.color.r, ch.color.g, ch.color.b, 255]);
        }
        Ok(())
    }
}

/// Rasterize a region of a display list into a new pixmap
///
/// The region is given in list space and scaled by `zoom`; the pixmap's
/// integer box is the rounded transformed region, so its offset records
/// where the output sits in device space. A cookie that is already aborted
/// returns the cleared pixmap without replaying anything. On error no
/// pixmap is returned.
pub fn render(
    list: &DisplayList,
    region: &Rect,
    zoom: f32,
    format: ColorFormat,
    cookie: Option<&Cookie>,
) -> Result<Pixmap> {
    let ctm = Matrix::scale(zoom, zoom);
    let clip = region.transform(&ctm);
    let mut pix = Pixmap::new(clip.round(), format);

    if cookie.is_some_and(Cookie::is_aborted) {
        return Ok(pix);
    }

    let mut dev = DrawDevice::new(&mut pix);
    list.run(&mut dev, &ctm, &clip, cookie)?;
    dev.close()?;
    Ok(pix)
}

/// Rasterize into a caller-owned buffer
///
/// The buffer must hold exactly `width * height * bytes_per_pixel` for the
/// rounded output box; anything else is rejected as `CannotCreateBuffer`
/// before any pixel is touched. A cookie that is already aborted also
/// leaves the buffer untouched. Returns the output dimensions.
pub fn render_into(
    list: &DisplayList,
    region: &Rect,
    zoom: f32,
    format: ColorFormat,
    cookie: Option<&Cookie>,
    buffer: &mut [u8],
) -> Result<(u32, u32)> {
    let ctm = Matrix::scale(zoom, zoom);
    let clip = region.transform(&ctm);
    let bbox = clip.round();
    let (w, h) = (bbox.width() as u32, bbox.height() as u32);

    let expected = w as usize * h as usize * format.bytes_per_pixel();
    if buffer.len() != expected {
        return Err(Error::CannotCreateBuffer);
    }

    if cookie.is_some_and(Cookie::is_aborted) {
        return Ok((w, h));
    }
    buffer.fill(if format.has_alpha() { 0x00 } else { 0xFF });

    let mut dev = DrawDevice::over(buffer, bbox, format);
    list.run(&mut dev, &ctm, &clip, cookie)?;
    dev.close()?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_list::ListBuilder;

    fn red_square_list() -> DisplayList {
        let mut builder = ListBuilder::new();
        builder
            .fill_rect(
                &Rect::new(2.0, 2.0, 4.0, 4.0),
                Color::new(0xFF, 0, 0),
                &Matrix::IDENTITY,
            )
            .unwrap();
        builder.finish()
    }

    #[test]
    fn test_render_dimensions_follow_zoom() {
        let list = red_square_list();
        let region = Rect::new(0.0, 0.0, 10.0, 8.0);
        let pix = render(&list, &region, 2.0, ColorFormat::Rgba, None).unwrap();
        assert_eq!((pix.width, pix.height), (20, 16));
    }

    #[test]
    fn test_render_fills_scaled_rect() {
        let list = red_square_list();
        let region = Rect::new(0.0, 0.0, 8.0, 8.0);
        let pix = render(&list, &region, 2.0, ColorFormat::Rgb, None).unwrap();
        // The 2..4 square lands at pixels 4..8 under zoom 2
        assert_eq!(pix.rgba_at(5, 5), [0xFF, 0, 0, 0xFF]);
        assert_eq!(pix.rgba_at(0, 0), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(pix.rgba_at(9, 9), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_render_region_offsets_output() {
        let list = red_square_list();
        let region = Rect::new(2.0, 2.0, 4.0, 4.0);
        let pix = render(&list, &region, 1.0, ColorFormat::Rgb, None).unwrap();
        assert_eq!((pix.x, pix.y), (2, 2));
        assert_eq!((pix.width, pix.height), (2, 2));
        assert_eq!(pix.rgba_at(0, 0), [0xFF, 0, 0, 0xFF]);
    }

    #[test]
    fn test_bgr_target_swaps_channels() {
        let list = red_square_list();
        let region = Rect::new(2.0, 2.0, 4.0, 4.0);
        let pix = render(&list, &region, 1.0, ColorFormat::Bgr, None).unwrap();
        assert_eq!(&pix.samples[..3], &[0, 0, 0xFF]);
    }

    #[test]
    fn test_preaborted_cookie_yields_blank_pixmap() {
        let list = red_square_list();
        let cookie = Cookie::new();
        cookie.abort();
        let region = Rect::new(0.0, 0.0, 8.0, 8.0);
        let pix = render(&list, &region, 1.0, ColorFormat::Rgba, Some(&cookie)).unwrap();
        assert!(pix.samples.iter().all(|&s| s == 0x00));
    }

    #[test]
    fn test_render_into_rejects_wrong_buffer_size() {
        let list = red_square_list();
        let region = Rect::new(0.0, 0.0, 8.0, 8.0);
        let mut buffer = vec![0u8; 7];
        let err = render_into(&list, &region, 1.0, ColorFormat::Rgba, None, &mut buffer)
            .unwrap_err();
        assert_eq!(err, Error::CannotCreateBuffer);
    }

    #[test]
    fn test_render_into_preaborted_leaves_buffer_untouched() {
        let list = red_square_list();
        let region = Rect::new(0.0, 0.0, 8.0, 8.0);
        let cookie = Cookie::new();
        cookie.abort();

        let mut buffer = vec![0xABu8; 8 * 8 * 3];
        let (w, h) =
            render_into(&list, &region, 1.0, ColorFormat::Rgb, Some(&cookie), &mut buffer)
                .unwrap();
        assert_eq!((w, h), (8, 8));
        assert!(buffer.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_render_into_matches_render() {
        let list = red_square_list();
        let region = Rect::new(0.0, 0.0, 8.0, 8.0);
        let pix = render(&list, &region, 1.0, ColorFormat::Rgba, None).unwrap();

        let mut buffer = vec![0u8; 8 * 8 * 4];
        let (w, h) = render_into(&list, &region, 1.0, ColorFormat::Rgba, None, &mut buffer)
            .unwrap();
        assert_eq!((w, h), (8, 8));
        assert_eq!(buffer, pix.samples);
    }

    #[test]
    fn test_image_blit_scales_nearest() {
        let image = Arc::new(Image {
            width: 2,
            height: 1,
            rgba: vec![0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF],
            xres: None,
            yres: None,
        });
        let mut builder = ListBuilder::new();
        builder
            .draw_image(&image, &Rect::new(0.0, 0.0, 4.0, 2.0), &Matrix::IDENTITY)
            .unwrap();
        let list = builder.finish();

        let pix = render(&list, &Rect::new(0.0, 0.0, 4.0, 2.0), 1.0, ColorFormat::Rgb, None)
            .unwrap();
        assert_eq!(pix.rgba_at(0, 0), [0xFF, 0, 0, 0xFF]);
        assert_eq!(pix.rgba_at(3, 1), [0, 0xFF, 0, 0xFF]);
    }

    #[test]
    fn test_translucent_image_composites_over_background() {
        let image = Arc::new(Image {
            width: 1,
            height: 1,
            rgba: vec![0, 0, 0, 128],
            xres: None,
            yres: None,
        });
        let mut builder = ListBuilder::new();
        builder
            .draw_image(&image, &Rect::new(0.0, 0.0, 1.0, 1.0), &Matrix::IDENTITY)
            .unwrap();
        let list = builder.finish();

        let pix = render(&list, &Rect::new(0.0, 0.0, 1.0, 1.0), 1.0, ColorFormat::Rgb, None)
            .unwrap();
        let [r, _, _, _] = pix.rgba_at(0, 0);
        // Half-transparent black over white lands near mid-gray
        assert!((126..=129).contains(&r));
    }
}
