//! Pixmap encoding to on-disk image formats
//!
//! PNM and PAM are emitted directly, PNG goes through the `image` crate,
//! PSD writes the fixed 8-bit planar RGB layout. PNM always drops alpha;
//! the other formats keep it when the pixmap carries one.

use crate::pixmap::Pixmap;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use pagemill_doc_model::{Error, Result};
use std::io::Write;
use std::path::Path;

/// Supported raster output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Binary PPM (P6), RGB only
    Pnm,
    /// PAM (P7), RGB or RGB_ALPHA
    Pam,
    Png,
    /// Photoshop 8-bit planar RGB
    Psd,
}

/// Encode a pixmap into an in-memory byte buffer
pub fn write_image(pixmap: &Pixmap, encoding: ImageEncoding) -> Result<Vec<u8>> {
    match encoding {
        ImageEncoding::Pnm => write_pnm(pixmap),
        ImageEncoding::Pam => write_pam(pixmap),
        ImageEncoding::Png => write_png(pixmap),
        ImageEncoding::Psd => write_psd(pixmap),
    }
}

/// Encode a pixmap and write it to a file
pub fn save_image(pixmap: &Pixmap, path: &Path, encoding: ImageEncoding) -> Result<()> {
    let bytes = write_image(pixmap, encoding)?;
    std::fs::write(path, bytes).map_err(|e| Error::CannotSave(e.to_string()))
}

fn write_pnm(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write!(out, "P6\n{} {}\n255\n", pixmap.width, pixmap.height)
        .map_err(|e| Error::CannotSave(e.to_string()))?;
    out.extend_from_slice(&pixmap.to_rgb());
    Ok(out)
}

fn write_pam(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let alpha = pixmap.format.has_alpha();
    let (depth, tupltype) = if alpha { (4, "RGB_ALPHA") } else { (3, "RGB") };

    let mut out = Vec::new();
    write!(
        out,
        "P7\nWIDTH {}\nHEIGHT {}\nDEPTH {}\nMAXVAL 255\nTUPLTYPE {}\nENDHDR\n",
        pixmap.width, pixmap.height, depth, tupltype
    )
    .map_err(|e| Error::CannotSave(e.to_string()))?;
    if alpha {
        out.extend_from_slice(&pixmap.to_rgba());
    } else {
        out.extend_from_slice(&pixmap.to_rgb());
    }
    Ok(out)
}

fn write_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    let result = if pixmap.format.has_alpha() {
        encoder.write_image(
            &pixmap.to_rgba(),
            pixmap.width,
            pixmap.height,
            ExtendedColorType::Rgba8,
        )
    } else {
        encoder.write_image(
            &pixmap.to_rgb(),
            pixmap.width,
            pixmap.height,
            ExtendedColorType::Rgb8,
        )
    };
    result.map_err(|e| Error::CannotSave(e.to_string()))?;
    Ok(out)
}

fn write_psd(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let alpha = pixmap.format.has_alpha();
    let channels: u16 = if alpha { 4 } else { 3 };
    let samples = if alpha { pixmap.to_rgba() } else { pixmap.to_rgb() };
    let pixel_count = pixmap.width as usize * pixmap.height as usize;

    let mut out = Vec::new();
    out.extend_from_slice(b"8BPS");
    out.extend_from_slice(&1u16.to_be_bytes()); // version
    out.extend_from_slice(&[0u8; 6]); // reserved
    out.extend_from_slice(&channels.to_be_bytes());
    out.extend_from_slice(&pixmap.height.to_be_bytes());
    out.extend_from_slice(&pixmap.width.to_be_bytes());
    out.extend_from_slice(&8u16.to_be_bytes()); // bit depth
    out.extend_from_slice(&3u16.to_be_bytes()); // color mode RGB
    out.extend_from_slice(&0u32.to_be_bytes()); // color mode data
    out.extend_from_slice(&0u32.to_be_bytes()); // image resources
    out.extend_from_slice(&0u32.to_be_bytes()); // layer and mask info
    out.extend_from_slice(&0u16.to_be_bytes()); // raw compression

    // Planar image data: all of channel 0, then channel 1, ...
    let step = channels as usize;
    for channel in 0..step {
        out.reserve(pixel_count);
        for i in 0..pixel_count {
            out.push(samples[i * step + channel]);
        }
    }
    Ok(out)
}
