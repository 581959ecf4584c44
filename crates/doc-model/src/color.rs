//! Color layouts for rasterization targets
//!
//! All pixel buffers are 8 bits per channel. `Rgb`/`Bgr` force alpha off;
//! `Rgba`/`Bgra` carry a trailing alpha channel.

/// An opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 0xFF, g: 0xFF, b: 0xFF };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack into 0x00RRGGBB, the form carried on extracted characters
    pub fn to_rgb_u32(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    pub fn from_rgb_u32(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xFF) as u8,
            g: ((v >> 8) & 0xFF) as u8,
            b: (v & 0xFF) as u8,
        }
    }
}

/// Pixel layout of a rasterization target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Rgb,
    Rgba,
    Bgr,
    Bgra,
}

impl ColorFormat {
    /// Color channels, not counting alpha
    pub fn color_channels(&self) -> usize {
        3
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, ColorFormat::Rgba | ColorFormat::Bgra)
    }

    /// Total bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        self.color_channels() + usize::from(self.has_alpha())
    }

    pub fn is_bgr(&self) -> bool {
        matches!(self, ColorFormat::Bgr | ColorFormat::Bgra)
    }
}
