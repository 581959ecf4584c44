//! Pagemill Render Library
//!
//! Device model, detached display lists, software rasterization, image
//! encoding and script-based font fallback.

pub mod device;
pub mod display_list;
pub mod encode;
pub mod fallback;
pub mod pixmap;
pub mod raster;

pub use device::{BboxDevice, CharGeom, Device, Image, TextSpan, WriteMode};
pub use display_list::{DisplayList, ListBuilder};
pub use encode::{save_image, write_image, ImageEncoding};
pub use fallback::{resolve, resolve_cjk, CjkOrdering, CjkVariant, FallbackFont, FontCatalog, Language, Script};
pub use pixmap::Pixmap;
pub use raster::{render, render_into, DrawDevice};
