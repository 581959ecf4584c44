//! OCR-assisted text extraction
//!
//! Rasterizes a display list and hands the pixels to a pluggable
//! recognition backend, then folds the recognized spans into the same
//! structured text tree as plain extraction. The engine ships no
//! recognizer of its own; embedders supply one through `OcrBackend`.

use crate::stext::{StextDevice, StructuredTextPage};
use pagemill_doc_model::{ColorFormat, Cookie, Error, Matrix, Rect, Result};
use pagemill_render::{raster, Device, Pixmap, TextSpan};
use std::sync::Once;

/// A text recognition engine
pub trait OcrBackend: Send + Sync {
    /// Environment variable naming the engine's data directory
    fn data_env_var(&self) -> &'static str {
        "TESSDATA_PREFIX"
    }

    /// Recognize text in a rasterized page
    ///
    /// Spans are returned in the pixmap's device coordinates. `progress`
    /// is called with a completion percentage; a zero return asks the
    /// engine to stop, and whatever was recognized so far is returned.
    /// A cancelled cookie has the same effect.
    fn recognize(
        &self,
        pixmap: &Pixmap,
        language: &str,
        progress: &mut dyn FnMut(i32) -> i32,
        cookie: Option<&Cookie>,
    ) -> Result<Vec<TextSpan>>;
}

static DATA_PREFIX: Once = Once::new();

/// Point the recognition engine at its data directory, once per process
///
/// Later calls with a different prefix are ignored; the engine reads the
/// variable only on first use.
fn apply_data_prefix(var: &str, prefix: &str) {
    DATA_PREFIX.call_once(|| std::env::set_var(var, prefix));
}

/// Extract structured text by recognition instead of content replay
///
/// The list region is rasterized at `zoom`, recognized, and the resulting
/// spans are scaled back into list coordinates. Rasterization failure is
/// `CannotCreatePage`; recognition or assembly failure is
/// `CannotPopulatePage`. An abort observed during recognition keeps the
/// content collected up to that point.
#[allow(clippy::too_many_arguments)]
pub fn extract_with_ocr(
    list: &pagemill_render::DisplayList,
    region: &Rect,
    zoom: f32,
    language: &str,
    data_prefix: Option<&str>,
    backend: &dyn OcrBackend,
    mut progress: impl FnMut(i32) -> i32,
    cookie: Option<&Cookie>,
) -> Result<StructuredTextPage> {
    if let Some(prefix) = data_prefix {
        apply_data_prefix(backend.data_env_var(), prefix);
    }

    let pixmap = raster::render(list, region, zoom, ColorFormat::Rgb, cookie)
        .map_err(|_| Error::CannotCreatePage)?;

    let spans = backend
        .recognize(&pixmap, language, &mut progress, cookie)
        .map_err(|_| Error::CannotPopulatePage)?;

    // Recognized geometry is in device pixels; bring it back to list space.
    let to_list = Matrix::scale(1.0 / zoom, 1.0 / zoom);
    let mut device = StextDevice::new();
    for span in &spans {
        device
            .show_text(span, &to_list)
            .map_err(|_| Error::CannotPopulatePage)?;
    }
    device.close().map_err(|_| Error::CannotPopulatePage)?;
    Ok(device.finish())
}
