//! Detached display lists
//!
//! A display list is a replayable recording of a page's drawing
//! operations. Once recorded it holds no reference to the page or document
//! it came from, so it can be replayed repeatedly — and concurrently from
//! several contexts — after the originals are gone.

use crate::device::{BboxDevice, Device, Image, TextSpan};
use pagemill_doc_model::{Color, Cookie, Matrix, Rect, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Command {
    FillRect { rect: Rect, color: Color, ctm: Matrix },
    DrawImage { image: Arc<Image>, rect: Rect, ctm: Matrix },
    ShowText { span: Arc<TextSpan>, ctm: Matrix },
}

impl Command {
    /// Extent of the command in list space
    fn bounds(&self) -> Rect {
        match self {
            Command::FillRect { rect, ctm, .. } => rect.transform(ctm),
            Command::DrawImage { rect, ctm, .. } => rect.transform(ctm),
            Command::ShowText { span, ctm } => span.bounds().transform(ctm),
        }
    }
}

/// Recording device: captures drawing operations into a display list
///
/// Feed a page's content through a builder, then call `finish()` to detach
/// the recording.
#[derive(Default)]
pub struct ListBuilder {
    commands: Vec<Command>,
}

impl ListBuilder {
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }

    /// Detach the recording as an immutable display list
    pub fn finish(self) -> DisplayList {
        DisplayList { commands: Arc::new(self.commands) }
    }
}

impl Device for ListBuilder {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()> {
        self.commands.push(Command::FillRect { rect: *rect, color, ctm: *ctm });
        Ok(())
    }

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        self.commands.push(Command::DrawImage {
            image: Arc::clone(image),
            rect: *rect,
            ctm: *ctm,
        });
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        self.commands.push(Command::ShowText { span: Arc::new(span.clone()), ctm: *ctm });
        Ok(())
    }
}

/// Immutable, replayable recording of a page's drawing operations
///
/// Cheap to clone; clones share the command storage. Read-only after
/// creation, which is what makes concurrent replay safe.
#[derive(Clone)]
pub struct DisplayList {
    commands: Arc<Vec<Command>>,
}

impl DisplayList {
    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Replay the list through a device
    ///
    /// `ctm` is composed on top of each command's recorded transform.
    /// Commands whose extent misses `clip` are skipped. The cookie, when
    /// supplied, is polled between commands; an abort stops the replay
    /// without error, leaving the device holding whatever was replayed so
    /// far. The device is not closed here — callers close it once all runs
    /// against it are done.
    pub fn run(
        &self,
        device: &mut dyn Device,
        ctm: &Matrix,
        clip: &Rect,
        cookie: Option<&Cookie>,
    ) -> Result<()> {
        for (done, command) in self.commands.iter().enumerate() {
            if let Some(cookie) = cookie {
                if cookie.is_aborted() {
                    break;
                }
                cookie.set_progress(done);
            }

            if command.bounds().transform(ctm).intersect(clip).is_empty() {
                continue;
            }

            match command {
                Command::FillRect { rect, color, ctm: recorded } => {
                    device.fill_rect(rect, *color, &recorded.concat(ctm))?;
                }
                Command::DrawImage { image, rect, ctm: recorded } => {
                    device.draw_image(image, rect, &recorded.concat(ctm))?;
                }
                Command::ShowText { span, ctm: recorded } => {
                    device.show_text(span, &recorded.concat(ctm))?;
                }
            }
        }
        Ok(())
    }

    /// Extent of the recorded content, via a bounds-only pass
    pub fn bounds(&self) -> Result<Rect> {
        let mut dev = BboxDevice::new();
        self.run(&mut dev, &Matrix::IDENTITY, &Rect::INFINITE, None)
            .map_err(|_| pagemill_doc_model::Error::CannotComputeBounds)?;
        dev.close()?;
        Ok(dev.bounds())
    }
}
