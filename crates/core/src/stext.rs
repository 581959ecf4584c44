//! Structured text extraction
//!
//! Replays a display list through a collecting device and produces a
//! page / block / line / char tree in painter's order. Text blocks gather
//! consecutive text lines; an image interrupts the running text block.

use pagemill_doc_model::{Color, Error, Matrix, Point, Quad, Rect, Result};
use pagemill_render::{Device, DisplayList, Image, TextSpan, WriteMode};
use std::sync::Arc;

/// One positioned character
#[derive(Debug, Clone)]
pub struct Char {
    pub codepoint: char,
    pub color: Color,
    /// Baseline origin
    pub origin: Point,
    /// Font size in points
    pub size: f32,
    pub quad: Quad,
}

/// One line of text in a single writing mode and direction
#[derive(Debug, Clone)]
pub struct Line {
    pub wmode: WriteMode,
    /// Unit baseline direction
    pub dir: Point,
    pub bbox: Rect,
    pub chars: Vec<Char>,
}

impl Line {
    pub fn char_count(&self) -> usize {
        self.chars.len()
    }

    /// The line's characters as a string
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.codepoint).collect()
    }
}

#[derive(Debug, Clone)]
pub enum BlockKind {
    Text { lines: Vec<Line> },
    Image,
}

/// A block of content: a run of text lines, or an image placement
#[derive(Debug, Clone)]
pub struct Block {
    pub bbox: Rect,
    pub kind: BlockKind,
}

impl Block {
    pub fn line_count(&self) -> usize {
        match &self.kind {
            BlockKind::Text { lines } => lines.len(),
            BlockKind::Image => 0,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, BlockKind::Image)
    }
}

/// Extracted text tree for one page
///
/// Blocks appear in painter's order; lines and characters within them in
/// reading order.
#[derive(Debug, Clone, Default)]
pub struct StructuredTextPage {
    pub blocks: Vec<Block>,
}

impl StructuredTextPage {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn char_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match &b.kind {
                BlockKind::Text { lines } => lines.iter().map(Line::char_count).sum(),
                BlockKind::Image => 0,
            })
            .sum()
    }

    /// All text content, lines separated by newlines
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            if let BlockKind::Text { lines } = &block.kind {
                for line in lines {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&line.text());
                }
            }
        }
        out
    }
}

/// Device that collects spans into the structured text tree
pub(crate) struct StextDevice {
    blocks: Vec<Block>,
    open_lines: Vec<Line>,
}

impl StextDevice {
    pub(crate) fn new() -> Self {
        Self { blocks: Vec::new(), open_lines: Vec::new() }
    }

    fn flush_text_block(&mut self) {
        if self.open_lines.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.open_lines);
        let bbox = lines.iter().fold(Rect::EMPTY, |acc, l| acc.union(&l.bbox));
        self.blocks.push(Block { bbox, kind: BlockKind::Text { lines } });
    }

    pub(crate) fn finish(mut self) -> StructuredTextPage {
        self.flush_text_block();
        StructuredTextPage { blocks: self.blocks }
    }
}

impl Device for StextDevice {
    fn fill_rect(&mut self, _rect: &Rect, _color: Color, _ctm: &Matrix) -> Result<()> {
        // Vector fills carry no text content
        Ok(())
    }

    fn draw_image(&mut self, _image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        self.flush_text_block();
        self.blocks.push(Block { bbox: rect.transform(ctm), kind: BlockKind::Image });
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        let span = span.transform(ctm);
        let chars = span
            .chars
            .iter()
            .map(|c| Char {
                codepoint: c.codepoint,
                color: c.color,
                origin: c.origin,
                size: c.size,
                quad: c.quad,
            })
            .collect();
        self.open_lines.push(Line {
            wmode: span.wmode,
            dir: span.dir,
            bbox: span.bounds(),
            chars,
        });
        Ok(())
    }
}

/// Extract the structured text of a display list
///
/// Population failure is `CannotPopulatePage`; the partially built tree is
/// discarded. An empty list yields a page with zero blocks.
pub fn extract(list: &DisplayList) -> Result<StructuredTextPage> {
    let mut device = StextDevice::new();
    list.run(&mut device, &Matrix::IDENTITY, &Rect::INFINITE, None)
        .map_err(|_| Error::CannotPopulatePage)?;
    device.close().map_err(|_| Error::CannotPopulatePage)?;
    Ok(device.finish())
}
