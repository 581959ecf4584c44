//! Document writers
//!
//! A writer turns display lists into pages of an output document. Backends
//! are looked up per format in a registry shared by all context clones;
//! PDF, SVG, HTML and XHTML ship built in, the archive formats (CBZ, DOCX,
//! ODT) resolve only through externally registered factories.

use crate::context::Context;
use base64::Engine;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, ObjectId, Stream};
use pagemill_doc_model::{Color, ColorFormat, Error, Matrix, Rect, Result};
use pagemill_render::encode::{write_image, ImageEncoding};
use pagemill_render::{Device, DisplayList, Image, Pixmap, TextSpan};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Output document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Pdf,
    Svg,
    Cbz,
    Docx,
    Odt,
    Html,
    Xhtml,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
            OutputFormat::Cbz => "cbz",
            OutputFormat::Docx => "docx",
            OutputFormat::Odt => "odt",
            OutputFormat::Html => "html",
            OutputFormat::Xhtml => "xhtml",
        }
    }
}

/// Format-specific page emitter behind a `DocumentWriter`
///
/// The writer drives it begin/draw/end per page, then `finish` yields the
/// final file bytes.
pub trait WriterBackend: Send {
    fn begin_page(&mut self, width: f32, height: f32) -> Result<()>;

    /// The device that receives the current page's content
    fn device(&mut self) -> &mut dyn Device;

    fn end_page(&mut self) -> Result<()>;

    /// Assemble the document; flush failures are `CannotCloseDocument`
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Creates writer backends for one output format
pub trait WriterFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn WriterBackend>>;
}

#[derive(Default)]
pub(crate) struct WriterRegistry {
    factories: HashMap<OutputFormat, Arc<dyn WriterFactory>>,
}

impl WriterRegistry {
    pub(crate) fn register(
        &mut self,
        format: OutputFormat,
        factory: Arc<dyn WriterFactory>,
    ) -> Result<()> {
        if self.factories.contains_key(&format) {
            return Err(Error::CannotRegisterHandlers);
        }
        self.factories.insert(format, factory);
        Ok(())
    }

    pub(crate) fn find(&self, format: OutputFormat) -> Option<Arc<dyn WriterFactory>> {
        self.factories.get(&format).cloned()
    }
}

pub(crate) fn register_builtin_writers(registry: &mut WriterRegistry) -> Result<()> {
    registry.register(OutputFormat::Pdf, Arc::new(PdfWriterFactory))?;
    registry.register(OutputFormat::Svg, Arc::new(SvgWriterFactory))?;
    registry.register(OutputFormat::Html, Arc::new(MarkupWriterFactory { xhtml: false }))?;
    registry.register(OutputFormat::Xhtml, Arc::new(MarkupWriterFactory { xhtml: true }))?;
    Ok(())
}

/// Writes display lists out as pages of a new document
///
/// `finalize` consumes the writer, so a finalized writer cannot be written
/// to again.
pub struct DocumentWriter {
    backend: Box<dyn WriterBackend>,
    path: PathBuf,
    pages: usize,
}

impl DocumentWriter {
    pub fn create(ctx: &Context, path: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let factory = ctx
            .writer_factory(format)
            .ok_or_else(|| Error::CannotCreateWriter(format.name().into()))?;
        Ok(Self { backend: factory.create()?, path: path.into(), pages: 0 })
    }

    /// Append one page holding a region of a display list
    ///
    /// The region's top-left corner becomes the page origin and the page
    /// is sized to the region scaled by `zoom`.
    pub fn write_page(&mut self, list: &DisplayList, region: &Rect, zoom: f32) -> Result<()> {
        let ctm =
            Matrix::translate(-region.x0, -region.y0).concat(&Matrix::scale(zoom, zoom));
        self.backend.begin_page(region.width() * zoom, region.height() * zoom)?;
        list.run(self.backend.device(), &ctm, &Rect::INFINITE, None)
            .map_err(|e| Error::CannotRender(e.to_string()))?;
        self.backend.end_page()?;
        self.pages += 1;
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Close the document and write it to disk
    pub fn finalize(mut self) -> Result<()> {
        let bytes = self.backend.finish()?;
        std::fs::write(&self.path, bytes).map_err(|e| Error::CannotCloseDocument(e.to_string()))
    }
}

fn hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode an image as a PNG data URI for embedding in markup
fn png_data_uri(image: &Image) -> Result<String> {
    let pixmap = Pixmap {
        x: 0,
        y: 0,
        width: image.width,
        height: image.height,
        format: ColorFormat::Rgba,
        samples: image.rgba.clone(),
    };
    let png = write_image(&pixmap, ImageEncoding::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

// ---------------------------------------------------------------------
// PDF backend (lopdf)

struct PdfWriterFactory;

impl WriterFactory for PdfWriterFactory {
    fn create(&self) -> Result<Box<dyn WriterBackend>> {
        Ok(Box::new(PdfBackend::new()))
    }
}

struct PdfPage {
    width: f32,
    height: f32,
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

struct PdfBackend {
    doc: lopdf::Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    page_ids: Vec<ObjectId>,
    image_count: usize,
    current: Option<PdfPage>,
}

impl PdfBackend {
    fn new() -> Self {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self { doc, pages_id, font_id, page_ids: Vec::new(), image_count: 0, current: None }
    }

    fn page(&mut self) -> Result<&mut PdfPage> {
        self.current
            .as_mut()
            .ok_or_else(|| Error::CannotRender("no open page".into()))
    }
}

impl Device for PdfBackend {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()> {
        let r = rect.transform(ctm);
        let page = self.page()?;
        // Flip into PDF's bottom-left coordinate space.
        let y = page.height - r.y1;
        page.ops.push(Operation::new(
            "rg",
            vec![
                (color.r as f32 / 255.0).into(),
                (color.g as f32 / 255.0).into(),
                (color.b as f32 / 255.0).into(),
            ],
        ));
        page.ops.push(Operation::new(
            "re",
            vec![r.x0.into(), y.into(), r.width().into(), r.height().into()],
        ));
        page.ops.push(Operation::new("f", vec![]));
        Ok(())
    }

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        // Alpha is dropped; PDF image XObjects here are plain DeviceRGB.
        let mut rgb = Vec::with_capacity(image.width as usize * image.height as usize * 3);
        for px in image.rgba.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        let xobject_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb,
        ));
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let r = rect.transform(ctm);
        let page = self.page()?;
        let y = page.height - r.y1;
        page.images.push((name.clone(), xobject_id));
        page.ops.push(Operation::new("q", vec![]));
        page.ops.push(Operation::new(
            "cm",
            vec![
                r.width().into(),
                0.into(),
                0.into(),
                r.height().into(),
                r.x0.into(),
                y.into(),
            ],
        ));
        page.ops.push(Operation::new("Do", vec![name.as_str().into()]));
        page.ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        let span = span.transform(ctm);
        let page = self.page()?;
        for ch in &span.chars {
            let y = page.height - ch.origin.y;
            page.ops.push(Operation::new(
                "rg",
                vec![
                    (ch.color.r as f32 / 255.0).into(),
                    (ch.color.g as f32 / 255.0).into(),
                    (ch.color.b as f32 / 255.0).into(),
                ],
            ));
            page.ops.push(Operation::new("BT", vec![]));
            page.ops.push(Operation::new("Tf", vec!["F1".into(), ch.size.into()]));
            page.ops.push(Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    ch.origin.x.into(),
                    y.into(),
                ],
            ));
            page.ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(ch.codepoint.to_string())],
            ));
            page.ops.push(Operation::new("ET", vec![]));
        }
        Ok(())
    }
}

impl WriterBackend for PdfBackend {
    fn begin_page(&mut self, width: f32, height: f32) -> Result<()> {
        self.current = Some(PdfPage { width, height, ops: Vec::new(), images: Vec::new() });
        Ok(())
    }

    fn device(&mut self) -> &mut dyn Device {
        self
    }

    fn end_page(&mut self) -> Result<()> {
        let page = self
            .current
            .take()
            .ok_or_else(|| Error::CannotRender("no open page".into()))?;
        let data = Content { operations: page.ops }
            .encode()
            .map_err(|e| Error::CannotRender(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, data));

        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in &page.images {
            xobjects.set(name.as_bytes(), *id);
        }
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page.width.into(),
                page.height.into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self
            .doc
            .add_object(dictionary! { "Type" => "Catalog", "Pages" => self.pages_id });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| Error::CannotCloseDocument(e.to_string()))?;
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------
// SVG backend

struct SvgWriterFactory;

impl WriterFactory for SvgWriterFactory {
    fn create(&self) -> Result<Box<dyn WriterBackend>> {
        Ok(Box::new(SvgBackend { pages: Vec::new(), current: None }))
    }
}

struct SvgPage {
    width: f32,
    height: f32,
    body: String,
}

struct SvgBackend {
    pages: Vec<SvgPage>,
    current: Option<SvgPage>,
}

impl SvgBackend {
    fn page(&mut self) -> Result<&mut SvgPage> {
        self.current
            .as_mut()
            .ok_or_else(|| Error::CannotRender("no open page".into()))
    }
}

impl Device for SvgBackend {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()> {
        let r = rect.transform(ctm);
        self.page()?.body.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            r.x0,
            r.y0,
            r.width(),
            r.height(),
            hex(color),
        ));
        Ok(())
    }

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        let uri = png_data_uri(image)?;
        let r = rect.transform(ctm);
        self.page()?.body.push_str(&format!(
            r#"<image x="{}" y="{}" width="{}" height="{}" href="{}"/>"#,
            r.x0,
            r.y0,
            r.width(),
            r.height(),
            uri,
        ));
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        let span = span.transform(ctm);
        let Some(first) = span.chars.first() else {
            return Ok(());
        };
        let text: String = span.chars.iter().map(|c| c.codepoint).collect();
        self.page()?.body.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="{}" fill="{}">{}</text>"#,
            first.origin.x,
            first.origin.y,
            first.size,
            hex(first.color),
            escape_markup(&text),
        ));
        Ok(())
    }
}

impl WriterBackend for SvgBackend {
    fn begin_page(&mut self, width: f32, height: f32) -> Result<()> {
        self.current = Some(SvgPage { width, height, body: String::new() });
        Ok(())
    }

    fn device(&mut self) -> &mut dyn Device {
        self
    }

    fn end_page(&mut self) -> Result<()> {
        let page = self
            .current
            .take()
            .ok_or_else(|| Error::CannotRender("no open page".into()))?;
        self.pages.push(page);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        // Pages stack vertically inside one root element.
        let width = self.pages.iter().map(|p| p.width).fold(0.0f32, f32::max);
        let height: f32 = self.pages.iter().map(|p| p.height).sum();
        let mut out = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
        );
        let mut offset = 0.0;
        for page in &self.pages {
            out.push_str(&format!(r#"<g transform="translate(0,{offset})">"#));
            out.push_str(&page.body);
            out.push_str("</g>");
            offset += page.height;
        }
        out.push_str("</svg>\n");
        Ok(out.into_bytes())
    }
}

// ---------------------------------------------------------------------
// HTML / XHTML backend

struct MarkupWriterFactory {
    xhtml: bool,
}

impl WriterFactory for MarkupWriterFactory {
    fn create(&self) -> Result<Box<dyn WriterBackend>> {
        Ok(Box::new(MarkupBackend { xhtml: self.xhtml, pages: Vec::new(), current: None }))
    }
}

struct MarkupBackend {
    xhtml: bool,
    pages: Vec<String>,
    current: Option<String>,
}

impl MarkupBackend {
    fn page(&mut self) -> Result<&mut String> {
        self.current
            .as_mut()
            .ok_or_else(|| Error::CannotRender("no open page".into()))
    }
}

impl Device for MarkupBackend {
    fn fill_rect(&mut self, rect: &Rect, color: Color, ctm: &Matrix) -> Result<()> {
        let r = rect.transform(ctm);
        self.page()?.push_str(&format!(
            r#"<div style="position:absolute;left:{}px;top:{}px;width:{}px;height:{}px;background:{};"></div>"#,
            r.x0,
            r.y0,
            r.width(),
            r.height(),
            hex(color),
        ));
        Ok(())
    }

    fn draw_image(&mut self, image: &Arc<Image>, rect: &Rect, ctm: &Matrix) -> Result<()> {
        let uri = png_data_uri(image)?;
        let r = rect.transform(ctm);
        self.page()?.push_str(&format!(
            r#"<img style="position:absolute;left:{}px;top:{}px;width:{}px;height:{}px;" src="{}"/>"#,
            r.x0,
            r.y0,
            r.width(),
            r.height(),
            uri,
        ));
        Ok(())
    }

    fn show_text(&mut self, span: &TextSpan, ctm: &Matrix) -> Result<()> {
        let span = span.transform(ctm);
        let Some(first) = span.chars.first() else {
            return Ok(());
        };
        let text: String = span.chars.iter().map(|c| c.codepoint).collect();
        self.page()?.push_str(&format!(
            r#"<span style="position:absolute;left:{}px;top:{}px;font-size:{}px;color:{};">{}</span>"#,
            first.origin.x,
            first.origin.y - first.size,
            first.size,
            hex(first.color),
            escape_markup(&text),
        ));
        Ok(())
    }
}

impl WriterBackend for MarkupBackend {
    fn begin_page(&mut self, _width: f32, _height: f32) -> Result<()> {
        self.current = Some(String::new());
        Ok(())
    }

    fn device(&mut self) -> &mut dyn Device {
        self
    }

    fn end_page(&mut self) -> Result<()> {
        let page = self
            .current
            .take()
            .ok_or_else(|| Error::CannotRender("no open page".into()))?;
        self.pages.push(page);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = String::new();
        if self.xhtml {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
            out.push_str("<!DOCTYPE html>\n");
            out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>document</title></head><body>\n");
        } else {
            out.push_str("<!DOCTYPE html>\n");
            out.push_str("<html><head><meta charset=\"utf-8\"></head><body>\n");
        }
        for page in &self.pages {
            out.push_str("<div class=\"page\" style=\"position:relative;\">");
            out.push_str(page);
            out.push_str("</div>\n");
        }
        out.push_str("</body></html>\n");
        Ok(out.into_bytes())
    }
}
