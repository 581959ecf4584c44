//! Built-in draft document handler
//!
//! The draft format is a JSON page description used as the reference
//! multi-page format: fixed pages of rects, text runs and solid images,
//! optional password protection and permission bits, and an optional
//! reflowable text flow whose pagination follows the layout.

use crate::document::Document;
use crate::handler::DocumentHandler;
use pagemill_cache::{ResourceStore, StoreKey};
use pagemill_doc_model::{Color, Error, Permissions, Point, Quad, Rect, Result};
use pagemill_render::{CharGeom, Device, Image, TextSpan, WriteMode};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub(crate) struct DraftHandler;

impl DocumentHandler for DraftHandler {
    fn name(&self) -> &'static str {
        "draft"
    }

    fn recognizes(&self, declared_type: &str) -> bool {
        matches!(declared_type, "draft" | "json")
    }

    fn open(&self, data: Arc<[u8]>, store: &Arc<ResourceStore>) -> Result<Box<dyn Document>> {
        let raw: RawDraft = serde_json::from_slice(&data)
            .map_err(|e| Error::CannotOpenStream(e.to_string()))?;
        Ok(Box::new(DraftDocument::build(raw, store)?))
    }
}

#[derive(Deserialize)]
struct RawDraft {
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(default)]
    pages: Vec<RawPage>,
    #[serde(default)]
    flow: Option<RawFlow>,
}

#[derive(Deserialize)]
struct RawPage {
    width: f32,
    height: f32,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    annotations: Vec<RawItem>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawItem {
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: String,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        text: String,
        #[serde(default)]
        color: Option<String>,
    },
    /// A solid-color placeholder image with its own pixel dimensions
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        pixels_wide: u32,
        pixels_high: u32,
        fill: String,
    },
}

#[derive(Deserialize)]
struct RawFlow {
    width: f32,
    height: f32,
    em: f32,
    text: String,
}

enum Item {
    Rect { rect: Rect, color: Color },
    Text { span: TextSpan },
    Image { rect: Rect, image: Arc<Image> },
}

struct PageModel {
    bounds: Rect,
    items: Vec<Item>,
    annotations: Vec<Item>,
}

struct Flow {
    width: f32,
    height: f32,
    em: f32,
    text: String,
}

pub(crate) struct DraftDocument {
    password: Option<String>,
    permissions: Permissions,
    flow: Option<Flow>,
    pages: Vec<PageModel>,
}

impl DraftDocument {
    fn build(raw: RawDraft, store: &Arc<ResourceStore>) -> Result<Self> {
        let permissions = match raw.permissions {
            Some(names) => parse_permissions(&names)?,
            None => Permissions::all(),
        };

        let flow = raw.flow.map(|f| Flow {
            width: f.width,
            height: f.height,
            em: f.em,
            text: f.text,
        });

        let pages = if let Some(flow) = &flow {
            reflow(flow)
        } else {
            raw.pages
                .into_iter()
                .map(|p| build_page(p, store))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self { password: raw.password, permissions, flow, pages })
    }
}

impl Document for DraftDocument {
    fn needs_password(&self) -> bool {
        self.password.is_some()
    }

    fn verify_password(&self, password: &str) -> bool {
        self.password.as_deref() == Some(password)
    }

    fn permissions(&self) -> Permissions {
        self.permissions
    }

    fn is_reflowable(&self) -> bool {
        self.flow.is_some()
    }

    fn set_layout(&mut self, width: f32, height: f32, em: f32) {
        if let Some(flow) = &mut self.flow {
            flow.width = width;
            flow.height = height;
            flow.em = em;
            self.pages = reflow(flow);
        }
    }

    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn page_bounds(&self, index: usize) -> Result<Rect> {
        self.pages
            .get(index)
            .map(|p| p.bounds)
            .ok_or(Error::CannotLoadPage(index))
    }

    fn run_page(
        &self,
        index: usize,
        device: &mut dyn Device,
        include_annotations: bool,
    ) -> Result<()> {
        let page = self.pages.get(index).ok_or(Error::CannotLoadPage(index))?;
        for item in &page.items {
            run_item(item, device)?;
        }
        if include_annotations {
            for item in &page.annotations {
                run_item(item, device)?;
            }
        }
        Ok(())
    }
}

fn run_item(item: &Item, device: &mut dyn Device) -> Result<()> {
    use pagemill_doc_model::Matrix;
    match item {
        Item::Rect { rect, color } => device.fill_rect(rect, *color, &Matrix::IDENTITY),
        Item::Text { span } => device.show_text(span, &Matrix::IDENTITY),
        Item::Image { rect, image } => device.draw_image(image, rect, &Matrix::IDENTITY),
    }
}

fn build_page(raw: RawPage, store: &Arc<ResourceStore>) -> Result<PageModel> {
    Ok(PageModel {
        bounds: Rect::new(0.0, 0.0, raw.width, raw.height),
        items: build_items(raw.items, store)?,
        annotations: build_items(raw.annotations, store)?,
    })
}

fn build_items(raw: Vec<RawItem>, store: &Arc<ResourceStore>) -> Result<Vec<Item>> {
    raw.into_iter()
        .map(|item| {
            Ok(match item {
                RawItem::Rect { x, y, w, h, color } => Item::Rect {
                    rect: Rect::from_origin_size(x, y, w, h),
                    color: parse_color(&color)?,
                },
                RawItem::Text { x, y, size, text, color } => {
                    let color = match color {
                        Some(c) => parse_color(&c)?,
                        None => Color::BLACK,
                    };
                    Item::Text { span: make_span(&text, Point::new(x, y), size, color) }
                }
                RawItem::Image { x, y, w, h, pixels_wide, pixels_high, fill } => Item::Image {
                    rect: Rect::from_origin_size(x, y, w, h),
                    image: solid_image(pixels_wide, pixels_high, parse_color(&fill)?, store)?,
                },
            })
        })
        .collect()
}

/// Decode a solid-fill image, caching it in the shared store
///
/// The item holds a strong reference, which pins the store entry for the
/// lifetime of the document.
fn solid_image(
    width: u32,
    height: u32,
    fill: Color,
    store: &Arc<ResourceStore>,
) -> Result<Arc<Image>> {
    if width == 0 || height == 0 {
        return Err(Error::CannotOpenStream("zero-sized image".into()));
    }
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..width as usize * height as usize {
        rgba.extend_from_slice(&[fill.r, fill.g, fill.b, 0xFF]);
    }
    let image = Arc::new(Image { width, height, rgba, xres: None, yres: None });

    let mut hasher = DefaultHasher::new();
    (width, height, fill.to_rgb_u32()).hash(&mut hasher);
    let key: StoreKey = hasher.finish();
    store.insert(key, Arc::clone(&image) as Arc<dyn pagemill_cache::StoreItem>);
    Ok(image)
}

/// Lay out a text run as a span of fixed-advance characters
///
/// `origin` is the baseline start; each character advances half the font
/// size, the draft format's nominal glyph width.
pub(crate) fn make_span(text: &str, origin: Point, size: f32, color: Color) -> TextSpan {
    let advance = size * 0.5;
    let mut chars = Vec::new();
    let mut x = origin.x;
    for codepoint in text.chars() {
        let cell = Rect::from_origin_size(x, origin.y - size, advance, size);
        chars.push(CharGeom {
            codepoint,
            color,
            origin: Point::new(x, origin.y),
            size,
            quad: Quad::from_rect(&cell),
        });
        x += advance;
    }
    TextSpan { wmode: WriteMode::Horizontal, dir: Point::new(1.0, 0.0), chars }
}

/// Paginate a flow for its current layout
///
/// Greedy word wrap at a fixed advance of `em / 2` per character, one line
/// per `1.2 em` of page height, a one-em margin all around.
fn reflow(flow: &Flow) -> Vec<PageModel> {
    let advance = flow.em * 0.5;
    let line_height = flow.em * 1.2;
    let usable_width = (flow.width - 2.0 * flow.em).max(advance);
    let chars_per_line = (usable_width / advance).floor().max(1.0) as usize;
    let usable_height = (flow.height - 2.0 * flow.em).max(line_height);
    let lines_per_page = (usable_height / line_height).floor().max(1.0) as usize;

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in flow.text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > chars_per_line
        {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let bounds = Rect::new(0.0, 0.0, flow.width, flow.height);
    let mut pages = Vec::new();
    for chunk in lines.chunks(lines_per_page) {
        let items = chunk
            .iter()
            .enumerate()
            .map(|(i, line)| Item::Text {
                span: make_span(
                    line,
                    Point::new(flow.em, flow.em + line_height * (i as f32 + 1.0)),
                    flow.em,
                    Color::BLACK,
                ),
            })
            .collect();
        pages.push(PageModel { bounds, items, annotations: Vec::new() });
    }
    if pages.is_empty() {
        pages.push(PageModel { bounds, items: Vec::new(), annotations: Vec::new() });
    }
    pages
}

fn parse_color(s: &str) -> Result<Color> {
    let hex = s
        .strip_prefix('#')
        .filter(|h| h.len() == 6)
        .ok_or_else(|| Error::CannotOpenStream(format!("bad color '{s}'")))?;
    let value = u32::from_str_radix(hex, 16)
        .map_err(|_| Error::CannotOpenStream(format!("bad color '{s}'")))?;
    Ok(Color::from_rgb_u32(value))
}

fn parse_permissions(names: &[String]) -> Result<Permissions> {
    let mut bits = 0;
    for name in names {
        bits |= match name.as_str() {
            "print" => Permissions::PRINT,
            "copy" => Permissions::COPY,
            "edit" => Permissions::EDIT,
            "annotate" => Permissions::ANNOTATE,
            other => {
                return Err(Error::CannotOpenStream(format!("unknown permission '{other}'")))
            }
        };
    }
    Ok(Permissions(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(json: &str) -> Result<Box<dyn Document>> {
        let store = Arc::new(ResourceStore::new(1 << 20));
        DraftHandler.open(Arc::from(json.as_bytes().to_vec().into_boxed_slice()), &store)
    }

    #[test]
    fn test_open_fixed_pages() {
        let doc = open(
            r##"{
                "pages": [
                    {"width": 100, "height": 50, "items": [
                        {"type": "rect", "x": 0, "y": 0, "w": 10, "h": 10, "color": "#ff0000"}
                    ]},
                    {"width": 100, "height": 50}
                ]
            }"##,
        )
        .unwrap();
        assert_eq!(doc.page_count().unwrap(), 2);
        assert_eq!(doc.page_bounds(0).unwrap(), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert!(!doc.is_reflowable());
    }

    #[test]
    fn test_corrupt_json_is_cannot_open_stream() {
        let err = open("{ not json").err().unwrap();
        assert!(matches!(err, Error::CannotOpenStream(_)));
    }

    #[test]
    fn test_bad_color_is_rejected_at_open() {
        let err = open(
            r##"{"pages": [{"width": 10, "height": 10, "items": [
                {"type": "rect", "x": 0, "y": 0, "w": 1, "h": 1, "color": "red"}
            ]}]}"##,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::CannotOpenStream(_)));
    }

    #[test]
    fn test_password_and_permissions() {
        let doc = open(
            r#"{"password": "pw", "permissions": ["print", "copy"],
                "pages": [{"width": 10, "height": 10}]}"#,
        )
        .unwrap();
        assert!(doc.needs_password());
        assert!(!doc.verify_password("nope"));
        assert!(doc.verify_password("pw"));

        let perms = doc.permissions();
        assert!(perms.can_print());
        assert!(perms.can_copy());
        assert!(!perms.can_edit());
        assert!(!perms.can_annotate());
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let err = open(r#"{"permissions": ["teleport"], "pages": []}"#).err().unwrap();
        assert!(matches!(err, Error::CannotOpenStream(_)));
    }

    #[test]
    fn test_reflow_page_count_follows_layout() {
        let text = "word ".repeat(400);
        let json = format!(
            r#"{{"flow": {{"width": 200, "height": 200, "em": 10, "text": "{}"}}}}"#,
            text.trim()
        );
        let mut doc = open(&json).unwrap();
        assert!(doc.is_reflowable());

        let initial = doc.page_count().unwrap();
        assert!(initial > 1);

        // A much larger page holds more lines, so fewer pages.
        doc.set_layout(800.0, 800.0, 10.0);
        let relaid = doc.page_count().unwrap();
        assert!(relaid < initial, "{relaid} >= {initial}");
    }

    #[test]
    fn test_image_item_is_cached_in_store() {
        let store = Arc::new(ResourceStore::new(1 << 20));
        let json = r##"{"pages": [{"width": 10, "height": 10, "items": [
            {"type": "image", "x": 0, "y": 0, "w": 5, "h": 5,
             "pixels_wide": 4, "pixels_high": 4, "fill": "#00ff00"}
        ]}]}"##;
        let doc = DraftHandler
            .open(Arc::from(json.as_bytes().to_vec().into_boxed_slice()), &store)
            .unwrap();

        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.size(), 4 * 4 * 4);

        // The document pins the entry; clearing must not drop it.
        store.clear();
        assert_eq!(store.entry_count(), 1);
        drop(doc);
        store.clear();
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_annotations_replayed_only_on_request() {
        let doc = open(
            r##"{"pages": [{"width": 10, "height": 10,
                "items": [{"type": "rect", "x": 0, "y": 0, "w": 1, "h": 1, "color": "#000000"}],
                "annotations": [{"type": "rect", "x": 5, "y": 5, "w": 1, "h": 1, "color": "#000000"}]
            }]}"##,
        )
        .unwrap();

        let mut builder = pagemill_render::ListBuilder::new();
        doc.run_page(0, &mut builder, false).unwrap();
        assert_eq!(builder.finish().len(), 1);

        let mut builder = pagemill_render::ListBuilder::new();
        doc.run_page(0, &mut builder, true).unwrap();
        assert_eq!(builder.finish().len(), 2);
    }
}
