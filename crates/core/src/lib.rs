//! Pagemill Core Library
//!
//! Execution contexts, document opening, structured text extraction and
//! document writing, on top of the render and cache crates.

pub mod context;
pub mod document;
pub mod handler;
pub mod ocr;
pub mod stext;
pub mod writer;

mod draft;
mod image_doc;

pub use context::{Context, ContextConfig, LockId, LockTable};
pub use document::{Document, DocumentHandle, Page};
pub use handler::{DocumentHandler, HandlerRegistry};
pub use ocr::{extract_with_ocr, OcrBackend};
pub use stext::{extract, Block, BlockKind, Char, Line, StructuredTextPage};
pub use writer::{DocumentWriter, OutputFormat, WriterBackend, WriterFactory};
