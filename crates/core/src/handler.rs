//! Document handler registry
//!
//! Opening a document dispatches on its declared type (usually the file
//! extension) to a registered handler. The built-in handlers cover the
//! draft format and raster images; additional format codecs register
//! through the same interface.

use crate::document::Document;
use pagemill_cache::ResourceStore;
use pagemill_doc_model::{Error, Result};
use std::sync::Arc;

/// Opens documents of one format family
pub trait DocumentHandler: Send + Sync {
    /// Stable handler name; registering two handlers with the same name
    /// is rejected
    fn name(&self) -> &'static str;

    /// Whether this handler opens the given declared type
    fn recognizes(&self, declared_type: &str) -> bool;

    /// Parse the raw bytes into a document
    ///
    /// Decoded sub-resources go into the shared store. Unparseable input
    /// is `CannotOpenStream`.
    fn open(&self, data: Arc<[u8]>, store: &Arc<ResourceStore>) -> Result<Box<dyn Document>>;
}

/// Ordered set of registered handlers; first match wins
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn DocumentHandler>>,
}

impl HandlerRegistry {
    pub fn register(&mut self, handler: Arc<dyn DocumentHandler>) -> Result<()> {
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            return Err(Error::CannotRegisterHandlers);
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn find(&self, declared_type: &str) -> Option<Arc<dyn DocumentHandler>> {
        self.handlers.iter().find(|h| h.recognizes(declared_type)).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
