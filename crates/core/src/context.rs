//! Execution contexts
//!
//! A context bundles the shared resource store, the handler and writer
//! registries, the font catalog and the named lock table. Clones of a
//! context share all of those; each clone keeps its own last-error slot so
//! worker threads report failures independently.

use crate::document::DocumentHandle;
use crate::draft::DraftHandler;
use crate::handler::{DocumentHandler, HandlerRegistry};
use crate::image_doc::RasterImageHandler;
use crate::writer::{register_builtin_writers, OutputFormat, WriterFactory, WriterRegistry};
use pagemill_cache::ResourceStore;
use pagemill_doc_model::{Error, Result};
use pagemill_render::fallback::{self, CjkOrdering, FallbackFont, FontCatalog, Language, Script};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Named locks serializing the engine's shared concerns
///
/// A single core call never holds two different ids at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockId {
    /// Compound store operations (shrink, clear) across clones
    Store,
    /// Font fallback resolution
    FontFallback,
    /// Handler and writer registration
    Handlers,
    /// Reserved for embedders
    Spare,
}

/// Fixed four-entry lock table, shared by all clones of a context
#[derive(Clone, Default)]
pub struct LockTable {
    locks: Arc<[Mutex<()>; 4]>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, id: LockId) -> MutexGuard<'_, ()> {
        let index = match id {
            LockId::Store => 0,
            LockId::FontFallback => 1,
            LockId::Handlers => 2,
            LockId::Spare => 3,
        };
        self.locks[index].lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Configuration for creating a context
pub struct ContextConfig {
    /// Byte capacity of the shared resource store
    pub store_capacity: u64,
    pub locks: LockTable,
    /// Installed substitute fonts for fallback resolution
    pub fonts: FontCatalog,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            store_capacity: 256 << 20,
            locks: LockTable::new(),
            fonts: FontCatalog::default(),
        }
    }
}

/// Engine entry point
///
/// Create one context, clone it for worker threads, and open documents
/// through it. Dropping a context never tears down the shared store while
/// sibling clones remain.
pub struct Context {
    store: Arc<ResourceStore>,
    handlers: Arc<Mutex<HandlerRegistry>>,
    writers: Arc<Mutex<WriterRegistry>>,
    fonts: Arc<FontCatalog>,
    locks: LockTable,
    last_error: Mutex<Option<Error>>,
}

impl Context {
    /// Create a context and register the built-in handlers and writers
    ///
    /// A registration failure tears the partially built context down.
    pub fn create(config: ContextConfig) -> Result<Context> {
        let ctx = Context {
            store: Arc::new(ResourceStore::new(config.store_capacity)),
            handlers: Arc::new(Mutex::new(HandlerRegistry::default())),
            writers: Arc::new(Mutex::new(WriterRegistry::default())),
            fonts: Arc::new(config.fonts),
            locks: config.locks,
            last_error: Mutex::new(None),
        };
        ctx.register_builtins().map_err(|_| Error::CannotRegisterHandlers)?;
        Ok(ctx)
    }

    fn register_builtins(&self) -> Result<()> {
        let _guard = self.locks.lock(LockId::Handlers);
        {
            let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            handlers.register(Arc::new(DraftHandler))?;
            handlers.register(Arc::new(RasterImageHandler))?;
        }
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        register_builtin_writers(&mut writers)
    }

    /// Clone this context once; the clone shares everything but its
    /// last-error slot
    pub fn try_clone(&self) -> Result<Context> {
        Ok(Context {
            store: Arc::clone(&self.store),
            handlers: Arc::clone(&self.handlers),
            writers: Arc::clone(&self.writers),
            fonts: Arc::clone(&self.fonts),
            locks: self.locks.clone(),
            last_error: Mutex::new(None),
        })
    }

    /// Clone this context `count` times, all or nothing
    ///
    /// If any clone fails, the ones already made are dropped and the
    /// original is untouched.
    pub fn clone_many(&self, count: usize) -> Result<Vec<Context>> {
        let mut clones = Vec::with_capacity(count);
        for _ in 0..count {
            match self.try_clone() {
                Ok(clone) => clones.push(clone),
                Err(_) => return Err(Error::CannotCloneContext),
            }
        }
        Ok(clones)
    }

    /// The shared resource store
    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    pub fn store_capacity(&self) -> u64 {
        self.store.capacity()
    }

    /// Free roughly `percent` of store usage; returns the share of the
    /// request achieved
    pub fn shrink_store(&self, percent: u8) -> u8 {
        let _guard = self.locks.lock(LockId::Store);
        self.store.shrink(percent)
    }

    pub fn clear_store(&self) {
        let _guard = self.locks.lock(LockId::Store);
        self.store.clear();
    }

    /// Resolve a substitute font for a script and language
    pub fn resolve_fallback_font(
        &self,
        script: Script,
        language: Language,
        serif: bool,
        bold: bool,
        italic: bool,
    ) -> Option<FallbackFont> {
        let _guard = self.locks.lock(LockId::FontFallback);
        fallback::resolve(&self.fonts, script, language, serif, bold, italic)
    }

    /// Resolve the CJK substitute for a character collection ordering
    pub fn resolve_cjk_font(&self, ordering: CjkOrdering) -> Option<FallbackFont> {
        let _guard = self.locks.lock(LockId::FontFallback);
        fallback::resolve_cjk(&self.fonts, ordering)
    }

    /// Register an additional document handler
    pub fn register_handler(&self, handler: Arc<dyn DocumentHandler>) -> Result<()> {
        let _guard = self.locks.lock(LockId::Handlers);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(handler)
    }

    /// Register a writer backend factory for an output format
    pub fn register_writer(
        &self,
        format: OutputFormat,
        factory: Arc<dyn WriterFactory>,
    ) -> Result<()> {
        let _guard = self.locks.lock(LockId::Handlers);
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(format, factory)
    }

    pub(crate) fn writer_factory(&self, format: OutputFormat) -> Option<Arc<dyn WriterFactory>> {
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(format)
    }

    /// Open a document from a file, dispatching on its extension
    pub fn open_file(&self, path: &Path, want_image_resolution: bool) -> Result<DocumentHandle> {
        let result = self.open_file_inner(path, want_image_resolution);
        self.record(result)
    }

    fn open_file_inner(&self, path: &Path, want_image_resolution: bool) -> Result<DocumentHandle> {
        let data = std::fs::read(path).map_err(|e| Error::CannotOpenFile(e.to_string()))?;
        let declared = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        self.open_inner(Arc::from(data.into_boxed_slice()), &declared, want_image_resolution)
            .map_err(|e| match e {
                Error::CannotOpenStream(msg) => Error::CannotOpenFile(msg),
                other => other,
            })
    }

    /// Open a document from an in-memory buffer of a declared type
    pub fn open_memory(
        &self,
        data: Arc<[u8]>,
        declared_type: &str,
        want_image_resolution: bool,
    ) -> Result<DocumentHandle> {
        let result = self.open_inner(data, declared_type, want_image_resolution);
        self.record(result)
    }

    fn open_inner(
        &self,
        data: Arc<[u8]>,
        declared_type: &str,
        want_image_resolution: bool,
    ) -> Result<DocumentHandle> {
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(declared_type)
            .ok_or_else(|| Error::CannotOpenStream(format!("no handler for '{declared_type}'")))?;
        let document = handler.open(data, &self.store)?;
        DocumentHandle::new(document, want_image_resolution)
    }

    /// The most recent error recorded on this context, if any
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_last_error(&self, error: Error) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Clear and return the last recorded error
    pub fn take_last_error(&self) -> Option<Error> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Record a failed result in the last-error slot, passing it through
    pub(crate) fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.set_last_error(err.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_registers_builtin_handlers() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let handlers = ctx.handlers.lock().unwrap();
        assert!(handlers.find("draft").is_some());
        assert!(handlers.find("png").is_some());
    }

    #[test]
    fn test_clones_share_the_store() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let clones = ctx.clone_many(3).unwrap();
        assert_eq!(clones.len(), 3);
        for clone in &clones {
            assert!(Arc::ptr_eq(ctx.store(), clone.store()));
            assert_eq!(clone.store_capacity(), ctx.store_capacity());
        }
    }

    #[test]
    fn test_store_survives_original_context_drop() {
        let clone = {
            let ctx = Context::create(ContextConfig::default()).unwrap();
            ctx.try_clone().unwrap()
        };
        assert_eq!(clone.store_size(), 0);
    }

    #[test]
    fn test_last_error_is_per_clone() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let clone = ctx.try_clone().unwrap();

        ctx.set_last_error(Error::CannotCountPages);
        assert_eq!(ctx.last_error(), Some(Error::CannotCountPages));
        assert_eq!(clone.last_error(), None);

        assert_eq!(ctx.take_last_error(), Some(Error::CannotCountPages));
        assert_eq!(ctx.last_error(), None);
    }

    #[test]
    fn test_open_memory_unknown_type_fails_and_records() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let data: Arc<[u8]> = Arc::from(vec![1u8, 2, 3].into_boxed_slice());
        let err = ctx.open_memory(data, "xyz", false).err().unwrap();
        assert!(matches!(err, Error::CannotOpenStream(_)));
        assert!(matches!(ctx.last_error(), Some(Error::CannotOpenStream(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let err = ctx.open_file(Path::new("/no/such/file.draft"), false).err().unwrap();
        assert!(matches!(err, Error::CannotOpenFile(_)));
    }

    #[test]
    fn test_fallback_resolution_through_context() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let font = ctx
            .resolve_fallback_font(Script::Han, Language::Ja, false, false, false)
            .unwrap();
        let by_ordering = ctx.resolve_cjk_font(CjkOrdering::AdobeJapan).unwrap();
        assert_eq!(font, by_ordering);
    }

    #[test]
    fn test_lock_table_is_reentrant_across_clones() {
        let ctx = Context::create(ContextConfig::default()).unwrap();
        let clone = ctx.try_clone().unwrap();

        let guard = ctx.locks.lock(LockId::Spare);
        let handle = std::thread::spawn(move || {
            // Different id: must not block on Spare being held.
            clone.shrink_store(10)
        });
        assert_eq!(handle.join().unwrap(), 100);
        drop(guard);
    }
}
