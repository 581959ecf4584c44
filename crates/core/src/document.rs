//! Document and page model
//!
//! A `DocumentHandle` owns a parsed document plus the derived state the
//! engine tracks for it: page count, authentication, and the optional
//! native image resolution. Pages borrow their document, so a page cannot
//! outlive the document it came from.

use pagemill_doc_model::{Error, Permissions, Rect, Result};
use pagemill_render::{Device, DisplayList, ListBuilder};

/// A parsed document, produced by a handler
///
/// The default implementations describe an unprotected fixed-layout
/// document; handlers override what their format supports.
pub trait Document: Send {
    /// Whether opening the content requires a password
    fn needs_password(&self) -> bool {
        false
    }

    /// Check a password. Called only when `needs_password` is true.
    fn verify_password(&self, _password: &str) -> bool {
        true
    }

    fn permissions(&self) -> Permissions {
        Permissions::all()
    }

    fn is_reflowable(&self) -> bool {
        false
    }

    /// Re-flow content for the given layout. No-op for fixed layouts.
    fn set_layout(&mut self, _width: f32, _height: f32, _em: f32) {}

    fn page_count(&self) -> Result<usize>;

    /// Bounds of a page in points, origin top-left
    fn page_bounds(&self, index: usize) -> Result<Rect>;

    /// Replay a page's content through a device
    ///
    /// Annotation content is appended after page content when requested.
    fn run_page(
        &self,
        index: usize,
        device: &mut dyn Device,
        include_annotations: bool,
    ) -> Result<()>;

    /// Native resolution in DPI, for single-image documents
    fn image_resolution(&self) -> Option<(f32, f32)> {
        None
    }
}

/// An open document plus its engine-side state
pub struct DocumentHandle {
    document: Box<dyn Document>,
    page_count: usize,
    authenticated: bool,
    image_resolution: Option<(f32, f32)>,
}

impl DocumentHandle {
    pub(crate) fn new(document: Box<dyn Document>, want_image_resolution: bool) -> Result<Self> {
        let page_count = document.page_count().map_err(|_| Error::CannotCountPages)?;
        let authenticated = !document.needs_password();
        let image_resolution = if want_image_resolution {
            // A failed probe is not an error; the resolution is simply unknown.
            document.image_resolution()
        } else {
            None
        };
        Ok(Self { document, page_count, authenticated, image_resolution })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Native image resolution in DPI, when requested at open and the
    /// probe succeeded
    pub fn image_resolution(&self) -> Option<(f32, f32)> {
        self.image_resolution
    }

    pub fn needs_password(&self) -> bool {
        self.document.needs_password()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Try a password; a wrong password returns `false`, never an error
    pub fn authenticate(&mut self, password: &str) -> bool {
        if self.document.verify_password(password) {
            self.authenticated = true;
        }
        self.authenticated
    }

    pub fn permissions(&self) -> Permissions {
        self.document.permissions()
    }

    pub fn is_reflowable(&self) -> bool {
        self.document.is_reflowable()
    }

    /// Apply a layout and recount pages
    ///
    /// Reflowable documents may change their page count here; fixed
    /// layouts keep theirs.
    pub fn set_layout(&mut self, width: f32, height: f32, em: f32) -> Result<()> {
        self.document.set_layout(width, height, em);
        self.page_count = self.document.page_count().map_err(|_| Error::CannotCountPages)?;
        Ok(())
    }

    /// Load a page by zero-based index
    ///
    /// Out-of-range indexes and locked documents refuse the load. Page
    /// bounds are computed here, once.
    pub fn load_page(&self, index: usize) -> Result<Page<'_>> {
        if !self.authenticated || index >= self.page_count {
            return Err(Error::CannotLoadPage(index));
        }
        let bounds = self
            .document
            .page_bounds(index)
            .map_err(|_| Error::CannotComputeBounds)?;
        Ok(Page { document: self.document.as_ref(), index, bounds })
    }
}

/// A loaded page, borrowing its document
pub struct Page<'doc> {
    document: &'doc dyn Document,
    index: usize,
    bounds: Rect,
}

impl Page<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Record the page's content as a detached display list
    ///
    /// The list holds no reference to the page or document; it stays valid
    /// after both are dropped.
    pub fn record(&self, include_annotations: bool) -> Result<DisplayList> {
        let mut builder = ListBuilder::new();
        self.document
            .run_page(self.index, &mut builder, include_annotations)
            .map_err(|e| Error::CannotRender(e.to_string()))?;
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagemill_doc_model::{Color, Matrix};

    /// Fixed two-page document with one rect per page
    struct TwoPageDoc;

    impl Document for TwoPageDoc {
        fn page_count(&self) -> Result<usize> {
            Ok(2)
        }

        fn page_bounds(&self, _index: usize) -> Result<Rect> {
            Ok(Rect::new(0.0, 0.0, 100.0, 50.0))
        }

        fn run_page(
            &self,
            index: usize,
            device: &mut dyn Device,
            include_annotations: bool,
        ) -> Result<()> {
            device.fill_rect(
                &Rect::new(0.0, 0.0, 10.0 * (index as f32 + 1.0), 10.0),
                Color::BLACK,
                &Matrix::IDENTITY,
            )?;
            if include_annotations {
                device.fill_rect(&Rect::new(90.0, 40.0, 100.0, 50.0), Color::BLACK, &Matrix::IDENTITY)?;
            }
            Ok(())
        }
    }

    struct LockedDoc;

    impl Document for LockedDoc {
        fn needs_password(&self) -> bool {
            true
        }

        fn verify_password(&self, password: &str) -> bool {
            password == "sesame"
        }

        fn page_count(&self) -> Result<usize> {
            Ok(1)
        }

        fn page_bounds(&self, _index: usize) -> Result<Rect> {
            Ok(Rect::new(0.0, 0.0, 10.0, 10.0))
        }

        fn run_page(&self, _: usize, _: &mut dyn Device, _: bool) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_page_out_of_range() {
        let handle = DocumentHandle::new(Box::new(TwoPageDoc), false).unwrap();
        assert!(handle.load_page(1).is_ok());
        assert_eq!(handle.load_page(2).err().unwrap(), Error::CannotLoadPage(2));
    }

    #[test]
    fn test_locked_document_refuses_page_loads() {
        let mut handle = DocumentHandle::new(Box::new(LockedDoc), false).unwrap();
        assert!(handle.needs_password());
        assert!(handle.load_page(0).is_err());

        assert!(!handle.authenticate("wrong"));
        assert!(handle.load_page(0).is_err());

        assert!(handle.authenticate("sesame"));
        assert!(handle.load_page(0).is_ok());
    }

    #[test]
    fn test_record_includes_annotations_on_request() {
        let handle = DocumentHandle::new(Box::new(TwoPageDoc), false).unwrap();
        let page = handle.load_page(0).unwrap();

        let without = page.record(false).unwrap();
        let with = page.record(true).unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(with.len(), 2);
    }

    #[test]
    fn test_list_outlives_page_and_document() {
        let list = {
            let handle = DocumentHandle::new(Box::new(TwoPageDoc), false).unwrap();
            let page = handle.load_page(0).unwrap();
            page.record(false).unwrap()
        };
        assert_eq!(list.bounds().unwrap(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }
}
