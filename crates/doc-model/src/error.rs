//! Error taxonomy for the document engine
//!
//! Every fallible operation returns one of these codes to its immediate
//! caller. Advisory outcomes — a shrink that frees less than requested, a
//! wrong password, an unresolved fallback font — are plain return values
//! and never appear here. The core does not log; reporting failures to a
//! user is the caller's job.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("cannot create context")]
    CannotCreateContext,

    #[error("cannot register document handlers")]
    CannotRegisterHandlers,

    #[error("cannot clone context")]
    CannotCloneContext,

    #[error("cannot open file: {0}")]
    CannotOpenFile(String),

    #[error("cannot open memory stream: {0}")]
    CannotOpenStream(String),

    #[error("cannot count pages")]
    CannotCountPages,

    #[error("cannot load page {0}")]
    CannotLoadPage(usize),

    #[error("cannot compute bounds")]
    CannotComputeBounds,

    #[error("cannot render: {0}")]
    CannotRender(String),

    #[error("cannot create buffer")]
    CannotCreateBuffer,

    #[error("cannot save: {0}")]
    CannotSave(String),

    #[error("cannot create structured text page")]
    CannotCreatePage,

    #[error("cannot populate structured text page")]
    CannotPopulatePage,

    #[error("cannot create document writer: {0}")]
    CannotCreateWriter(String),

    #[error("cannot close document: {0}")]
    CannotCloseDocument(String),
}

/// Document permission bits
///
/// Reported as a bitmask: PRINT=1, COPY=2, EDIT=4, ANNOTATE=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions(pub u32);

impl Permissions {
    pub const PRINT: u32 = 1;
    pub const COPY: u32 = 2;
    pub const EDIT: u32 = 4;
    pub const ANNOTATE: u32 = 8;

    /// All four permissions granted
    pub fn all() -> Self {
        Permissions(Self::PRINT | Self::COPY | Self::EDIT | Self::ANNOTATE)
    }

    pub fn none() -> Self {
        Permissions(0)
    }

    pub fn can_print(&self) -> bool {
        self.0 & Self::PRINT != 0
    }

    pub fn can_copy(&self) -> bool {
        self.0 & Self::COPY != 0
    }

    pub fn can_edit(&self) -> bool {
        self.0 & Self::EDIT != 0
    }

    pub fn can_annotate(&self) -> bool {
        self.0 & Self::ANNOTATE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::CannotLoadPage(5).to_string(),
            "cannot load page 5"
        );
        assert_eq!(
            Error::CannotOpenFile("no such file".into()).to_string(),
            "cannot open file: no such file"
        );
    }

    #[test]
    fn test_permission_bits() {
        let p = Permissions(Permissions::PRINT | Permissions::COPY);
        assert!(p.can_print());
        assert!(p.can_copy());
        assert!(!p.can_edit());
        assert!(!p.can_annotate());
    }

    #[test]
    fn test_permissions_all_mask() {
        assert_eq!(Permissions::all().0, 0b1111);
        assert!(Permissions::all().can_annotate());
        assert!(!Permissions::none().can_print());
    }
}
