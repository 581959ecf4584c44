//! Pagemill Document Model Library
//!
//! Shared plain types for the document engine: geometry, color layouts,
//! cancellation cookies, permissions and the error taxonomy.

pub mod color;
pub mod cookie;
pub mod error;
pub mod geometry;

pub use color::{Color, ColorFormat};
pub use cookie::Cookie;
pub use error::{Error, Permissions, Result};
pub use geometry::{IRect, Matrix, Point, Quad, Rect};
