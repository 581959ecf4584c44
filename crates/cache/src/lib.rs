//! Pagemill Cache Library
//!
//! Bounded resource store with LRU eviction, shared across cloned
//! execution contexts.

pub mod store;

pub use store::{ResourceStore, StoreItem, StoreKey, StoreStats};
