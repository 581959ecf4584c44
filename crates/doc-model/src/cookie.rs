//! Cancellation cookie for long-running renders
//!
//! A cookie is handed into a render or extraction call and polled at safe
//! points. Cancellation is cooperative: setting the abort flag never
//! preempts a call that is already past its last checkpoint.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

/// Cooperative cancellation and progress token
///
/// All clones of a cookie share the same underlying state, so the flag can
/// be set from one thread and observed by a render running on another.
///
/// # Example
///
/// ```
/// use pagemill_doc_model::Cookie;
///
/// let cookie = Cookie::new();
/// let render_cookie = cookie.clone();
///
/// // In the controlling thread:
/// cookie.abort();
///
/// // In the rendering thread:
/// assert!(render_cookie.is_aborted());
/// ```
#[derive(Clone, Default)]
pub struct Cookie {
    aborted: Arc<AtomicBool>,
    progress: Arc<AtomicUsize>,
}

impl Cookie {
    /// Create a new cookie in the non-aborted state
    pub fn new() -> Self {
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Request cancellation
    ///
    /// Idempotent; observed by all clones.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Record replay progress (commands executed so far)
    pub fn set_progress(&self, done: usize) {
        self.progress.store(done, Ordering::Relaxed);
    }

    /// Last recorded progress value
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }
}
