//! Resource store with size-bounded LRU eviction
//!
//! Caches decoded sub-resources (images, parsed page content, fonts) so
//! repeated renders of the same material do not re-decode. One store is
//! shared by every context cloned from the same original; its lifetime is
//! that of the longest-surviving context.
//!
//! Eviction is best-effort: an entry that a caller still holds a strong
//! reference to is pinned and will be skipped, so `shrink` may free less
//! than requested. That is an advisory outcome, never an error.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Key identifying a cached resource
///
/// Callers derive this from stable identity (content hash, document id +
/// page index, font name).
pub type StoreKey = u64;

/// A resource that can live in the store
///
/// Implementors report their decoded in-memory size so the store can
/// account for them against its byte budget.
pub trait StoreItem: Send + Sync {
    /// Decoded size of this resource in bytes
    fn size_bytes(&self) -> usize;
}

/// Statistics about store usage
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Number of entries currently in the store
    pub entry_count: usize,

    /// Total bytes used by cached entries
    pub bytes_used: u64,

    /// Maximum bytes allowed
    pub bytes_limit: u64,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of entries evicted
    pub evictions: u64,
}

struct StoreEntry {
    item: Arc<dyn StoreItem>,
    size: usize,
}

/// Internal store state, guarded by one mutex
struct StoreState {
    entries: HashMap<StoreKey, StoreEntry>,

    /// LRU queue: least recently used at the front
    lru_queue: VecDeque<StoreKey>,

    bytes_used: u64,
    bytes_limit: u64,
    stats: StoreStats,
}

impl StoreState {
    fn new(bytes_limit: u64) -> Self {
        Self {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            bytes_used: 0,
            bytes_limit,
            stats: StoreStats { bytes_limit, ..Default::default() },
        }
    }

    /// Mark a key as most recently used
    fn touch(&mut self, key: StoreKey) {
        self.lru_queue.retain(|&k| k != key);
        self.lru_queue.push_back(key);
    }

    /// An entry is pinned while a caller holds a strong reference to it
    fn is_pinned(entry: &StoreEntry) -> bool {
        Arc::strong_count(&entry.item) > 1
    }

    /// Evict the least recently used unpinned entry
    ///
    /// Returns the number of bytes freed, or `None` if every remaining
    /// entry is pinned.
    fn evict_lru(&mut self) -> Option<usize> {
        let victim = self
            .lru_queue
            .iter()
            .copied()
            .find(|key| self.entries.get(key).is_some_and(|e| !Self::is_pinned(e)))?;

        let entry = self.entries.remove(&victim)?;
        self.lru_queue.retain(|&k| k != victim);
        self.bytes_used = self.bytes_used.saturating_sub(entry.size as u64);
        self.stats.entry_count = self.entries.len();
        self.stats.bytes_used = self.bytes_used;
        self.stats.evictions += 1;
        Some(entry.size)
    }

    /// Evict until there is room for `required` more bytes
    fn evict_to_fit(&mut self, required: u64) {
        while self.bytes_used + required > self.bytes_limit && !self.entries.is_empty() {
            if self.evict_lru().is_none() {
                break;
            }
        }
    }
}

/// Bounded, shared resource store
///
/// Thread-safe; all operations may be called while contexts sharing the
/// store are concurrently rendering.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pagemill_cache::{ResourceStore, StoreItem};
///
/// struct Decoded(Vec<u8>);
/// impl StoreItem for Decoded {
///     fn size_bytes(&self) -> usize { self.0.len() }
/// }
///
/// let store = ResourceStore::new(1024 * 1024);
/// store.insert(1, Arc::new(Decoded(vec![0; 4096])));
/// assert_eq!(store.size(), 4096);
///
/// let freed = store.shrink(100);
/// assert_eq!(freed, 100);
/// assert_eq!(store.size(), 0);
/// ```
pub struct ResourceStore {
    state: Mutex<StoreState>,
}

impl ResourceStore {
    /// Create a store with the given byte capacity
    pub fn new(bytes_limit: u64) -> Self {
        Self { state: Mutex::new(StoreState::new(bytes_limit)) }
    }

    /// Current usage in bytes
    pub fn size(&self) -> u64 {
        self.state.lock().unwrap().bytes_used
    }

    /// Maximum usage in bytes
    pub fn capacity(&self) -> u64 {
        self.state.lock().unwrap().bytes_limit
    }

    /// Insert a resource, evicting LRU unpinned entries to make room
    ///
    /// Usage may transiently exceed the capacity during the insert; it is
    /// brought back under the limit before this call returns, unless the
    /// overshoot is held entirely by pinned entries.
    pub fn insert(&self, key: StoreKey, item: Arc<dyn StoreItem>) {
        let size = item.size_bytes();
        let mut state = self.state.lock().unwrap();

        if let Some(old) = state.entries.remove(&key) {
            state.bytes_used = state.bytes_used.saturating_sub(old.size as u64);
            state.lru_queue.retain(|&k| k != key);
        }

        state.evict_to_fit(size as u64);

        state.bytes_used += size as u64;
        state.entries.insert(key, StoreEntry { item, size });
        state.touch(key);

        state.stats.entry_count = state.entries.len();
        state.stats.bytes_used = state.bytes_used;
    }

    /// Look up a resource, marking it most recently used
    pub fn get(&self, key: StoreKey) -> Option<Arc<dyn StoreItem>> {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.entries.get(&key).map(|e| Arc::clone(&e.item)) {
            state.touch(key);
            state.stats.hits += 1;
            Some(item)
        } else {
            state.stats.misses += 1;
            None
        }
    }

    /// Check for a key without touching LRU order
    pub fn contains(&self, key: StoreKey) -> bool {
        self.state.lock().unwrap().entries.contains_key(&key)
    }

    /// Free roughly `percent` of current usage, least recently used first
    ///
    /// Stops once the requested share of the usage at call time has been
    /// freed, or when only pinned entries remain. Returns the percentage of
    /// the *request* actually achieved, clamped to 0..=100. Never errors;
    /// the outcome is advisory.
    pub fn shrink(&self, percent: u8) -> u8 {
        let percent = percent.min(100);
        let mut state = self.state.lock().unwrap();

        let start = state.bytes_used;
        if start == 0 || percent == 0 {
            return 100;
        }

        // At least one byte, so tiny stores still evict and the achieved
        // fraction below is well defined.
        let target = ((start as u128 * percent as u128 / 100) as u64).max(1);
        let mut freed: u64 = 0;
        while freed < target {
            match state.evict_lru() {
                Some(bytes) => freed += bytes as u64,
                None => break,
            }
        }

        ((freed.min(target) as u128 * 100) / target as u128) as u8
    }

    /// Evict everything evictable
    ///
    /// Pinned entries survive; everything else is dropped regardless of
    /// recency.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        while state.evict_lru().is_some() {}
    }

    /// Current usage statistics
    pub fn stats(&self) -> StoreStats {
        self.state.lock().unwrap().stats
    }

    /// Number of entries currently cached
    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }
}
