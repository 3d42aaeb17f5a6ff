//! Size-bounded LRU cache of cue lists.
//!
//! Thumbnail and chapter consumers share one [`CueCache`], keyed by the
//! source URL (or base URL for inline cues). Reads promote the entry to most
//! recently used; once the bound is exceeded the least recently touched entry
//! is evicted. A pending set records sources currently being fetched so two
//! consumers never request the same source twice.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use abr_core::config::DEFAULT_CUE_CACHE_CAPACITY;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A timed text cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// Result of asking the cache for a source.
#[derive(Debug, Clone, PartialEq)]
pub enum CueLookup {
    /// Cached; the entry was promoted.
    Hit(Arc<Vec<Cue>>),
    /// Another consumer is already fetching this source.
    Pending,
    /// Not cached and not pending; the caller now owns the fetch.
    Miss,
}

/// LRU cache of cue lists with pending-fetch bookkeeping.
#[derive(Debug)]
pub struct CueCache {
    entries: LruCache<String, Arc<Vec<Cue>>>,
    pending: HashSet<String>,
}

/// A cue cache passed by reference to every consumer.
pub type SharedCueCache = Arc<Mutex<CueCache>>;

impl CueCache {
    /// Create a cache holding at most `capacity` entries (0 is raised to 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!(capacity, "cue cache created");
        Self {
            entries: LruCache::new(capacity),
            pending: HashSet::new(),
        }
    }

    /// Wrap a new cache for sharing.
    pub fn shared(capacity: usize) -> SharedCueCache {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cues for `src`, promoting the entry to most recently used.
    pub fn get(&mut self, src: &str) -> Option<Arc<Vec<Cue>>> {
        self.entries.get(src).cloned()
    }

    /// Get cues without touching the recency order.
    pub fn peek(&self, src: &str) -> Option<Arc<Vec<Cue>>> {
        self.entries.peek(src).cloned()
    }

    pub fn contains(&self, src: &str) -> bool {
        self.entries.contains(src)
    }

    /// Insert or overwrite cues for `src`, evicting the least recently used
    /// entry when over capacity.
    pub fn insert(&mut self, src: impl Into<String>, cues: Vec<Cue>) -> Arc<Vec<Cue>> {
        let src = src.into();
        let cues = Arc::new(cues);
        // `push` also hands back the old value when overwriting.
        if let Some((evicted, _)) = self.entries.push(src.clone(), Arc::clone(&cues)) {
            if evicted != src {
                debug!(src = %evicted, "cue cache evicted");
            }
        }
        cues
    }

    /// Look up `src`; on a miss, mark it pending so the caller fetches it.
    pub fn begin_load(&mut self, src: &str) -> CueLookup {
        if let Some(cues) = self.get(src) {
            return CueLookup::Hit(cues);
        }
        if !self.pending.insert(src.to_string()) {
            return CueLookup::Pending;
        }
        CueLookup::Miss
    }

    pub fn is_pending(&self, src: &str) -> bool {
        self.pending.contains(src)
    }

    /// Store fetched cues and clear the pending mark.
    pub fn complete(&mut self, src: &str, cues: Vec<Cue>) -> Arc<Vec<Cue>> {
        self.pending.remove(src);
        self.insert(src, cues)
    }

    /// Clear the pending mark after a failed fetch so a later consumer may
    /// retry.
    pub fn fail(&mut self, src: &str) {
        if self.pending.remove(src) {
            debug!(src, "cue load failed");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
    }
}

impl Default for CueCache {
    fn default() -> Self {
        Self::new(DEFAULT_CUE_CACHE_CAPACITY)
    }
}
