//! Bounded mapping from track key to its cache.
//!
//! Eviction is by creation order: once the ceiling is exceeded, the track
//! created longest ago is dropped - reads and writes never refresh a
//! track's position. The policy is kept explicit as a map plus a FIFO
//! queue of keys rather than hidden inside a map implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::track_cache::{BoundMode, CacheError, TrackCache};

/// Ceiling used by [`TrackRegistry::with_defaults`].
pub const DEFAULT_TRACK_CEILING: usize = 20_000;

/// Counts reported by [`TrackRegistry::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub track_count: usize,
    pub point_count: usize,
}

struct Inner {
    tracks: HashMap<String, Arc<Mutex<TrackCache>>>,
    /// Track keys in creation order, oldest first
    creation_order: VecDeque<String>,
}

/// Bounded, thread-safe registry of per-track caches.
///
/// One short-held lock guards the map and the FIFO queue, making
/// get-or-create atomic per key; each cache lives behind its own lock, so
/// operations on different tracks never contend on cache work.
pub struct TrackRegistry {
    ceiling: usize,
    inner: Mutex<Inner>,
}

impl TrackRegistry {
    /// Registry holding at most `ceiling` tracks (at least one).
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            inner: Mutex::new(Inner {
                tracks: HashMap::new(),
                creation_order: VecDeque::new(),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TRACK_CEILING)
    }

    /// Return the cache for `track_key`, creating it with `bound` if the
    /// key is new.
    ///
    /// An existing cache always wins: a later call with a different bound
    /// mode for the same key is ignored. Creating past the ceiling evicts
    /// the oldest-created track; handles already held by callers stay
    /// valid, the registry just no longer reaches that cache.
    pub fn get_or_create(
        &self,
        track_key: &str,
        bound: BoundMode,
    ) -> Result<Arc<Mutex<TrackCache>>, CacheError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(cache) = inner.tracks.get(track_key) {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(Mutex::new(TrackCache::new(bound)?));
        inner.tracks.insert(track_key.to_string(), Arc::clone(&cache));
        inner.creation_order.push_back(track_key.to_string());
        trace!(track_key, tracks = inner.tracks.len(), "created track cache");

        if inner.tracks.len() > self.ceiling {
            if let Some(evicted) = inner.creation_order.pop_front() {
                inner.tracks.remove(&evicted);
                debug!(track_key = %evicted, "evicted oldest track, ceiling reached");
            }
        }

        Ok(cache)
    }

    /// Drop all tracks immediately (administrative reset).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tracks.clear();
        inner.creation_order.clear();
        debug!("cleared all track caches");
    }

    /// Number of registered tracks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the registry currently reaches `track_key`.
    pub fn contains(&self, track_key: &str) -> bool {
        self.inner.lock().unwrap().tracks.contains_key(track_key)
    }

    /// Track and retained-point counts across the registry.
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().unwrap();
        let point_count = inner
            .tracks
            .values()
            .map(|cache| cache.lock().unwrap().len())
            .sum();
        RegistryStats {
            track_count: inner.tracks.len(),
            point_count,
        }
    }
}
