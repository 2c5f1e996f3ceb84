//! The per-track bounded time-series cache.
//!
//! An ordered-by-time collection of [`TimedPoint`]s for one track. Each
//! insert runs three phases as one logically atomic update:
//! 1. store at the time key (last-write-wins on an exact key collision)
//! 2. collapse stationary runs - every maximal run of consecutive entries
//!    sharing a location key is reduced to its most recent member
//! 3. enforce the bound fixed at construction (entry count or entry age)
//!
//! `insert` is the sole mutator; everything else is a read.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::clock::now_millis;
use crate::events::SpatialReference;
use crate::timed_point::TimedPoint;

/// Retention policy for a [`TrackCache`], fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundMode {
    /// Retain at most this many entries
    Count(usize),
    /// Retain only entries younger than this many milliseconds
    Age(i64),
}

/// Errors raised by cache construction and insertion.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The configured bound was zero or negative
    #[error("cache bound must be positive, got {0:?}")]
    InvalidBound(BoundMode),

    /// The point has no coordinate (source geometry was not a single point)
    #[error("unsupported geometry: only single points are cached")]
    UnsupportedGeometry,
}

/// Ordered, bounded history of one track's points, keyed by time.
#[derive(Debug)]
pub struct TrackCache {
    entries: BTreeMap<i64, TimedPoint>,
    bound: BoundMode,
    /// Captured from the first accepted point, never changed afterwards
    spatial_reference: Option<SpatialReference>,
}

impl TrackCache {
    /// Create a cache with the given bound mode.
    ///
    /// Refuses a zero count bound or a non-positive age bound.
    pub fn new(bound: BoundMode) -> Result<Self, CacheError> {
        match bound {
            BoundMode::Count(0) => Err(CacheError::InvalidBound(bound)),
            BoundMode::Age(ms) if ms <= 0 => Err(CacheError::InvalidBound(bound)),
            _ => Ok(Self {
                entries: BTreeMap::new(),
                bound,
                spatial_reference: None,
            }),
        }
    }

    /// Count-bounded cache retaining at most `max_count` entries.
    pub fn with_count(max_count: usize) -> Result<Self, CacheError> {
        Self::new(BoundMode::Count(max_count))
    }

    /// Age-bounded cache retaining entries younger than `max_age_ms`.
    pub fn with_age(max_age_ms: i64) -> Result<Self, CacheError> {
        Self::new(BoundMode::Age(max_age_ms))
    }

    /// Insert a point, returning the entry it displaced at the same time
    /// key, if any.
    ///
    /// A point without a coordinate is rejected without mutating state or
    /// running eviction.
    pub fn insert(&mut self, point: TimedPoint) -> Result<Option<TimedPoint>, CacheError> {
        self.insert_at(point, now_millis())
    }

    fn insert_at(&mut self, point: TimedPoint, now_ms: i64) -> Result<Option<TimedPoint>, CacheError> {
        if point.coordinate.is_none() {
            debug!(
                track_key = %point.track_key,
                time_key = point.time_key,
                "rejected: unsupported geometry"
            );
            return Err(CacheError::UnsupportedGeometry);
        }

        let time_key = point.time_key;
        let spatial_reference = point.spatial_reference;
        trace!(time_key, size = self.entries.len(), "adding point to cache");

        let displaced = self.entries.insert(time_key, point);
        if self.spatial_reference.is_none() {
            self.spatial_reference = Some(spatial_reference);
            trace!(wkid = spatial_reference.wkid, "captured spatial reference");
        }

        self.collapse_runs();
        self.enforce_bound(now_ms);

        Ok(displaced)
    }

    /// Collapse every maximal run of consecutive entries sharing a location
    /// key down to its most recent member.
    ///
    /// Walks from the newest entry downward: while the next-lower entry
    /// carries the same location key as the current one, it is deleted;
    /// otherwise the scan advances to it. A `None` location key matches
    /// nothing, including another `None`.
    fn collapse_runs(&mut self) {
        let Some((&newest, _)) = self.entries.last_key_value() else {
            return;
        };

        let mut cur_key = newest;
        let mut cur_loc = match self.entries.get(&cur_key) {
            Some(p) => p.location_key.clone(),
            None => return,
        };

        loop {
            let prev = self
                .entries
                .range(..cur_key)
                .next_back()
                .map(|(&k, p)| (k, p.location_key.clone()));
            let Some((prev_key, prev_loc)) = prev else {
                break;
            };

            let same_location = matches!((&cur_loc, &prev_loc), (Some(a), Some(b)) if a == b);
            if same_location {
                trace!(time_key = prev_key, "collapsing stationary point");
                self.entries.remove(&prev_key);
            } else {
                cur_key = prev_key;
                cur_loc = prev_loc;
            }
        }
    }

    /// Drop oldest entries until the configured bound holds again.
    fn enforce_bound(&mut self, now_ms: i64) {
        match self.bound {
            BoundMode::Count(max_count) => {
                if self.entries.len() > max_count {
                    if let Some((time_key, _)) = self.entries.pop_first() {
                        trace!(time_key, "evicting oldest entry, count bound reached");
                    }
                }
            }
            BoundMode::Age(max_age_ms) => {
                while let Some((&oldest, _)) = self.entries.first_key_value() {
                    if now_ms - oldest > max_age_ms {
                        trace!(time_key = oldest, "evicting oldest entry, age bound reached");
                        self.entries.remove(&oldest);
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Iterate retained points in ascending time order.
    pub fn iter(&self) -> impl Iterator<Item = (&i64, &TimedPoint)> {
        self.entries.iter()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spatial reference captured from the first accepted point.
    pub fn spatial_reference(&self) -> Option<SpatialReference> {
        self.spatial_reference
    }

    /// The bound mode this cache was constructed with.
    pub fn bound(&self) -> BoundMode {
        self.bound
    }
}
