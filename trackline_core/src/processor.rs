//! Stream-facing orchestrator: one event in, at most one trajectory
//! event out.
//!
//! Derives a [`TimedPoint`] from each event, routes it to the right cache
//! through the registry, and attaches the built trajectory to a copy of the
//! original event. Every failure along the way degrades to "no output for
//! this event"; nothing here is fatal to the host.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::events::{EventGeometry, StreamEvent, TimeField};
use crate::registry::{TrackRegistry, DEFAULT_TRACK_CEILING};
use crate::timed_point::TimedPoint;
use crate::track_cache::{BoundMode, CacheError};
use crate::trajectory::{self, TrajectoryWindow};

/// Unit of the configured window value in time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert a value in this unit to milliseconds.
    pub fn to_millis(self, value: i64) -> i64 {
        match self {
            TimeUnit::Millis => value,
            TimeUnit::Seconds => value * 1_000,
            TimeUnit::Minutes => value * 60_000,
            TimeUnit::Hours => value * 3_600_000,
            TimeUnit::Days => value * 86_400_000,
        }
    }
}

/// Host-provided configuration for a [`StreamProcessor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Count window when true, time window otherwise
    pub count_window: bool,

    /// Count limit or time span magnitude, depending on `count_window`
    pub window_value: i64,

    /// Unit of `window_value` in time mode
    pub window_unit: TimeUnit,

    /// Which event timestamp keys the cache
    pub time_field: TimeField,

    /// Maximum number of tracks held at once
    pub track_ceiling: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            count_window: false,
            window_value: 5,
            window_unit: TimeUnit::Seconds,
            time_field: TimeField::StartTime,
            track_ceiling: DEFAULT_TRACK_CEILING,
        }
    }
}

/// Configuration errors raised at processor construction.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("window value must be positive, got {0}")]
    InvalidWindow(i64),
}

/// Processes a stream of events one at a time, emitting a trajectory event
/// whenever a track's history yields a path.
///
/// `process` takes `&self`; the hosting engine may dispatch events for
/// different tracks from multiple worker threads.
pub struct StreamProcessor {
    registry: TrackRegistry,
    bound: BoundMode,
    window: TrajectoryWindow,
    time_field: TimeField,
}

impl StreamProcessor {
    /// Build a processor, refusing a non-positive window value.
    pub fn new(config: ProcessorConfig) -> Result<Self, ConfigError> {
        if config.window_value <= 0 {
            return Err(ConfigError::InvalidWindow(config.window_value));
        }

        let (bound, window) = if config.count_window {
            let limit = config.window_value as usize;
            (BoundMode::Count(limit), TrajectoryWindow::Count(limit))
        } else {
            let range_ms = config.window_unit.to_millis(config.window_value);
            (BoundMode::Age(range_ms), TrajectoryWindow::Time(range_ms))
        };

        Ok(Self {
            registry: TrackRegistry::new(config.track_ceiling),
            bound,
            window,
            time_field: config.time_field,
        })
    }

    /// Process one event.
    ///
    /// Returns a copy of the event carrying the built trajectory as its
    /// geometry, or `None` when the event was rejected or the track's
    /// history does not yet yield a path.
    pub fn process(&self, event: &StreamEvent) -> Option<StreamEvent> {
        let point = TimedPoint::from_event(event, self.time_field);
        let track_key = point.track_key.clone();

        let cache = match self.registry.get_or_create(&track_key, self.bound) {
            Ok(cache) => cache,
            Err(e) => {
                debug!(track_key = %track_key, error = %e, "could not create track cache");
                return None;
            }
        };

        let mut cache = cache.lock().unwrap();
        match cache.insert(point) {
            Ok(_) => {}
            Err(CacheError::UnsupportedGeometry) => {
                debug!(track_key = %track_key, "dropped event, geometry is not a single point");
                return None;
            }
            Err(e) => {
                debug!(track_key = %track_key, error = %e, "insert failed");
                return None;
            }
        }

        if cache.len() < 2 {
            debug!(track_key = %track_key, "only one point in history, no trajectory yet");
            return None;
        }

        let trajectory = trajectory::build(&cache, self.window)?;
        trace!(
            track_key = %track_key,
            points = trajectory.path.0.len(),
            "emitting trajectory event"
        );

        let mut out = event.clone();
        out.geometry = Some(EventGeometry {
            shape: geo::Geometry::LineString(trajectory.path),
            spatial_reference: trajectory.spatial_reference,
        });
        Some(out)
    }

    /// Administrative reset: drop every track immediately.
    pub fn clear_tracks(&self) {
        self.registry.clear();
    }

    /// The registry backing this processor.
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }
}
