//! Trackline Core - per-track trajectory assembly for located event streams
//!
//! This library turns a stream of timestamped, located events into
//! per-track polyline trajectories:
//! 1. **TimedPoint**: each event is projected into (track key, time key,
//!    location key, coordinate)
//! 2. **TrackCache**: an ordered, bounded history per track - eviction by
//!    count or age, stationary runs collapsed to their newest point
//! 3. **TrajectoryBuilder**: a windowed pass over the retained points
//!    producing a connected path
//! 4. **TrackRegistry**: a FIFO-bounded arena of track caches
//!
//! The [`processor::StreamProcessor`] ties these together for the host.

pub mod clock;
pub mod events;
pub mod processor;
pub mod registry;
pub mod timed_point;
pub mod track_cache;
pub mod trajectory;

// Re-export key types for convenience
pub use events::{EventGeometry, SpatialReference, StreamEvent, TimeField};
pub use processor::{ConfigError, ProcessorConfig, StreamProcessor, TimeUnit};
pub use registry::{TrackRegistry, DEFAULT_TRACK_CEILING};
pub use timed_point::TimedPoint;
pub use track_cache::{BoundMode, CacheError, TrackCache};
pub use trajectory::{Trajectory, TrajectoryWindow};
