//! Trajectory assembly - a windowed, read-only pass over a track cache.
//!
//! Connects a track's retained points, oldest to newest, into a single
//! polyline path. The window is either a time range (every retained point
//! inside the range, computed against "now" at query time) or a segment
//! count.

use geo::{coord, Coord, LineString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::clock::now_millis;
use crate::events::SpatialReference;
use crate::track_cache::TrackCache;

/// Window over the cache contents used when assembling the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryWindow {
    /// At most this many segments
    Count(usize),
    /// Points at most this many milliseconds old
    Time(i64),
}

/// An ordered path connecting a track's retained positions, expressed in
/// the spatial reference the cache captured from its first point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub path: LineString<f64>,
    pub spatial_reference: SpatialReference,
}

#[derive(Debug, Clone, Error)]
enum TrajectoryError {
    /// A retained entry without a coordinate; insert should make this
    /// unreachable
    #[error("entry at {0} has no coordinate")]
    MissingCoordinate(i64),
}

/// Build a trajectory over the cache's current contents, or `None` when
/// fewer than two points fall inside the window.
///
/// Any failure during path assembly is logged and degrades to `None`; it
/// never aborts the enclosing stream step.
pub fn build(cache: &TrackCache, window: TrajectoryWindow) -> Option<Trajectory> {
    build_at(cache, window, now_millis())
}

fn build_at(cache: &TrackCache, window: TrajectoryWindow, now_ms: i64) -> Option<Trajectory> {
    if cache.is_empty() {
        return None;
    }

    // Count mode reuses the time pass with the range set to "now": the
    // cutoff lands at roughly epoch zero, leaving the segment cap as the
    // only effective limiter. Deliberately kept, downstream consumers
    // depend on a count-windowed trajectory covering all retained points.
    let (range_ms, segment_cap) = match window {
        TrajectoryWindow::Time(range_ms) => {
            trace!(range_ms, "building trajectory for time window");
            (range_ms, cache.len() as i64 + 1)
        }
        TrajectoryWindow::Count(limit) => {
            trace!(limit, "building trajectory for count window");
            (now_ms, limit as i64)
        }
    };
    let cutoff = now_ms - range_ms;

    match assemble(cache, cutoff, segment_cap) {
        Ok(trajectory) => trajectory,
        Err(e) => {
            warn!(error = %e, "failed to assemble trajectory");
            None
        }
    }
}

fn assemble(
    cache: &TrackCache,
    cutoff: i64,
    segment_cap: i64,
) -> Result<Option<Trajectory>, TrajectoryError> {
    let mut coords: Vec<Coord<f64>> = Vec::new();

    for (&time_key, point) in cache.iter() {
        if time_key < cutoff {
            continue;
        }
        if !coords.is_empty() && coords.len() as i64 - 1 >= segment_cap {
            break;
        }
        let p = point
            .coordinate
            .ok_or(TrajectoryError::MissingCoordinate(time_key))?;
        coords.push(coord! { x: p.x(), y: p.y() });
    }

    // A path needs at least one segment.
    if coords.len() < 2 {
        return Ok(None);
    }

    Ok(Some(Trajectory {
        path: LineString::new(coords),
        spatial_reference: cache.spatial_reference().unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventGeometry, StreamEvent, TimeField};
    use crate::timed_point::TimedPoint;
    use approx::assert_relative_eq;
    use serde_json::Value;
    use uuid::Uuid;

    fn point_at(time_key: i64, x: f64, y: f64) -> TimedPoint {
        let event = StreamEvent {
            event_id: Uuid::new_v4(),
            definition_id: "def".to_string(),
            track_id: "t1".to_string(),
            start_time: time_key,
            end_time: time_key,
            received_time: time_key,
            geometry: Some(EventGeometry::point(x, y, SpatialReference::WGS84)),
            attributes: Value::Null,
        };
        TimedPoint::from_event(&event, TimeField::StartTime)
    }

    fn cache_with(points: &[(i64, f64, f64)]) -> TrackCache {
        let mut cache = TrackCache::with_count(100).unwrap();
        for &(t, x, y) in points {
            cache.insert(point_at(t, x, y)).unwrap();
        }
        cache
    }

    #[test]
    fn test_empty_cache_yields_none() {
        let cache = TrackCache::with_count(10).unwrap();
        assert!(build(&cache, TrajectoryWindow::Count(5)).is_none());
    }

    #[test]
    fn test_single_point_yields_none() {
        let cache = cache_with(&[(1_000, 0.0, 0.0)]);
        assert!(build(&cache, TrajectoryWindow::Count(5)).is_none());
        assert!(build(&cache, TrajectoryWindow::Time(i64::MAX / 2)).is_none());
    }

    #[test]
    fn test_count_window_connects_all_retained_points() {
        let cache = cache_with(&[(1, 0.0, 0.0), (2, 1.0, 0.0), (3, 2.0, 1.0)]);
        let trajectory = build(&cache, TrajectoryWindow::Count(10)).unwrap();

        let coords: Vec<_> = trajectory.path.coords().collect();
        assert_eq!(coords.len(), 3);
        assert_relative_eq!(coords[0].x, 0.0);
        assert_relative_eq!(coords[2].x, 2.0);
        assert_relative_eq!(coords[2].y, 1.0);
        assert_eq!(trajectory.spatial_reference, SpatialReference::WGS84);
    }

    #[test]
    fn test_count_window_ignores_point_age() {
        // Epoch-adjacent time keys are far outside any wall-clock range,
        // yet a count window still includes them.
        let cache = cache_with(&[(1, 0.0, 0.0), (2, 1.0, 1.0)]);
        let trajectory = build(&cache, TrajectoryWindow::Count(5));
        assert!(trajectory.is_some());
    }

    #[test]
    fn test_count_window_caps_segments() {
        let cache = cache_with(&[
            (1, 0.0, 0.0),
            (2, 1.0, 0.0),
            (3, 2.0, 0.0),
            (4, 3.0, 0.0),
            (5, 4.0, 0.0),
        ]);
        let trajectory = build(&cache, TrajectoryWindow::Count(2)).unwrap();

        // Two segments = three points, oldest first.
        let coords: Vec<_> = trajectory.path.coords().collect();
        assert_eq!(coords.len(), 3);
        assert_relative_eq!(coords[0].x, 0.0);
        assert_relative_eq!(coords[2].x, 2.0);
    }

    #[test]
    fn test_time_window_excludes_points_before_cutoff() {
        let now = 1_000_000;
        let mut cache = TrackCache::with_count(100).unwrap();
        for &(t, x) in &[(now - 10_000, 0.0), (now - 400, 1.0), (now - 100, 2.0)] {
            cache.insert(point_at(t, x, 0.0)).unwrap();
        }

        let trajectory = build_at(&cache, TrajectoryWindow::Time(500), now).unwrap();
        let coords: Vec<_> = trajectory.path.coords().collect();
        assert_eq!(coords.len(), 2);
        assert_relative_eq!(coords[0].x, 1.0);
        assert_relative_eq!(coords[1].x, 2.0);
    }

    #[test]
    fn test_time_window_with_one_eligible_point_yields_none() {
        let now = 1_000_000;
        let mut cache = TrackCache::with_count(100).unwrap();
        cache.insert(point_at(now - 10_000, 0.0, 0.0)).unwrap();
        cache.insert(point_at(now - 100, 1.0, 0.0)).unwrap();

        assert!(build_at(&cache, TrajectoryWindow::Time(500), now).is_none());
    }

    #[test]
    fn test_trajectory_uses_captured_spatial_reference() {
        let mut cache = TrackCache::with_count(10).unwrap();
        let mut first = point_at(1, 0.0, 0.0);
        first.spatial_reference = SpatialReference::new(3857);
        cache.insert(first).unwrap();
        cache.insert(point_at(2, 1.0, 1.0)).unwrap();

        let trajectory = build(&cache, TrajectoryWindow::Count(5)).unwrap();
        assert_eq!(trajectory.spatial_reference, SpatialReference::new(3857));
    }

    #[test]
    fn test_trajectory_json_round_trip() {
        let cache = cache_with(&[(1, 0.0, 0.0), (2, 1.0, 1.0)]);
        let trajectory = build(&cache, TrajectoryWindow::Count(5)).unwrap();

        let json = serde_json::to_string(&trajectory).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trajectory);
    }
}
