//! Projection of one stream event into the cache's keyed form.

use geo::Point;
use tracing::trace;

use crate::events::{SpatialReference, StreamEvent, TimeField};

/// Immutable projection of one incoming event into the keys the cache
/// operates on: track key, time key, location key, coordinate.
///
/// Only points with a coordinate (i.e. single-point source geometry) are
/// ever stored; a point with `coordinate == None` is rejected by
/// [`crate::track_cache::TrackCache::insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimedPoint {
    /// Routes the point to its per-track cache: `definition_id + "_" + track_id`
    pub track_key: String,

    /// Ordering and dedup key, epoch milliseconds
    pub time_key: i64,

    /// Canonical `"{x}_{y}"` encoding of the coordinate. `None` when the
    /// source geometry is not a single point; `None` never matches any
    /// other location key, so such a point is exempt from dedup.
    pub location_key: Option<String>,

    /// The point's position, present only for single-point geometry
    pub coordinate: Option<Point<f64>>,

    /// Spatial reference the coordinate is expressed in
    pub spatial_reference: SpatialReference,

    /// The originating event, carried through unchanged
    pub payload: StreamEvent,
}

impl TimedPoint {
    /// Derive a point from an event, keying time by the configured field.
    pub fn from_event(event: &StreamEvent, time_field: TimeField) -> Self {
        let track_key = format!("{}_{}", event.definition_id, event.track_id);
        let time_key = event.time_for(time_field);

        let (coordinate, location_key, spatial_reference) = match &event.geometry {
            Some(geometry) => match geometry.as_point() {
                Some(p) => (
                    Some(p),
                    Some(format!("{}_{}", p.x(), p.y())),
                    geometry.spatial_reference,
                ),
                None => (None, None, geometry.spatial_reference),
            },
            None => (None, None, SpatialReference::default()),
        };

        trace!(
            track_key = %track_key,
            time_key,
            ?location_key,
            "derived timed point from event"
        );

        Self {
            track_key,
            time_key,
            location_key,
            coordinate,
            spatial_reference,
            payload: event.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventGeometry;
    use geo::{Geometry, LineString};
    use serde_json::Value;
    use uuid::Uuid;

    fn event_with_geometry(geometry: Option<EventGeometry>) -> StreamEvent {
        StreamEvent {
            event_id: Uuid::new_v4(),
            definition_id: "def".to_string(),
            track_id: "t1".to_string(),
            start_time: 100,
            end_time: 200,
            received_time: 300,
            geometry,
            attributes: Value::Null,
        }
    }

    #[test]
    fn test_point_geometry_produces_keys() {
        let event = event_with_geometry(Some(EventGeometry::point(
            1.5,
            -2.25,
            SpatialReference::WGS84,
        )));
        let point = TimedPoint::from_event(&event, TimeField::StartTime);

        assert_eq!(point.track_key, "def_t1");
        assert_eq!(point.time_key, 100);
        assert_eq!(point.location_key.as_deref(), Some("1.5_-2.25"));
        assert!(point.coordinate.is_some());
    }

    #[test]
    fn test_non_point_geometry_has_no_location() {
        let event = event_with_geometry(Some(EventGeometry {
            shape: Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])),
            spatial_reference: SpatialReference::WGS84,
        }));
        let point = TimedPoint::from_event(&event, TimeField::ReceivedTime);

        assert_eq!(point.time_key, 300);
        assert!(point.location_key.is_none());
        assert!(point.coordinate.is_none());
    }

    #[test]
    fn test_missing_geometry_has_no_location() {
        let event = event_with_geometry(None);
        let point = TimedPoint::from_event(&event, TimeField::EndTime);

        assert_eq!(point.time_key, 200);
        assert!(point.location_key.is_none());
        assert!(point.coordinate.is_none());
    }
}
