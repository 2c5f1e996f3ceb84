//! Host event model - the wire-visible types carried through the stream.
//!
//! The cache treats these as opaque value types: field extraction happens
//! once, when a [`crate::timed_point::TimedPoint`] is derived, and the
//! original event rides along unchanged as the point's payload.

use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A spatial reference, identified by its well-known id.
///
/// Compared only for identity; no projection math happens anywhere in this
/// crate. A track is assumed never to cross spatial references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// Well-known id (e.g. 4326 for WGS84)
    pub wkid: i32,
}

impl SpatialReference {
    /// WGS84 lat/lon
    pub const WGS84: Self = Self { wkid: 4326 };

    pub fn new(wkid: i32) -> Self {
        Self { wkid }
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::WGS84
    }
}

/// Geometry attached to a stream event: an arbitrary shape plus the
/// spatial reference it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGeometry {
    /// The shape itself (only single points ever enter the cache)
    pub shape: Geometry<f64>,

    /// Spatial reference the coordinates are expressed in
    pub spatial_reference: SpatialReference,
}

impl EventGeometry {
    /// Convenience constructor for a single point shape.
    pub fn point(x: f64, y: f64, spatial_reference: SpatialReference) -> Self {
        Self {
            shape: Geometry::Point(Point::new(x, y)),
            spatial_reference,
        }
    }

    /// Returns the shape as a single point, or `None` for any other
    /// geometry type.
    pub fn as_point(&self) -> Option<Point<f64>> {
        match self.shape {
            Geometry::Point(p) => Some(p),
            _ => None,
        }
    }
}

/// Which event timestamp keys the per-track cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    StartTime,
    EndTime,
    ReceivedTime,
}

/// One timestamped, located event as received from the hosting stream.
///
/// `attributes` is an opaque payload forwarded without inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Unique identifier for this event instance
    pub event_id: Uuid,

    /// Stable identifier of the event type this event conforms to
    pub definition_id: String,

    /// Identifier of the logical track (e.g. a moving object)
    pub track_id: String,

    /// Event start time, epoch milliseconds
    pub start_time: i64,

    /// Event end time, epoch milliseconds
    pub end_time: i64,

    /// Time the event was received by the stream engine, epoch milliseconds
    pub received_time: i64,

    /// Geometry carried by the event, if any
    pub geometry: Option<EventGeometry>,

    /// Opaque attribute payload, carried through unchanged
    #[serde(default)]
    pub attributes: Value,
}

impl StreamEvent {
    /// Timestamp selected by the given field, falling back to the
    /// received time for [`TimeField::ReceivedTime`].
    pub fn time_for(&self, field: TimeField) -> i64 {
        match field {
            TimeField::StartTime => self.start_time,
            TimeField::EndTime => self.end_time,
            TimeField::ReceivedTime => self.received_time,
        }
    }
}
