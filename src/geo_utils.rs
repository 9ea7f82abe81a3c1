//! # Geographic Math
//!
//! Core geographic computation used by geofence membership and route
//! intersection testing.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`project_onto_segment`] | Project a point onto a segment, with raw parameter |
//! | [`distance_to_segment`] | Shortest distance from a point to a segment |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Great-circle distance on a spherical Earth, delegated to the `geo` crate
//! so a single Earth-radius constant is used everywhere in this library.
//! Accurate to within 0.3% for practical geofence radii, and safe near
//! zero-length and antipodal inputs (the inverse-trig argument is clamped
//! internally, so rounding error never produces NaN).
//!
//! ### Segment Projection
//!
//! [`project_onto_segment`] works on an equirectangular plane: longitudes
//! are scaled by the cosine of the mean latitude to offset meridian
//! convergence. Valid for the short segments a route check deals with; not
//! geodesically exact. The returned distance is measured by haversine from
//! the point to the closest point on the segment, with the projection
//! parameter clamped to `[0, 1]` so the closest point never extrapolates
//! beyond the endpoints.
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use crate::GeoPoint;
use geo::{Distance, Haversine, Point};

/// Calculate the great-circle distance between two points in meters.
///
/// Symmetric, and exactly zero for identical points.
///
/// # Example
///
/// ```rust
/// use geofence_notify::{geo_utils, GeoPoint};
///
/// let connaught_place = GeoPoint::new(28.6315, 77.2167);
/// let india_gate = GeoPoint::new(28.6129, 77.2295);
///
/// let distance = geo_utils::haversine_distance(&connaught_place, &india_gate);
/// assert!(distance > 2000.0 && distance < 3000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Result of projecting a point onto a line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Raw projection parameter. `0` maps to the segment start, `1` to the
    /// end; values outside `[0, 1]` mean the perpendicular foot falls past
    /// an endpoint.
    pub t: f64,
    /// Haversine distance in meters to the closest point on the segment
    /// (projection parameter clamped to `[0, 1]`).
    pub distance_m: f64,
}

/// Project `point` onto the segment from `start` to `end`.
///
/// Uses the equirectangular approximation described in the module docs.
/// A zero-length segment yields `t = 0` and the point-to-point haversine
/// distance to `start`.
pub fn project_onto_segment(point: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> SegmentProjection {
    // Planar offsets in degree space, longitude corrected for latitude.
    let px = (point.longitude - start.longitude)
        * ((point.latitude + start.latitude) / 2.0).to_radians().cos();
    let py = point.latitude - start.latitude;

    let dx = (end.longitude - start.longitude)
        * ((end.latitude + start.latitude) / 2.0).to_radians().cos();
    let dy = end.latitude - start.latitude;

    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return SegmentProjection {
            t: 0.0,
            distance_m: haversine_distance(point, start),
        };
    }

    let t = (px * dx + py * dy) / len_sq;
    let clamped = t.clamp(0.0, 1.0);

    let closest = GeoPoint::new(
        start.latitude + clamped * (end.latitude - start.latitude),
        start.longitude + clamped * (end.longitude - start.longitude),
    );

    SegmentProjection {
        t,
        distance_m: haversine_distance(point, &closest),
    }
}

/// Shortest distance in meters from `point` to the segment between `start`
/// and `end`, clamped to the segment endpoints.
#[inline]
pub fn distance_to_segment(point: &GeoPoint, start: &GeoPoint, end: &GeoPoint) -> f64 {
    project_onto_segment(point, start, end).distance_m
}

/// Convert meters to approximate degrees at a given latitude.
///
/// At the equator 1 degree is about 111,320 meters; the figure shrinks with
/// cos(latitude) for longitude. Returns a single conservative value suitable
/// for bounding-box buffers around a search area.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Unit Tests
// =============================================================================
