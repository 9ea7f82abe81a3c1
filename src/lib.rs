//! # Geofence Notify
//!
//! Geofence membership, traffic-impact classification and deduplicated
//! proximity alerting around event locations.
//!
//! This library provides:
//! - Great-circle and point-to-segment geographic math
//! - Circular geofence membership and route-vs-geofence intersection
//! - A 1-5 traffic-impact classifier driven by attendance and category
//! - Cooldown-based notification deduplication with top-N emission
//! - A location watch loop feeding the pipeline from a position stream
//!
//! ## Features
//!
//! - **`serde`** - serde derives on all public data types
//! - **`parallel`** - parallel batch route checking with rayon
//! - **`full`** - enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use geofence_notify::{
//!     EventSite, GeoPoint, GeofenceIndex, Geofence, Notifier, WatchConfig,
//! };
//! use std::time::SystemTime;
//!
//! let event = EventSite {
//!     id: "marathon".into(),
//!     title: "City Marathon".into(),
//!     category: Some("Sports".into()),
//!     attendee_count: 350,
//!     location: GeoPoint::new(28.6139, 77.2090),
//!     starts_at: None,
//! };
//!
//! let fences: Vec<Geofence> = [event]
//!     .iter()
//!     .filter_map(|e| Geofence::for_event(e, 5000.0))
//!     .collect();
//! let index = GeofenceIndex::build(fences);
//!
//! let mut notifier = Notifier::new(WatchConfig::default());
//! let here = GeoPoint::new(28.6200, 77.2000);
//! let alerts = notifier.check_and_emit(&here, None, &index, SystemTime::now());
//!
//! assert_eq!(alerts.len(), 1);
//! println!("{}: {}", alerts[0].title, alerts[0].message);
//! ```

use std::time::{Duration, SystemTime};

pub mod error;
pub mod geo_utils;
pub mod geofence;
pub mod notify;
pub mod traffic;
pub mod watch;

pub use error::{Error, Result};
pub use geofence::{
    find_matches, find_route_matches, is_inside, segment_intersects_circle, Geofence,
    GeofenceIndex, GeofenceSet,
};
pub use notify::{
    Alert, AlertAction, CooldownTracker, InMemoryNotificationStore, NotificationKind,
    NotificationRecord, NotificationStore, Notifier,
};
pub use traffic::{assess_route, classify, CoarseImpact, ImpactLevel, RouteAssessment};
pub use watch::{AlertSink, LocationWatcher, PositionSource, WatchOutcome};

// ============================================================================
// Core Types
// ============================================================================

/// A coordinate with latitude and longitude, in degrees.
///
/// # Example
/// ```
/// use geofence_notify::GeoPoint;
/// let point = GeoPoint::new(28.6139, 77.2090); // New Delhi
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box over latitude/longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Expand every side by `meters`, converted to degrees at the box's
    /// mean latitude.
    pub fn expanded(&self, meters: f64) -> Self {
        let mid_lat = (self.min_lat + self.max_lat) / 2.0;
        let buffer = geo_utils::meters_to_degrees(meters, mid_lat);
        Self {
            min_lat: self.min_lat - buffer,
            max_lat: self.max_lat + buffer,
            min_lng: self.min_lng - buffer,
            max_lng: self.max_lng + buffer,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One device position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub point: GeoPoint,
    pub timestamp: SystemTime,
}

impl Position {
    pub fn new(point: GeoPoint, timestamp: SystemTime) -> Self {
        Self { point, timestamp }
    }
}

/// User-set destination; its presence gates route/traffic checks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Destination {
    pub point: GeoPoint,
    pub label: String,
}

impl Destination {
    pub fn new(point: GeoPoint, label: impl Into<String>) -> Self {
        Self { point, label: label.into() }
    }
}

/// The read-only view this library takes of an externally-owned event.
///
/// Created and persisted elsewhere; the core only reads location,
/// attendance, category and start time. An event with invalid coordinates
/// is excluded from all geofence computations.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventSite {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub attendee_count: u32,
    pub location: GeoPoint,
    /// Start time, when known; gates route-relevance filtering.
    pub starts_at: Option<SystemTime>,
}

/// Configuration for the watch loop and notification cooldowns.
///
/// Cooldown windows are configuration rather than constants; the defaults
/// match the product behavior the library replaces.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchConfig {
    /// Geofence radius used when building fences straight from events.
    /// Default: 5,000 m.
    pub default_radius_m: f64,

    /// Minimum time between repeated "event nearby" notifications for the
    /// same event. Default: 24 hours.
    pub geofence_entry_cooldown: Duration,

    /// Minimum time between repeated traffic alerts for the same event.
    /// Tracked independently of geofence entries. Default: 2 hours.
    pub traffic_alert_cooldown: Duration,

    /// Minimum time between route/traffic rechecks while a destination is
    /// set. Default: 5 minutes.
    pub route_recheck_interval: Duration,

    /// How close to now an event's start must be for it to count toward a
    /// traffic alert. Events without a known start always count.
    /// Default: 48 hours.
    pub upcoming_window: Duration,

    /// Maximum number of matches folded into one traffic alert.
    /// Default: 3.
    pub max_traffic_alerts: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            default_radius_m: 5_000.0,
            geofence_entry_cooldown: Duration::from_secs(24 * 60 * 60),
            traffic_alert_cooldown: Duration::from_secs(2 * 60 * 60),
            route_recheck_interval: Duration::from_secs(5 * 60),
            upcoming_window: Duration::from_secs(48 * 60 * 60),
            max_traffic_alerts: 3,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
