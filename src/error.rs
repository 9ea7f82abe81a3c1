//! Error taxonomy for geofence construction, position sourcing and
//! notification record keeping.
//!
//! Math and classification functions are total for well-formed coordinates
//! and never return an error; malformed coordinates are filtered once, at
//! the point where events enter the system.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Latitude/longitude out of range or non-finite. Events and geofences
    /// carrying such coordinates are excluded from the active set.
    #[error("invalid coordinate: lat={latitude}, lng={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Geofence radius must be strictly positive.
    #[error("invalid geofence radius: {radius_m}m")]
    InvalidRadius { radius_m: f64 },

    /// One geofence per event; a second registration is rejected.
    #[error("geofence already exists for event {event_id}")]
    DuplicateGeofence { event_id: String },

    /// No geofence registered under the given event id.
    #[error("no geofence registered for event {event_id}")]
    UnknownGeofence { event_id: String },

    /// The position source could not produce a fix. Recoverable: the watch
    /// loop reports it and retries on the next update.
    #[error("location unavailable: {reason}")]
    LocationUnavailable { reason: String },

    /// The notification record store failed a read or write. Deduplication
    /// degrades to in-memory state rather than blocking alert delivery.
    #[error("notification store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;
