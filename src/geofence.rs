//! # Geofence Membership
//!
//! Circular geofences around event locations, membership tests, and
//! route-versus-geofence intersection.
//!
//! ## Algorithm
//!
//! Point membership is a haversine distance check against the circle
//! center. Route intersection runs per consecutive segment pair in two
//! steps, in this order:
//!
//! 1. either endpoint inside the circle -> intersects;
//! 2. otherwise project the center onto the segment; if the raw projection
//!    parameter falls outside `[0, 1]` the segment does not pass near the
//!    circle along its interior, else compare the clamped distance against
//!    the radius.
//!
//! The ordering guarantees correctness when the closest point is an
//! endpoint without computing the projection twice.
//!
//! For large geofence sets, [`GeofenceIndex`] pre-filters candidates with an
//! R-tree whose envelopes are the circles' radius-buffered bounding boxes;
//! the exact haversine predicates run only on envelope hits.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::error::{Error, Result};
use crate::geo_utils::{haversine_distance, project_onto_segment};
use crate::traffic::{classify, ImpactLevel};
use crate::{Bounds, EventSite, GeoPoint};

/// A circular region around an event location.
///
/// Owns a 1:1 link to its event and carries the derived traffic impact so
/// downstream consumers never re-classify.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geofence {
    /// Id of the owning event.
    pub event_id: String,
    /// Event title, used verbatim in alert messages.
    pub title: String,
    /// Circle center.
    pub center: GeoPoint,
    /// Circle radius in meters, strictly positive.
    pub radius_m: f64,
    /// Inactive geofences are kept but excluded from matching.
    pub active: bool,
    /// Derived traffic impact level.
    pub impact: ImpactLevel,
    /// Operator-supplied notification text; overrides the generated message.
    pub message: Option<String>,
    /// Event start time, when known. Gates route-relevance filtering.
    pub starts_at: Option<SystemTime>,
}

impl Geofence {
    /// Create a geofence, validating the center and radius.
    pub fn new(
        event_id: impl Into<String>,
        title: impl Into<String>,
        center: GeoPoint,
        radius_m: f64,
        impact: ImpactLevel,
    ) -> Result<Self> {
        if !center.is_valid() {
            return Err(Error::InvalidCoordinate {
                latitude: center.latitude,
                longitude: center.longitude,
            });
        }
        if !(radius_m > 0.0) || !radius_m.is_finite() {
            return Err(Error::InvalidRadius { radius_m });
        }

        Ok(Self {
            event_id: event_id.into(),
            title: title.into(),
            center,
            radius_m,
            active: true,
            impact,
            message: None,
            starts_at: None,
        })
    }

    /// Build a geofence around an event, classifying its traffic impact.
    ///
    /// Returns `None` when the event's coordinates are invalid; such events
    /// are excluded from all geofence computations rather than raised as
    /// errors.
    pub fn for_event(event: &EventSite, radius_m: f64) -> Option<Self> {
        if !event.location.is_valid() {
            debug!(
                "skipping event {} with invalid coordinates ({}, {})",
                event.id, event.location.latitude, event.location.longitude
            );
            return None;
        }

        let impact = classify(event.attendee_count, event.category.as_deref());
        let mut fence = Self::new(&event.id, &event.title, event.location, radius_m, impact).ok()?;
        fence.starts_at = event.starts_at;
        Some(fence)
    }

    /// Whether the owning event is worth a traffic alert around `now`.
    ///
    /// Events with no known start time are always considered relevant;
    /// otherwise the start must lie within `window` of `now` in either
    /// direction (an event that started an hour ago still congests roads).
    pub fn is_relevant_at(&self, now: SystemTime, window: Duration) -> bool {
        match self.starts_at {
            None => true,
            Some(start) => match start.duration_since(now) {
                Ok(until) => until <= window,
                Err(e) => e.duration() <= window,
            },
        }
    }
}

/// True iff `point` lies within the geofence circle.
///
/// Callers are expected to pre-filter to `active` geofences; this predicate
/// looks only at geometry.
#[inline]
pub fn is_inside(point: &GeoPoint, fence: &Geofence) -> bool {
    haversine_distance(point, &fence.center) <= fence.radius_m
}

/// True iff the segment from `start` to `end` intersects the circle.
pub fn segment_intersects_circle(
    start: &GeoPoint,
    end: &GeoPoint,
    center: &GeoPoint,
    radius_m: f64,
) -> bool {
    // Endpoint containment first; covers zero-length segments outright.
    if haversine_distance(start, center) <= radius_m
        || haversine_distance(end, center) <= radius_m
    {
        return true;
    }

    let proj = project_onto_segment(center, start, end);
    if proj.t < 0.0 || proj.t > 1.0 {
        // Closest approach is past an endpoint, and the endpoints are out.
        return false;
    }

    proj.distance_m <= radius_m
}

/// Find the active geofences containing `point`.
///
/// Stable: identical input yields identical output order.
pub fn find_matches<'a>(point: &GeoPoint, geofences: &'a [Geofence]) -> Vec<&'a Geofence> {
    geofences
        .iter()
        .filter(|g| g.active && is_inside(point, g))
        .collect()
}

/// Find the active geofences intersected by a route polyline.
///
/// Tests every consecutive point pair; a geofence appears once even when
/// several segments cross it, in first-hit order.
pub fn find_route_matches<'a>(route: &[GeoPoint], geofences: &'a [Geofence]) -> Vec<&'a Geofence> {
    if route.len() < 2 {
        return Vec::new();
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut matches = Vec::new();

    for fence in geofences.iter().filter(|g| g.active) {
        if seen.contains(fence.event_id.as_str()) {
            continue;
        }
        let hit = route.windows(2).any(|seg| {
            segment_intersects_circle(&seg[0], &seg[1], &fence.center, fence.radius_m)
        });
        if hit {
            seen.insert(fence.event_id.as_str());
            matches.push(fence);
        }
    }

    matches
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of geofences enforcing one geofence per event.
#[derive(Debug, Clone, Default)]
pub struct GeofenceSet {
    fences: HashMap<String, Geofence>,
}

impl GeofenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geofence. Rejected with [`Error::DuplicateGeofence`] when
    /// one already exists for the event.
    pub fn insert(&mut self, fence: Geofence) -> Result<()> {
        match self.fences.entry(fence.event_id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateGeofence {
                event_id: fence.event_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(fence);
                Ok(())
            }
        }
    }

    /// Replace the geofence for an event, keeping the one-per-event shape.
    pub fn update(&mut self, fence: Geofence) -> Result<()> {
        match self.fences.entry(fence.event_id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(fence);
                Ok(())
            }
            Entry::Vacant(_) => Err(Error::UnknownGeofence {
                event_id: fence.event_id,
            }),
        }
    }

    /// Remove and return the geofence for an event.
    pub fn remove(&mut self, event_id: &str) -> Option<Geofence> {
        self.fences.remove(event_id)
    }

    /// Soft-remove: keep the record but exclude it from matching.
    pub fn deactivate(&mut self, event_id: &str) -> Result<()> {
        match self.fences.get_mut(event_id) {
            Some(fence) => {
                fence.active = false;
                Ok(())
            }
            None => Err(Error::UnknownGeofence {
                event_id: event_id.to_string(),
            }),
        }
    }

    pub fn get(&self, event_id: &str) -> Option<&Geofence> {
        self.fences.get(event_id)
    }

    /// Iterate the active geofences, in no particular order.
    pub fn active(&self) -> impl Iterator<Item = &Geofence> {
        self.fences.values().filter(|g| g.active)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

// =============================================================================
// Spatial Index
// =============================================================================

/// R-tree entry: a geofence circle's radius-buffered bounding box.
#[derive(Debug, Clone)]
struct FenceEnvelope {
    /// Index into the owning [`GeofenceIndex`]'s fence vector.
    slot: usize,
    bounds: Bounds,
}

impl RTreeObject for FenceEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Spatially indexed snapshot of active geofences.
///
/// Envelope hits are candidates only; every query re-checks the exact
/// haversine predicate. Linear scans are fine for a handful of fences, the
/// index pays off once a city's worth of events is loaded.
///
/// Envelopes are plain min/max latitude/longitude boxes: a geofence or
/// route segment straddling the ±180° antimeridian gets a degenerate
/// envelope and can be missed by the prefilter. For data in that region use
/// the linear [`find_matches`](crate::geofence::find_matches) /
/// [`find_route_matches`](crate::geofence::find_route_matches), which are
/// exact.
#[derive(Debug, Default)]
pub struct GeofenceIndex {
    fences: Vec<Geofence>,
    tree: RTree<FenceEnvelope>,
}

impl GeofenceIndex {
    /// Build an index over the active subset of `fences`.
    pub fn build(fences: Vec<Geofence>) -> Self {
        let fences: Vec<Geofence> = fences.into_iter().filter(|g| g.active).collect();

        let envelopes: Vec<FenceEnvelope> = fences
            .iter()
            .enumerate()
            .filter_map(|(slot, g)| {
                let bounds = Bounds::from_points(&[g.center])?.expanded(g.radius_m);
                Some(FenceEnvelope { slot, bounds })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
            fences,
        }
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    pub fn fences(&self) -> &[Geofence] {
        &self.fences
    }

    /// Geofences containing `point`. Empty result for a point nowhere near
    /// any fence is the normal case, not an error.
    pub fn find_matches(&self, point: &GeoPoint) -> Vec<&Geofence> {
        let probe = AABB::from_point([point.longitude, point.latitude]);
        let mut hits: Vec<&Geofence> = self
            .tree
            .locate_in_envelope_intersecting(&probe)
            .map(|e| &self.fences[e.slot])
            .filter(|g| is_inside(point, g))
            .collect();
        // Envelope iteration order is arbitrary; sort for stable output.
        hits.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        hits
    }

    /// Geofences intersected by a route polyline, deduplicated by event.
    pub fn find_route_matches(&self, route: &[GeoPoint]) -> Vec<&Geofence> {
        if route.len() < 2 {
            return Vec::new();
        }

        let mut slots: HashSet<usize> = HashSet::new();
        for seg in route.windows(2) {
            let probe = AABB::from_corners(
                [
                    seg[0].longitude.min(seg[1].longitude),
                    seg[0].latitude.min(seg[1].latitude),
                ],
                [
                    seg[0].longitude.max(seg[1].longitude),
                    seg[0].latitude.max(seg[1].latitude),
                ],
            );
            for entry in self.tree.locate_in_envelope_intersecting(&probe) {
                if slots.contains(&entry.slot) {
                    continue;
                }
                let fence = &self.fences[entry.slot];
                if segment_intersects_circle(&seg[0], &seg[1], &fence.center, fence.radius_m) {
                    slots.insert(entry.slot);
                }
            }
        }

        let mut hits: Vec<&Geofence> = slots.into_iter().map(|s| &self.fences[s]).collect();
        hits.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        hits
    }

    /// Parallel route check across the whole fence set.
    ///
    /// Same result as [`find_route_matches`](Self::find_route_matches) minus
    /// the envelope pre-filter; worthwhile when routes are long and fences
    /// are many.
    #[cfg(feature = "parallel")]
    pub fn find_route_matches_parallel(&self, route: &[GeoPoint]) -> Vec<&Geofence> {
        use rayon::prelude::*;

        if route.len() < 2 {
            return Vec::new();
        }

        let mut hits: Vec<&Geofence> = self
            .fences
            .par_iter()
            .filter(|fence| {
                route.windows(2).any(|seg| {
                    segment_intersects_circle(&seg[0], &seg[1], &fence.center, fence.radius_m)
                })
            })
            .collect();
        hits.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        hits
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
