//! # Notification Deduplication & Emission
//!
//! Turns geofence matches into user-facing alerts while suppressing
//! repeats. Each notification kind has an independent cooldown window,
//! tracked per event: a proximity alert fired for an event stays quiet for
//! the geofence-entry window, a traffic alert for the traffic-alert window.
//! Cooldown expiry is lazy, checked by timestamp comparison at lookup time;
//! no background sweep runs.
//!
//! Alerts are structured content only (title, message, severity, related
//! event, action hints). Rendering is the host's job.
//!
//! Server-side deployments can plug a [`NotificationStore`] in to persist
//! cooldown records per user. A store failure degrades deduplication to
//! in-memory state instead of blocking a timely alert; a duplicate slipping
//! through a race is tolerable, a dropped alert is not.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};

use crate::error::Result;
use crate::geo_utils::haversine_distance;
use crate::geofence::{Geofence, GeofenceIndex};
use crate::traffic::ImpactLevel;
use crate::{Destination, GeoPoint, WatchConfig};

/// The two independently cooled-down notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationKind {
    /// The user's position entered an event geofence.
    GeofenceEntry,
    /// The user's planned route crosses an event geofence.
    TrafficAlert,
}

impl NotificationKind {
    /// Cooldown window for this kind.
    pub fn cooldown(self, config: &WatchConfig) -> Duration {
        match self {
            NotificationKind::GeofenceEntry => config.geofence_entry_cooldown,
            NotificationKind::TrafficAlert => config.traffic_alert_cooldown,
        }
    }
}

/// Structured action hint attached to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlertAction {
    /// Open the related event's detail view.
    ViewEvent,
    /// Offer routing around the congestion.
    FindAlternateRoute,
}

/// A user-facing notification, free of markup.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alert {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub severity: ImpactLevel,
    /// Id of the event the alert is about; for aggregate traffic alerts,
    /// the highest-impact one.
    pub related_event_id: String,
    pub actions: Vec<AlertAction>,
}

/// Persisted cooldown record, keyed by (user, event, kind).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationRecord {
    pub user_id: String,
    pub event_id: String,
    pub kind: NotificationKind,
    pub notified_at: SystemTime,
}

/// Record store used for server-side cooldown checks.
///
/// Read-committed visibility is sufficient: a duplicate notification under a
/// racing write is advisory noise, not a correctness problem.
pub trait NotificationStore {
    /// Most recent record for (user, event, kind) at or after `since`.
    fn find_recent(
        &self,
        user_id: &str,
        event_id: &str,
        kind: NotificationKind,
        since: SystemTime,
    ) -> Result<Option<NotificationRecord>>;

    /// Append a record.
    fn insert(&mut self, record: NotificationRecord) -> Result<()>;
}

/// Vec-backed [`NotificationStore`] for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    records: Vec<NotificationRecord>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn find_recent(
        &self,
        user_id: &str,
        event_id: &str,
        kind: NotificationKind,
        since: SystemTime,
    ) -> Result<Option<NotificationRecord>> {
        Ok(self
            .records
            .iter()
            .rev()
            .find(|r| {
                r.user_id == user_id
                    && r.event_id == event_id
                    && r.kind == kind
                    && r.notified_at >= since
            })
            .cloned())
    }

    fn insert(&mut self, record: NotificationRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

// =============================================================================
// Cooldown tracking
// =============================================================================

/// In-memory (kind, event) -> last-notified map with lazy expiry.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    notified: HashMap<(NotificationKind, String), SystemTime>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether (kind, event) was notified within `window` of `now`.
    pub fn in_cooldown(
        &self,
        kind: NotificationKind,
        event_id: &str,
        now: SystemTime,
        window: Duration,
    ) -> bool {
        match self.notified.get(&(kind, event_id.to_string())) {
            Some(at) => now.duration_since(*at).map_or(true, |age| age <= window),
            None => false,
        }
    }

    /// Record a notification at `now`, replacing any expired entry.
    pub fn mark(&mut self, kind: NotificationKind, event_id: &str, now: SystemTime) {
        self.notified.insert((kind, event_id.to_string()), now);
    }

    /// Mark only if outside the cooldown; returns whether the caller may
    /// notify.
    pub fn try_begin(
        &mut self,
        kind: NotificationKind,
        event_id: &str,
        now: SystemTime,
        window: Duration,
    ) -> bool {
        if self.in_cooldown(kind, event_id, now, window) {
            return false;
        }
        self.mark(kind, event_id, now);
        true
    }

    /// Forget everything; the next match of any kind notifies again.
    pub fn clear(&mut self) {
        self.notified.clear();
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Deduplicating alert emitter for a single user.
///
/// Holds the two cooldown sets and the route-recheck timestamp. All methods
/// take `now` explicitly; the watch loop passes wall-clock time.
pub struct Notifier {
    config: WatchConfig,
    tracker: CooldownTracker,
    last_route_check: Option<SystemTime>,
    /// Optional persisted record keeping; `user_id` scopes the records.
    store: Option<(String, Box<dyn NotificationStore>)>,
}

impl Notifier {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            tracker: CooldownTracker::new(),
            last_route_check: None,
            store: None,
        }
    }

    /// Attach a persisted record store scoped to `user_id`.
    pub fn with_store(mut self, user_id: impl Into<String>, store: Box<dyn NotificationStore>) -> Self {
        self.store = Some((user_id.into(), store));
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Drop all session dedup state.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.last_route_check = None;
    }

    /// Run one full matching cycle: proximity alerts for the current
    /// position, and traffic alerts for the straight-line route when a
    /// destination is set and the route-recheck gate has elapsed.
    ///
    /// Returns the alerts actually emitted after deduplication; an empty
    /// list is the normal quiet result.
    pub fn check_and_emit(
        &mut self,
        point: &GeoPoint,
        destination: Option<&Destination>,
        index: &GeofenceIndex,
        now: SystemTime,
    ) -> Vec<Alert> {
        let mut alerts = self.check_proximity(point, index, now);

        if let Some(dest) = destination {
            if self.route_check_due(now) {
                alerts.extend(self.check_route_now(point, dest, index, now));
            }
        }

        alerts
    }

    /// Proximity pass: one alert per newly-entered geofence.
    pub fn check_proximity(
        &mut self,
        point: &GeoPoint,
        index: &GeofenceIndex,
        now: SystemTime,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for fence in index.find_matches(point) {
            if !self.may_notify(NotificationKind::GeofenceEntry, &fence.event_id, now) {
                continue;
            }
            let distance = haversine_distance(point, &fence.center);
            info!(
                "geofence entry: event {} at {:.0}m",
                fence.event_id, distance
            );
            alerts.push(proximity_alert(fence, distance));
        }

        alerts
    }

    /// Whether the periodic route recheck is due at `now`.
    pub fn route_check_due(&self, now: SystemTime) -> bool {
        match self.last_route_check {
            None => true,
            Some(at) => now
                .duration_since(at)
                .map_or(true, |age| age > self.config.route_recheck_interval),
        }
    }

    /// Route pass, bypassing the recheck gate (used when a destination is
    /// first set). Resets the gate timestamp either way.
    pub fn check_route_now(
        &mut self,
        point: &GeoPoint,
        destination: &Destination,
        index: &GeofenceIndex,
        now: SystemTime,
    ) -> Vec<Alert> {
        self.last_route_check = Some(now);

        let route = [*point, destination.point];
        let matches = index.find_route_matches(&route);
        if matches.is_empty() {
            return Vec::new();
        }

        // Candidates: relevant soon, and not inside the traffic cooldown.
        let window = NotificationKind::TrafficAlert.cooldown(&self.config);
        let mut candidates: Vec<&Geofence> = matches
            .into_iter()
            .filter(|g| g.is_relevant_at(now, self.config.upcoming_window))
            .filter(|g| {
                !self.tracker.in_cooldown(
                    NotificationKind::TrafficAlert,
                    &g.event_id,
                    now,
                    window,
                ) && !self.recently_stored(NotificationKind::TrafficAlert, &g.event_id, now)
            })
            .collect();

        if candidates.is_empty() {
            return Vec::new();
        }

        // Highest impact first; stable sort keeps input order for ties.
        candidates.sort_by(|a, b| b.impact.cmp(&a.impact));
        candidates.truncate(self.config.max_traffic_alerts);

        for fence in &candidates {
            self.tracker
                .mark(NotificationKind::TrafficAlert, &fence.event_id, now);
            self.persist(NotificationKind::TrafficAlert, &fence.event_id, now);
        }

        info!(
            "traffic alert: {} impacted event(s), worst {}",
            candidates.len(),
            candidates[0].impact.label()
        );
        vec![traffic_alert(&candidates)]
    }

    /// Full dedup decision for one (kind, event): in-memory cooldown, then
    /// the persisted record if a store is attached, then mark + persist.
    fn may_notify(&mut self, kind: NotificationKind, event_id: &str, now: SystemTime) -> bool {
        let window = kind.cooldown(&self.config);
        if self.tracker.in_cooldown(kind, event_id, now, window) {
            return false;
        }
        if self.recently_stored(kind, event_id, now) {
            // Sync the session tracker so the store isn't re-queried every
            // cycle for the same event.
            self.tracker.mark(kind, event_id, now);
            return false;
        }

        self.tracker.mark(kind, event_id, now);
        self.persist(kind, event_id, now);
        true
    }

    fn recently_stored(&self, kind: NotificationKind, event_id: &str, now: SystemTime) -> bool {
        let Some((user_id, store)) = &self.store else {
            return false;
        };
        let since = now
            .checked_sub(kind.cooldown(&self.config))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match store.find_recent(user_id, event_id, kind, since) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!("notification store read failed ({err}); using in-memory dedup only");
                false
            }
        }
    }

    fn persist(&mut self, kind: NotificationKind, event_id: &str, now: SystemTime) {
        let Some((user_id, store)) = &mut self.store else {
            return;
        };
        let record = NotificationRecord {
            user_id: user_id.clone(),
            event_id: event_id.to_string(),
            kind,
            notified_at: now,
        };
        if let Err(err) = store.insert(record) {
            warn!("notification store write failed ({err}); record kept in memory only");
        } else {
            debug!("stored {kind:?} record for event {event_id}");
        }
    }
}

// =============================================================================
// Alert construction
// =============================================================================

/// Build the alert for a single geofence entry.
fn proximity_alert(fence: &Geofence, distance_m: f64) -> Alert {
    let message = fence.message.clone().unwrap_or_else(|| {
        format!(
            "{} is happening {:.1}km from your location.",
            fence.title,
            distance_m / 1000.0
        )
    });

    Alert {
        kind: NotificationKind::GeofenceEntry,
        title: "Event Nearby".to_string(),
        message,
        severity: fence.impact,
        related_event_id: fence.event_id.clone(),
        actions: vec![AlertAction::ViewEvent],
    }
}

/// Build one aggregate traffic alert from the top-impact matches.
///
/// Names the highest-impact event and counts the rest, the `main` entry's
/// level giving the severity and the impact wording.
fn traffic_alert(top: &[&Geofence]) -> Alert {
    let main = top[0];
    let label = main.impact.label();

    let message = match top.len() {
        1 => format!("{} may cause {} traffic on your route.", main.title, label),
        2 => format!(
            "{} and 1 other event may cause {} traffic on your route.",
            main.title, label
        ),
        n => format!(
            "{} and {} other events may cause {} traffic on your route.",
            main.title,
            n - 1,
            label
        ),
    };

    Alert {
        kind: NotificationKind::TrafficAlert,
        title: "Traffic Alert".to_string(),
        message,
        severity: main.impact,
        related_event_id: main.event_id.clone(),
        actions: vec![AlertAction::ViewEvent, AlertAction::FindAlternateRoute],
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::traffic::ImpactLevel;

    const T0: SystemTime = SystemTime::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        T0 + Duration::from_secs(secs)
    }

    fn fence(id: &str, lat: f64, lng: f64, radius_m: f64, impact: ImpactLevel) -> Geofence {
        Geofence::new(
            id,
            format!("{id} event"),
            GeoPoint::new(lat, lng),
            radius_m,
            impact,
        )
        .unwrap()
    }

    fn delhi_index() -> GeofenceIndex {
        GeofenceIndex::build(vec![fence("e1", 28.6139, 77.2090, 5000.0, ImpactLevel::Moderate)])
    }

    fn user() -> GeoPoint {
        GeoPoint::new(28.6200, 77.2000)
    }

    #[test]
    fn test_cooldown_tracker_windows() {
        let mut tracker = CooldownTracker::new();
        let window = Duration::from_secs(3600);

        assert!(tracker.try_begin(NotificationKind::GeofenceEntry, "e1", at(0), window));
        assert!(!tracker.try_begin(NotificationKind::GeofenceEntry, "e1", at(100), window));
        // Other kind is tracked independently.
        assert!(tracker.try_begin(NotificationKind::TrafficAlert, "e1", at(100), window));
        // Lazy expiry after the window.
        assert!(tracker.try_begin(NotificationKind::GeofenceEntry, "e1", at(3700), window));
    }

    #[test]
    fn test_proximity_dedup_within_cooldown() {
        let index = delhi_index();
        let mut notifier = Notifier::new(WatchConfig::default());

        let first = notifier.check_and_emit(&user(), None, &index, at(0));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, NotificationKind::GeofenceEntry);
        assert_eq!(first[0].related_event_id, "e1");

        // Second call inside the 24h window stays quiet.
        let second = notifier.check_and_emit(&user(), None, &index, at(60));
        assert!(second.is_empty());

        // After the window it may emit again.
        let later = notifier.check_and_emit(&user(), None, &index, at(25 * 3600));
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn test_proximity_message_and_actions() {
        let index = delhi_index();
        let mut notifier = Notifier::new(WatchConfig::default());

        let alerts = notifier.check_proximity(&user(), &index, at(0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Event Nearby");
        // ~1,058m away.
        assert!(alerts[0].message.contains("1.1km"), "{}", alerts[0].message);
        assert_eq!(alerts[0].actions, vec![AlertAction::ViewEvent]);
    }

    #[test]
    fn test_operator_message_overrides() {
        let mut g = fence("e1", 28.6139, 77.2090, 5000.0, ImpactLevel::Moderate);
        g.message = Some("Road closures expected near the stadium.".into());
        let index = GeofenceIndex::build(vec![g]);

        let mut notifier = Notifier::new(WatchConfig::default());
        let alerts = notifier.check_proximity(&user(), &index, at(0));
        assert_eq!(alerts[0].message, "Road closures expected near the stadium.");
    }

    #[test]
    fn test_traffic_alert_top_three_aggregate() {
        // Four fences on the route with distinct impacts; only the top 3
        // count, and one aggregate alert is emitted.
        let index = GeofenceIndex::build(vec![
            fence("a", 28.5800, 77.2000, 2000.0, ImpactLevel::Light),
            fence("b", 28.5700, 77.1970, 2000.0, ImpactLevel::Severe),
            fence("c", 28.5900, 77.2030, 2000.0, ImpactLevel::Moderate),
            fence("d", 28.6000, 77.2050, 2000.0, ImpactLevel::Heavy),
        ]);

        let mut notifier = Notifier::new(WatchConfig::default());
        let dest = Destination::new(GeoPoint::new(28.6139, 77.2090), "office");
        let start = GeoPoint::new(28.5459, 77.1926);

        let alerts = notifier.check_route_now(&start, &dest, &index, at(0));
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.kind, NotificationKind::TrafficAlert);
        assert_eq!(alert.severity, ImpactLevel::Severe);
        assert_eq!(alert.related_event_id, "b");
        assert!(alert.message.contains("2 other events"), "{}", alert.message);
        assert!(alert.message.contains("severe"), "{}", alert.message);

        // The three notified events are cooling down; the fourth (lowest
        // impact) is still eligible on the next pass.
        let again = notifier.check_route_now(&start, &dest, &index, at(60));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].related_event_id, "a");
    }

    #[test]
    fn test_traffic_cooldown_expiry() {
        let index = GeofenceIndex::build(vec![fence(
            "mid",
            28.5800,
            77.2000,
            2000.0,
            ImpactLevel::Heavy,
        )]);
        let mut notifier = Notifier::new(WatchConfig::default());
        let dest = Destination::new(GeoPoint::new(28.6139, 77.2090), "office");
        let start = GeoPoint::new(28.5459, 77.1926);

        assert_eq!(notifier.check_route_now(&start, &dest, &index, at(0)).len(), 1);
        assert!(notifier.check_route_now(&start, &dest, &index, at(3600)).is_empty());
        // 2h window elapsed.
        assert_eq!(
            notifier
                .check_route_now(&start, &dest, &index, at(2 * 3600 + 60))
                .len(),
            1
        );
    }

    #[test]
    fn test_route_recheck_gate() {
        let index = GeofenceIndex::build(vec![fence(
            "mid",
            28.5800,
            77.2000,
            2000.0,
            ImpactLevel::Heavy,
        )]);
        let mut notifier = Notifier::new(WatchConfig::default());
        let dest = Destination::new(GeoPoint::new(28.6139, 77.2090), "office");
        let start = GeoPoint::new(28.5459, 77.1926);

        assert!(notifier.route_check_due(at(0)));
        let _ = notifier.check_and_emit(&start, Some(&dest), &index, at(0));

        // Inside the 5-minute gate the route pass does not run at all.
        assert!(!notifier.route_check_due(at(120)));
        assert!(notifier.route_check_due(at(301)));
    }

    #[test]
    fn test_no_destination_no_route_pass() {
        let index = GeofenceIndex::build(vec![fence(
            "mid",
            28.5800,
            77.2000,
            2000.0,
            ImpactLevel::Heavy,
        )]);
        let mut notifier = Notifier::new(WatchConfig::default());

        // User far from the fence, no destination: nothing fires even
        // though the fence sits on the would-be route.
        let start = GeoPoint::new(28.5459, 77.1926);
        assert!(notifier.check_and_emit(&start, None, &index, at(0)).is_empty());
    }

    #[test]
    fn test_stale_event_filtered_from_traffic() {
        let mut g = fence("old", 28.5800, 77.2000, 2000.0, ImpactLevel::Severe);
        g.starts_at = Some(at(0) + Duration::from_secs(30 * 24 * 3600)); // a month out
        let index = GeofenceIndex::build(vec![g]);

        let mut notifier = Notifier::new(WatchConfig::default());
        let dest = Destination::new(GeoPoint::new(28.6139, 77.2090), "office");
        let start = GeoPoint::new(28.5459, 77.1926);

        assert!(notifier.check_route_now(&start, &dest, &index, at(0)).is_empty());
    }

    #[test]
    fn test_store_backed_dedup() {
        let index = delhi_index();
        let config = WatchConfig::default();

        // Pre-seed a recent record: a different session already notified.
        let mut store = InMemoryNotificationStore::new();
        store
            .insert(NotificationRecord {
                user_id: "u1".into(),
                event_id: "e1".into(),
                kind: NotificationKind::GeofenceEntry,
                notified_at: at(0),
            })
            .unwrap();

        let mut notifier = Notifier::new(config).with_store("u1", Box::new(store));
        assert!(notifier.check_proximity(&user(), &index, at(100)).is_empty());

        // Outside the persisted window it fires and writes a record back.
        let alerts = notifier.check_proximity(&user(), &index, at(25 * 3600));
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_store_failure_degrades_to_memory() {
        struct BrokenStore;
        impl NotificationStore for BrokenStore {
            fn find_recent(
                &self,
                _: &str,
                _: &str,
                _: NotificationKind,
                _: SystemTime,
            ) -> Result<Option<NotificationRecord>> {
                Err(Error::Store("connection refused".into()))
            }
            fn insert(&mut self, _: NotificationRecord) -> Result<()> {
                Err(Error::Store("connection refused".into()))
            }
        }

        let index = delhi_index();
        let mut notifier =
            Notifier::new(WatchConfig::default()).with_store("u1", Box::new(BrokenStore));

        // Alert still delivered, and the in-memory tracker still dedups.
        assert_eq!(notifier.check_proximity(&user(), &index, at(0)).len(), 1);
        assert!(notifier.check_proximity(&user(), &index, at(60)).is_empty());
    }

    #[test]
    fn test_reset_clears_session_state() {
        let index = delhi_index();
        let mut notifier = Notifier::new(WatchConfig::default());

        assert_eq!(notifier.check_proximity(&user(), &index, at(0)).len(), 1);
        notifier.reset();
        assert_eq!(notifier.check_proximity(&user(), &index, at(1)).len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_alert_serializes_for_sink() {
        let index = delhi_index();
        let mut notifier = Notifier::new(WatchConfig::default());
        let alerts = notifier.check_proximity(&user(), &index, at(0));

        let json = serde_json::to_value(&alerts[0]).unwrap();
        assert_eq!(json["title"], "Event Nearby");
        assert_eq!(json["related_event_id"], "e1");
    }
}
