//! # Location Watch Loop
//!
//! Consumes a stream of device position updates and runs the full matching
//! pipeline on each one: geofence membership, traffic classification,
//! deduplication, alert delivery.
//!
//! ## Model
//!
//! Single consumer, event driven. Each update is processed synchronously
//! and completely before the next one; `&mut self` on the watcher makes a
//! cycle non-reentrant by construction. The periodic traffic recheck is an
//! elapsed-time comparison evaluated opportunistically on each update; no
//! timer thread runs.
//!
//! The watcher is an explicit, constructible instance holding its own state
//! (cooldown sets, last route check, subscription flag). Hosts either drive
//! it pull-style with [`LocationWatcher::poll_once`] against a
//! [`PositionSource`], or push-style by calling
//! [`LocationWatcher::handle_update`] from their own position callback.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geofence::{Geofence, GeofenceIndex};
use crate::notify::{Alert, Notifier};
use crate::{Destination, EventSite, Position, WatchConfig};

/// Source of device position updates.
///
/// `subscribe`/`unsubscribe` bracket the underlying platform location
/// handle; `unsubscribe` must release it and is expected to be idempotent.
pub trait PositionSource {
    fn subscribe(&mut self) -> Result<()>;

    /// Next position sample, `None` when no fresh sample is available yet.
    /// A failed fix is [`Error::LocationUnavailable`], which the watch loop
    /// treats as recoverable.
    fn poll(&mut self) -> Result<Option<Position>>;

    fn unsubscribe(&mut self);
}

/// Receiver of emitted alerts; on-screen, email, or a queue, as the host
/// chooses.
pub trait AlertSink {
    fn deliver(&mut self, alert: Alert);
}

/// Outcome of one watch cycle, reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// An update was processed and this many alerts were delivered.
    Delivered(usize),
    /// An update was processed; nothing new to say.
    Quiet,
    /// No fresh sample from the source this cycle.
    Idle,
    /// The source could not produce a fix; retry next cycle.
    NoFix,
    /// `poll_once` called before `start` (or after `stop`).
    NotStarted,
}

/// Continuous-position consumer feeding the matching pipeline.
pub struct LocationWatcher<Src, Sink> {
    config: WatchConfig,
    index: GeofenceIndex,
    notifier: Notifier,
    source: Src,
    sink: Sink,
    destination: Option<Destination>,
    last_position: Option<Position>,
    started: bool,
}

impl<Src: PositionSource, Sink: AlertSink> LocationWatcher<Src, Sink> {
    pub fn new(config: WatchConfig, source: Src, sink: Sink) -> Self {
        let notifier = Notifier::new(config.clone());
        Self {
            config,
            index: GeofenceIndex::default(),
            notifier,
            source,
            sink,
            destination: None,
            last_position: None,
            started: false,
        }
    }

    /// Replace the notifier (e.g. one carrying a persisted record store).
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Load the event set and build geofences around each valid location.
    ///
    /// Events with invalid coordinates are skipped silently (logged at
    /// debug level); impact levels are derived here, once.
    pub fn load_events(&mut self, events: &[EventSite]) {
        let fences: Vec<Geofence> = events
            .iter()
            .filter_map(|e| Geofence::for_event(e, self.config.default_radius_m))
            .collect();

        info!(
            "loaded {} geofence(s) from {} event(s)",
            fences.len(),
            events.len()
        );
        self.index = GeofenceIndex::build(fences);
    }

    /// Use an explicit, pre-built geofence set instead of per-event defaults.
    pub fn load_geofences(&mut self, fences: Vec<Geofence>) {
        self.index = GeofenceIndex::build(fences);
    }

    pub fn geofence_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn last_position(&self) -> Option<&Position> {
        self.last_position.as_ref()
    }

    /// Subscribe to the position source. Idempotent: starting twice is a
    /// no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.source.subscribe()?;
        self.started = true;
        info!("location watch started ({} geofences)", self.index.len());
        Ok(())
    }

    /// Unsubscribe and release the location handle. Idempotent: a double
    /// stop is a no-op. The current cycle, if any, has already finished,
    /// since `&mut self` keeps a cycle from being mid-flight here.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.source.unsubscribe();
        self.started = false;
        info!("location watch stopped");
    }

    /// Set the destination gating route/traffic checks. If a position is
    /// already known, a route check runs immediately, bypassing the recheck
    /// gate. Returns the number of alerts delivered by that check.
    ///
    /// The immediate check uses the stored sample's timestamp, keeping the
    /// cooldown state in the same clock domain as every polled update.
    pub fn set_destination(&mut self, destination: Destination) -> usize {
        let dest = destination.clone();
        self.destination = Some(destination);

        if let Some(pos) = self.last_position {
            let alerts =
                self.notifier
                    .check_route_now(&pos.point, &dest, &self.index, pos.timestamp);
            return self.deliver(alerts);
        }
        0
    }

    /// Clear the destination; route checks stop running.
    pub fn clear_destination(&mut self) {
        self.destination = None;
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// Pull one sample from the source and run the pipeline.
    pub fn poll_once(&mut self) -> WatchOutcome {
        if !self.started {
            return WatchOutcome::NotStarted;
        }

        match self.source.poll() {
            Ok(Some(position)) => {
                let delivered = self.handle_update(position);
                if delivered == 0 {
                    WatchOutcome::Quiet
                } else {
                    WatchOutcome::Delivered(delivered)
                }
            }
            Ok(None) => WatchOutcome::Idle,
            Err(Error::LocationUnavailable { reason }) => {
                // Recoverable: report, keep the subscription, retry next
                // cycle.
                warn!("position fix unavailable: {reason}");
                WatchOutcome::NoFix
            }
            Err(err) => {
                warn!("position source error: {err}");
                WatchOutcome::NoFix
            }
        }
    }

    /// Process one position update synchronously; returns the number of
    /// alerts delivered. Push-style hosts call this directly.
    pub fn handle_update(&mut self, position: Position) -> usize {
        debug!(
            "position update ({:.4}, {:.4})",
            position.point.latitude, position.point.longitude
        );
        self.last_position = Some(position);

        let alerts = self.notifier.check_and_emit(
            &position.point,
            self.destination.as_ref(),
            &self.index,
            position.timestamp,
        );
        self.deliver(alerts)
    }

    fn deliver(&mut self, alerts: Vec<Alert>) -> usize {
        let count = alerts.len();
        for alert in alerts {
            self.sink.deliver(alert);
        }
        count
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
