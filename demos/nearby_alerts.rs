//! Simulated walk through town with proximity alerts.
//!
//! Run with: cargo run --example nearby_alerts

use geofence_notify::{
    Alert, AlertSink, Destination, EventSite, GeoPoint, LocationWatcher, Position,
    PositionSource, Result, WatchConfig,
};
use std::collections::VecDeque;
use std::time::SystemTime;

/// Position source replaying a fixed list of samples.
struct ReplaySource {
    samples: VecDeque<Position>,
}

impl PositionSource for ReplaySource {
    fn subscribe(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Position>> {
        Ok(self.samples.pop_front())
    }

    fn unsubscribe(&mut self) {}
}

/// Sink that prints alerts to stdout.
struct PrintSink;

impl AlertSink for PrintSink {
    fn deliver(&mut self, alert: Alert) {
        println!("  [{}] {}: {}", alert.severity.label(), alert.title, alert.message);
    }
}

fn main() {
    // Events around central Delhi
    let events = vec![
        EventSite {
            id: "marathon".into(),
            title: "City Marathon".into(),
            category: Some("Sports".into()),
            attendee_count: 350,
            location: GeoPoint::new(28.6139, 77.2090),
            starts_at: None,
        },
        EventSite {
            id: "food-drive".into(),
            title: "Food Donation Drive".into(),
            category: Some("Community".into()),
            attendee_count: 80,
            location: GeoPoint::new(28.6315, 77.2167),
            starts_at: None,
        },
    ];

    // Walk from south Delhi toward the center
    let now = SystemTime::now();
    let walk = vec![
        Position::new(GeoPoint::new(28.5459, 77.1926), now),
        Position::new(GeoPoint::new(28.5800, 77.2000), now),
        Position::new(GeoPoint::new(28.6200, 77.2000), now),
        Position::new(GeoPoint::new(28.6290, 77.2150), now),
    ];

    let source = ReplaySource { samples: walk.into() };
    let mut watcher = LocationWatcher::new(WatchConfig::default(), source, PrintSink);
    watcher.load_events(&events);
    watcher
        .start()
        .expect("replay source always subscribes");

    println!("Watching {} geofence(s)\n", watcher.geofence_count());

    let mut cycle = 0;
    loop {
        cycle += 1;
        println!("cycle {cycle}: {:?}", watcher.poll_once());
        if cycle == 2 {
            // Heading to the office; route crosses the marathon area
            let n = watcher.set_destination(Destination::new(
                GeoPoint::new(28.6500, 77.2200),
                "office",
            ));
            println!("  destination set, {n} traffic alert(s)");
        }
        if cycle >= 5 {
            break;
        }
    }

    watcher.stop();
    println!("\nDone.");
}
