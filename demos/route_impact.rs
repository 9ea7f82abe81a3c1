//! Stateless route assessment: which event geofences does a planned
//! route cross, and how bad is the traffic likely to be?
//!
//! Run with: cargo run --example route_impact

use geofence_notify::{assess_route, classify, GeoPoint, Geofence};

fn main() {
    let fences: Vec<Geofence> = [
        ("marathon", "City Marathon", 28.5800, 77.2000, 2000.0, 350, Some("Sports")),
        ("fair", "Community Fair", 28.6000, 77.2050, 1500.0, 150, Some("Community")),
        ("lecture", "Guest Lecture", 12.9716, 77.5946, 1000.0, 60, Some("Education")),
    ]
    .into_iter()
    .map(|(id, title, lat, lng, radius, attendees, category)| {
        let impact = classify(attendees, category);
        Geofence::new(id, title, GeoPoint::new(lat, lng), radius, impact)
            .expect("demo coordinates are valid")
    })
    .collect();

    // Commute from Saket toward central Delhi
    let route = [
        GeoPoint::new(28.5459, 77.1926),
        GeoPoint::new(28.5900, 77.2020),
        GeoPoint::new(28.6139, 77.2090),
    ];

    let assessment = assess_route(&route, &fences);

    println!("Route crosses {} geofence(s)", assessment.impacted_event_ids.len());
    for id in &assessment.impacted_event_ids {
        println!("  - {id}");
    }
    println!("Overall impact: {:?}", assessment.overall);
}
