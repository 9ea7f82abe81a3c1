//! # Traffic Impact Classification
//!
//! Derives a qualitative congestion estimate for an event from its expected
//! attendance and category. Classification is a pure function of its inputs
//! and carries no hidden state, so a geofence can bake the level in at
//! construction time and every later consumer reads the same answer.
//!
//! ## Scale
//!
//! | Level | Label | Attendance base |
//! |-------|-------|-----------------|
//! | 5 | severe | > 500 |
//! | 4 | heavy | > 300 |
//! | 3 | moderate | > 200 |
//! | 2 | light | > 100 |
//! | 1 | potential | everything else |
//!
//! Events in a fixed high-impact category set (Sports, Community,
//! Fundraising) are bumped one level, capped at 5.

use crate::geofence::{find_route_matches, Geofence};
use crate::GeoPoint;

/// Event categories that draw extra traffic regardless of headcount.
pub const HIGH_IMPACT_CATEGORIES: [&str; 3] = ["Sports", "Community", "Fundraising"];

/// Traffic impact level on a 1-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImpactLevel {
    Minimal = 1,
    Light = 2,
    Moderate = 3,
    Heavy = 4,
    Severe = 5,
}

impl ImpactLevel {
    /// Numeric level, 1 through 5.
    #[inline]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Human-readable label used in alert messages.
    pub fn label(self) -> &'static str {
        match self {
            ImpactLevel::Severe => "severe",
            ImpactLevel::Heavy => "heavy",
            ImpactLevel::Moderate => "moderate",
            ImpactLevel::Light => "light",
            ImpactLevel::Minimal => "potential",
        }
    }

    fn bump(self) -> Self {
        match self {
            ImpactLevel::Minimal => ImpactLevel::Light,
            ImpactLevel::Light => ImpactLevel::Moderate,
            ImpactLevel::Moderate => ImpactLevel::Heavy,
            _ => ImpactLevel::Severe,
        }
    }
}

/// Classify an event's traffic impact from attendance and category.
///
/// Deterministic and total; unknown categories are neutral.
///
/// # Example
///
/// ```rust
/// use geofence_notify::traffic::{classify, ImpactLevel};
///
/// assert_eq!(classify(350, Some("Sports")), ImpactLevel::Severe);
/// assert_eq!(classify(50, Some("Education")), ImpactLevel::Minimal);
/// ```
pub fn classify(attendee_count: u32, category: Option<&str>) -> ImpactLevel {
    let base = if attendee_count > 500 {
        ImpactLevel::Severe
    } else if attendee_count > 300 {
        ImpactLevel::Heavy
    } else if attendee_count > 200 {
        ImpactLevel::Moderate
    } else if attendee_count > 100 {
        ImpactLevel::Light
    } else {
        ImpactLevel::Minimal
    };

    match category {
        Some(c) if HIGH_IMPACT_CATEGORIES.contains(&c) => base.bump(),
        _ => base,
    }
}

/// Coarse low/medium/high bucket for summarizing a whole route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoarseImpact {
    Low,
    Medium,
    High,
}

impl From<ImpactLevel> for CoarseImpact {
    fn from(level: ImpactLevel) -> Self {
        match level {
            ImpactLevel::Heavy | ImpactLevel::Severe => CoarseImpact::High,
            ImpactLevel::Moderate => CoarseImpact::Medium,
            _ => CoarseImpact::Low,
        }
    }
}

/// Summary of how event geofences affect a planned route.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteAssessment {
    /// Event ids of the geofences the route passes through, first-hit order.
    pub impacted_event_ids: Vec<String>,
    /// Worst coarse impact among the matches; `Low` when nothing matched.
    pub overall: CoarseImpact,
}

/// Assess a route against a set of geofences.
///
/// A pure function boundary: takes a route polyline and the active geofence
/// set, returns the impacted events and an overall impact bucket. Suitable
/// for serving behind a stateless endpoint.
pub fn assess_route(route: &[GeoPoint], geofences: &[Geofence]) -> RouteAssessment {
    let matches = find_route_matches(route, geofences);

    let overall = matches
        .iter()
        .map(|g| CoarseImpact::from(g.impact))
        .max()
        .unwrap_or(CoarseImpact::Low);

    RouteAssessment {
        impacted_event_ids: matches.iter().map(|g| g.event_id.clone()).collect(),
        overall,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_thresholds() {
        assert_eq!(classify(50, None), ImpactLevel::Minimal);
        assert_eq!(classify(100, None), ImpactLevel::Minimal);
        assert_eq!(classify(101, None), ImpactLevel::Light);
        assert_eq!(classify(201, None), ImpactLevel::Moderate);
        assert_eq!(classify(301, None), ImpactLevel::Heavy);
        assert_eq!(classify(501, None), ImpactLevel::Severe);
    }

    #[test]
    fn test_high_impact_category_bumps_one_level() {
        assert_eq!(classify(350, Some("Sports")), ImpactLevel::Severe);
        assert_eq!(classify(150, Some("Community")), ImpactLevel::Moderate);
        assert_eq!(classify(50, Some("Fundraising")), ImpactLevel::Light);
    }

    #[test]
    fn test_neutral_category_no_bump() {
        assert_eq!(classify(50, Some("Education")), ImpactLevel::Minimal);
        assert_eq!(classify(350, Some("Education")), ImpactLevel::Heavy);
    }

    #[test]
    fn test_bump_caps_at_severe() {
        assert_eq!(classify(600, Some("Sports")), ImpactLevel::Severe);
    }

    #[test]
    fn test_monotonic_in_attendance() {
        let counts = [0, 50, 101, 150, 201, 301, 501, 2000];
        for pair in counts.windows(2) {
            assert!(classify(pair[0], None) <= classify(pair[1], None));
            assert!(classify(pair[0], Some("Sports")) <= classify(pair[1], Some("Sports")));
        }
    }

    #[test]
    fn test_category_never_lowers() {
        for count in [0, 150, 250, 350, 550] {
            assert!(classify(count, Some("Sports")) >= classify(count, None));
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ImpactLevel::Severe.label(), "severe");
        assert_eq!(ImpactLevel::Heavy.label(), "heavy");
        assert_eq!(ImpactLevel::Moderate.label(), "moderate");
        assert_eq!(ImpactLevel::Light.label(), "light");
        assert_eq!(ImpactLevel::Minimal.label(), "potential");
    }

    #[test]
    fn test_coarse_buckets() {
        assert_eq!(CoarseImpact::from(ImpactLevel::Severe), CoarseImpact::High);
        assert_eq!(CoarseImpact::from(ImpactLevel::Heavy), CoarseImpact::High);
        assert_eq!(CoarseImpact::from(ImpactLevel::Moderate), CoarseImpact::Medium);
        assert_eq!(CoarseImpact::from(ImpactLevel::Light), CoarseImpact::Low);
    }
}
