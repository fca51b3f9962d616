//! Shared types used across the application.

use serde::{Deserialize, Serialize};

/// Discord guild id; one research map and one trade community per guild.
pub type CommunityId = u64;

/// Discord user id.
pub type UserId = u64;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Axis-aligned rectangle given by two opposite corners in either order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub corner1: Coordinates,
    pub corner2: Coordinates,
}

impl Bounds {
    pub fn new(corner1: Coordinates, corner2: Coordinates) -> Self {
        Self { corner1, corner2 }
    }

    pub fn latitude_span(&self) -> f64 {
        (self.corner1.latitude - self.corner2.latitude).abs()
    }

    pub fn longitude_span(&self) -> f64 {
        (self.corner1.longitude - self.corner2.longitude).abs()
    }

    /// Inclusive containment, independent of corner ordering.
    pub fn contains(&self, point: Coordinates) -> bool {
        let (lat_lo, lat_hi) = ordered(self.corner1.latitude, self.corner2.latitude);
        let (lng_lo, lng_hi) = ordered(self.corner1.longitude, self.corner2.longitude);
        (lat_lo..=lat_hi).contains(&point.latitude) && (lng_lo..=lng_hi).contains(&point.longitude)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_either_corner_order() {
        let a = Coordinates::new(42.0, -77.0);
        let b = Coordinates::new(43.0, -76.0);
        let inside = Coordinates::new(42.6, -76.4);
        assert!(Bounds::new(a, b).contains(inside));
        assert!(Bounds::new(b, a).contains(inside));
    }

    #[test]
    fn test_contains_edges_inclusive() {
        let bounds = Bounds::new(Coordinates::new(42.0, -77.0), Coordinates::new(43.0, -76.0));
        assert!(bounds.contains(Coordinates::new(42.0, -76.5)));
        assert!(bounds.contains(Coordinates::new(43.0, -76.0)));
        assert!(!bounds.contains(Coordinates::new(43.0001, -76.5)));
        assert!(!bounds.contains(Coordinates::new(42.5, -75.9999)));
    }
}
