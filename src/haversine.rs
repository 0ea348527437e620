//! Haversine distance estimate (fallback when the routing service is unavailable).
//!
//! Uses great-circle distance inflated by a road-network factor.
//! Less accurate than a real route but always available.

use crate::distance::DistanceResult;

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Ratio of typical road distance to straight-line distance.
pub const ROAD_FACTOR: f64 = 1.3;

/// Average speed in residential areas, used for time estimation.
const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Great-circle distance between two (lat, lng) points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Straight-line estimator for road distance and travel time.
#[derive(Debug, Clone, PartialEq)]
pub struct HaversineEstimator {
    /// Multiplier applied to the great-circle distance.
    pub road_factor: f64,
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            road_factor: ROAD_FACTOR,
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineEstimator {
    pub fn new(road_factor: f64, speed_kmh: f64) -> Self {
        Self {
            road_factor,
            speed_kmh,
        }
    }

    /// Approximate road distance in meters.
    pub fn road_distance_m(&self, from: (f64, f64), to: (f64, f64)) -> f64 {
        haversine_km(from, to) * self.road_factor * 1000.0
    }

    /// Convert a distance in km to travel time in seconds.
    pub fn km_to_seconds(&self, km: f64) -> f64 {
        if self.speed_kmh <= 0.0 {
            return 0.0;
        }
        km / self.speed_kmh * 3600.0
    }

    /// Fallback result for a pair the routing service could not answer.
    pub fn estimate(&self, from: (f64, f64), to: (f64, f64)) -> DistanceResult {
        let distance_m = self.road_distance_m(from, to);
        DistanceResult::fallback(distance_m, self.km_to_seconds(distance_m / 1000.0))
    }
}
