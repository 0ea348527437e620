//! Pickup locations and the keys used to cache distances between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LocationError;

/// Decimal places kept when keying a distance lookup (about 11 m).
pub const CACHE_KEY_PRECISION: u32 = 4;

const KEY_SCALE: f64 = 10_000.0;

/// Opaque identifier of a pickup location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LocationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named WGS84 point to be picked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    name: String,
    lat: f64,
    lng: f64,
}

impl Location {
    /// Creates a validated location.
    pub fn new(
        id: impl Into<LocationId>,
        name: impl Into<String>,
        lat: f64,
        lng: f64,
    ) -> Result<Self, LocationError> {
        let location = Self {
            id: id.into(),
            name: name.into(),
            lat,
            lng,
        };
        location.validate()?;
        Ok(location)
    }

    /// Checks the invariants `new` enforces.
    ///
    /// Deserialized locations bypass `new`, so hosts feeding JSON straight
    /// into the optimizer rely on it calling this.
    pub fn validate(&self) -> Result<(), LocationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(LocationError::EmptyId);
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(LocationError::InvalidLatitude {
                id: self.id.clone(),
                lat: self.lat,
            });
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(LocationError::InvalidLongitude {
                id: self.id.clone(),
                lng: self.lng,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &LocationId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Coordinates as (lat, lng).
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Directed pair of coordinates rounded to [`CACHE_KEY_PRECISION`] places.
///
/// Points closer than the rounding step share a key, so near-duplicate
/// queries are answered from one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    from: (i64, i64),
    to: (i64, i64),
}

impl CacheKey {
    pub fn new(from: (f64, f64), to: (f64, f64)) -> Self {
        Self {
            from: (scaled(from.0), scaled(from.1)),
            to: (scaled(to.0), scaled(to.1)),
        }
    }

    pub fn between(from: &Location, to: &Location) -> Self {
        Self::new(from.coords(), to.coords())
    }

    /// The same pair travelled in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

fn scaled(degrees: f64) -> i64 {
    (degrees * KEY_SCALE).round() as i64
}
