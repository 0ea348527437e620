//! Polyline representation for route geometries.
//!
//! The routing service ships geometry as a Google encoded polyline
//! (precision 5). It is decoded once at the boundary and kept as plain
//! coordinates inside the planner.

use serde::{Deserialize, Serialize};

use crate::error::PolylineError;

const PRECISION: f64 = 1e5;

/// A route geometry as decoded (lat, lng) coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Decodes an encoded polyline string.
    pub fn decode(encoded: &str) -> Result<Self, PolylineError> {
        let bytes = encoded.as_bytes();
        let mut index = 0;
        let mut lat: i64 = 0;
        let mut lng: i64 = 0;
        let mut points = Vec::new();

        while index < bytes.len() {
            let start = index;
            lat = lat
                .checked_add(next_value(bytes, &mut index)?)
                .ok_or(PolylineError::Overflow(start))?;
            lng = lng
                .checked_add(next_value(bytes, &mut index)?)
                .ok_or(PolylineError::Overflow(start))?;

            let point = (lat as f64 / PRECISION, lng as f64 / PRECISION);
            if !(-90.0..=90.0).contains(&point.0) || !(-180.0..=180.0).contains(&point.1) {
                return Err(PolylineError::OutOfRange(start));
            }
            points.push(point);
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    /// The same geometry traced from the other end.
    pub fn reversed(mut self) -> Self {
        self.points.reverse();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reads one zig-zag encoded varint starting at `index`.
fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or(PolylineError::Truncated(*index))?;
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidByte {
                index: *index,
                byte,
            });
        }
        if shift > 55 {
            return Err(PolylineError::Overflow(start));
        }
        *index += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}
