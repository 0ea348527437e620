//! Seams between the planner and the outside world.
//!
//! The remote routing service and wall-clock sleeping are the two things the
//! planner cannot control. Both sit behind a trait so tests can script them.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::routing_api::RouteLeg;

/// A point-to-point routing service.
///
/// Coordinates are (lat, lng). Implementations must bound every call with a
/// timeout and report it as [`ApiError::Timeout`].
pub trait RoutingApi: Send + Sync {
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> Result<RouteLeg, ApiError>;
}

/// Blocks the calling thread between retries.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

impl<T: RoutingApi + ?Sized> RoutingApi for Arc<T> {
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> Result<RouteLeg, ApiError> {
        (**self).route(from, to)
    }
}

impl<T: Sleeper + ?Sized> Sleeper for Arc<T> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
