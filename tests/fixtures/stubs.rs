//! Deterministic stand-ins for the routing service and the clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pickup_planner::error::ApiError;
use pickup_planner::haversine::haversine_km;
use pickup_planner::routing_api::RouteLeg;
use pickup_planner::traits::{RoutingApi, Sleeper};

/// Road distance the stub reports, relative to great-circle distance.
///
/// Differs from the fallback factor so tests can tell the two apart.
pub const STUB_ROAD_FACTOR: f64 = 1.2;
/// Stub travel speed, 36 km/h.
pub const STUB_SPEED_MPS: f64 = 10.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the stub answers once its script runs out.
#[derive(Debug, Clone)]
enum Fallthrough {
    Measure,
    Fail(ApiError),
}

/// Routing service that replays scripted errors, then measures legs.
///
/// A measured leg is the great-circle distance scaled by
/// [`STUB_ROAD_FACTOR`], driven at [`STUB_SPEED_MPS`].
#[derive(Debug)]
pub struct ScriptedApi {
    script: Mutex<VecDeque<ApiError>>,
    fallthrough: Fallthrough,
    calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn healthy() -> Self {
        Self::with_failures(Vec::new())
    }

    /// Fails with each of `errors` in turn, then answers every call.
    pub fn with_failures(errors: Vec<ApiError>) -> Self {
        Self {
            script: Mutex::new(errors.into()),
            fallthrough: Fallthrough::Measure,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call with `error`.
    pub fn down(error: ApiError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallthrough: Fallthrough::Fail(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn measure(from: (f64, f64), to: (f64, f64)) -> RouteLeg {
        let distance_m = haversine_km(from, to) * 1000.0 * STUB_ROAD_FACTOR;
        RouteLeg {
            distance_m,
            duration_s: distance_m / STUB_SPEED_MPS,
            geometry: None,
        }
    }
}

impl RoutingApi for ScriptedApi {
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> Result<RouteLeg, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.script).pop_front() {
            return Err(error);
        }
        match &self.fallthrough {
            Fallthrough::Measure => Ok(Self::measure(from, to)),
            Fallthrough::Fail(error) => Err(error.clone()),
        }
    }
}

/// Records requested sleeps instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.slept).clone()
    }

    pub fn total(&self) -> Duration {
        lock(&self.slept).iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        lock(&self.slept).push(duration);
    }
}
