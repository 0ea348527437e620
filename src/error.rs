//! Error types for the planner.
//!
//! Input problems (bad locations, zero capacity, holes in a cost matrix) are
//! fatal to a run and surface as `Err`. Routing service failures never leave
//! the distance provider; [`ApiError`] only travels between the HTTP adapter
//! and the retry loop.

use thiserror::Error;

use crate::location::LocationId;

/// Malformed location data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location id must not be empty")]
    EmptyId,

    #[error("location {id}: latitude {lat} is outside [-90, 90]")]
    InvalidLatitude { id: LocationId, lat: f64 },

    #[error("location {id}: longitude {lng} is outside [-180, 180]")]
    InvalidLongitude { id: LocationId, lng: f64 },

    #[error("location id {0} appears more than once")]
    DuplicateId(LocationId),
}

/// Failure of a single routing service call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("routing request timed out")]
    Timeout,

    #[error("routing service rate limited the request")]
    RateLimited,

    #[error("routing service failed with HTTP {status}")]
    ServerError { status: u16 },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("routing service rejected the request with HTTP {status}")]
    Rejected { status: u16 },

    #[error("routing service found no route: {message}")]
    NoRoute { message: String },

    #[error("malformed routing response: {message}")]
    Malformed { message: String },

    #[error("routing request could not be built: {message}")]
    InvalidRequest { message: String },
}

impl ApiError {
    /// Whether another attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout
                | ApiError::RateLimited
                | ApiError::ServerError { .. }
                | ApiError::Network { .. }
        )
    }
}

/// Failure to decode an encoded polyline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("polyline ends mid-value at byte {0}")]
    Truncated(usize),

    #[error("invalid polyline byte {byte:#04x} at {index}")]
    InvalidByte { index: usize, byte: u8 },

    #[error("polyline value starting at byte {0} overflows")]
    Overflow(usize),

    #[error("polyline point starting at byte {0} is outside WGS84 bounds")]
    OutOfRange(usize),
}

/// Routing client construction failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("vehicle capacity must be at least 1")]
    ZeroCapacity,
}

/// Input problems detected by the route solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("cost matrix has no entry for {from} -> {to}")]
    MissingCost { from: LocationId, to: LocationId },

    #[error("cost {cost} for {from} -> {to} is not a finite non-negative number")]
    InvalidCost {
        from: LocationId,
        to: LocationId,
        cost: f64,
    },

    #[error("stop {0} appears more than once in the cluster")]
    DuplicateStop(LocationId),

    #[error("cluster of {size} stops exceeds vehicle capacity {capacity}")]
    OverCapacity { size: usize, capacity: usize },
}

/// Errors returned by [`crate::optimizer::Optimizer::optimize`].
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    /// A cluster larger than the vehicle capacity left the clusterer.
    #[error("internal fault: cluster {index} holds {size} stops but vehicle capacity is {capacity}")]
    CapacityInvariant {
        index: usize,
        size: usize,
        capacity: usize,
    },

    #[error("a cluster references unknown location {0}")]
    UnknownLocation(LocationId),

    #[error("failed to build lookup worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
