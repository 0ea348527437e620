//! pickup-planner
//!
//! Splits scattered pickup points across capacity-limited vehicles and
//! orders each vehicle's stops. Distances come from a remote routing
//! service behind a cache, with retries and a straight-line fallback.

pub mod backoff;
pub mod cache;
pub mod cluster;
pub mod distance;
pub mod error;
pub mod haversine;
pub mod location;
pub mod optimizer;
pub mod polyline;
pub mod routing_api;
pub mod solver;
pub mod traits;

pub use cache::CacheStats;
pub use distance::{DistanceProvider, DistanceResult, Provenance};
pub use error::OptimizeError;
pub use location::{Location, LocationId};
pub use optimizer::{OptimizationResult, OptimizeOptions, Optimizer};
