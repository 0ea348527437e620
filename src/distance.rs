//! Resilient distance provider.
//!
//! Answers every query: from the cache if possible, otherwise from the
//! routing service with bounded retries, otherwise from the haversine
//! estimate. Whatever it computes is cached under the rounded pair, so a
//! flaky service is not retried again for the same pair.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backoff::{BackoffPolicy, ThreadSleeper};
use crate::cache::{CacheStats, DistanceCache};
use crate::haversine::HaversineEstimator;
use crate::location::{CacheKey, Location};
use crate::polyline::Polyline;
use crate::routing_api::RouteLeg;
use crate::traits::{RoutingApi, Sleeper};

/// Where a distance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Api,
    /// Straight-line estimate; less accurate.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    pub distance_m: f64,
    pub duration_s: f64,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Polyline>,
}

impl DistanceResult {
    pub fn fallback(distance_m: f64, duration_s: f64) -> Self {
        Self {
            distance_m,
            duration_s,
            provenance: Provenance::Fallback,
            geometry: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}

impl From<RouteLeg> for DistanceResult {
    fn from(leg: RouteLeg) -> Self {
        Self {
            distance_m: leg.distance_m,
            duration_s: leg.duration_s,
            provenance: Provenance::Api,
            geometry: leg.geometry,
        }
    }
}

/// A resolved distance plus whether the cache answered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub result: DistanceResult,
    pub cache_hit: bool,
}

pub struct DistanceProvider<A, S = ThreadSleeper> {
    api: A,
    sleeper: S,
    backoff: BackoffPolicy,
    estimator: HaversineEstimator,
    cache: Arc<DistanceCache>,
}

impl<A: RoutingApi> DistanceProvider<A, ThreadSleeper> {
    pub fn new(api: A) -> Self {
        Self::with_sleeper(api, ThreadSleeper)
    }
}

impl<A: RoutingApi, S: Sleeper> DistanceProvider<A, S> {
    pub fn with_sleeper(api: A, sleeper: S) -> Self {
        Self {
            api,
            sleeper,
            backoff: BackoffPolicy::default(),
            estimator: HaversineEstimator::default(),
            cache: Arc::new(DistanceCache::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_estimator(mut self, estimator: HaversineEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Shares an existing cache, e.g. between providers for different services.
    pub fn with_cache(mut self, cache: Arc<DistanceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Distance from `from` to `to`. Never fails.
    pub fn get_distance(&self, from: &Location, to: &Location) -> DistanceResult {
        self.lookup(from, to).result
    }

    pub fn lookup(&self, from: &Location, to: &Location) -> Lookup {
        let key = CacheKey::between(from, to);
        if let Some(result) = self.cache.get(&key) {
            debug!(from = %from.id(), to = %to.id(), "distance cache hit");
            return Lookup {
                result,
                cache_hit: true,
            };
        }

        debug!(from = %from.id(), to = %to.id(), "distance cache miss");
        let fetched = self.fetch(from, to);
        let result = self.cache.insert(key, fetched);
        Lookup {
            result,
            cache_hit: false,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn fetch(&self, from: &Location, to: &Location) -> DistanceResult {
        for attempt in 0..self.backoff.max_retries {
            match self.api.route(from.coords(), to.coords()) {
                Ok(leg) => return leg.into(),
                Err(err) if err.is_recoverable() && self.backoff.should_retry(attempt) => {
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        from = %from.id(),
                        to = %to.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "routing call failed, retrying"
                    );
                    self.sleeper.sleep(delay);
                }
                Err(err) => {
                    warn!(
                        from = %from.id(),
                        to = %to.id(),
                        attempt = attempt + 1,
                        error = %err,
                        "routing call failed, giving up"
                    );
                    break;
                }
            }
        }

        warn!(from = %from.id(), to = %to.id(), "using haversine fallback");
        self.estimator.estimate(from.coords(), to.coords())
    }
}
