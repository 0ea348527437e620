//! Optimization pipeline: cluster, price, solve, aggregate.
//!
//! Clustering finishes before any routing starts, and each cluster's matrix
//! is complete before its solve. Only the pairwise lookups inside one
//! matrix run in parallel, on a bounded worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::backoff::ThreadSleeper;
use crate::cache::CacheStats;
use crate::cluster::{ClusterAnalysis, ClusterOptions, Clusterer, analyze};
use crate::distance::{DistanceProvider, DistanceResult, Lookup};
use crate::error::{LocationError, OptimizeError};
use crate::location::{CacheKey, Location, LocationId};
use crate::polyline::Polyline;
use crate::solver::{CostMatrix, Route, SolveOptions, solve};
use crate::traits::{RoutingApi, Sleeper};

#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub clustering: ClusterOptions,
    /// `vehicle_capacity` is overwritten with the capacity passed to `optimize`.
    pub solver: SolveOptions,
    /// Start and end of every route, e.g. the school.
    pub depot: Option<Location>,
    /// Concurrent distance lookups per cluster.
    pub workers: usize,
    /// Price each unordered pair once, in a fixed direction, and mirror it.
    pub symmetric: bool,
    /// Dwell time per pickup, added to route durations.
    pub service_time_secs: f64,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            clustering: ClusterOptions::default(),
            solver: SolveOptions::default(),
            depot: None,
            workers: 4,
            symmetric: true,
            service_time_secs: 60.0,
        }
    }
}

impl OptimizeOptions {
    pub fn with_depot(mut self, depot: Location) -> Self {
        self.depot = Some(depot);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_clustering(mut self, clustering: ClusterOptions) -> Self {
        self.clustering = clustering;
        self
    }

    pub fn directional(mut self) -> Self {
        self.symmetric = false;
        self
    }
}

/// One vehicle's share of the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRoute {
    pub vehicle: usize,
    pub route: Route,
    pub distance_m: f64,
    /// Travel time plus service time at every stop.
    pub duration_s: f64,
    /// Legs of this cluster's matrix priced by the haversine fallback.
    pub fallback_legs: usize,
    /// Road geometry along `route.sequence()`. Legs the routing service
    /// gave no geometry for are drawn straight.
    pub geometry: Polyline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub routes: Vec<VehicleRoute>,
    pub vehicle_count: usize,
    pub total_distance_m: f64,
    pub max_route_duration_s: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fallback_lookups: usize,
    pub analysis: ClusterAnalysis,
}

pub struct Optimizer<A, S = ThreadSleeper> {
    provider: Arc<DistanceProvider<A, S>>,
    clusterer: Clusterer,
    options: OptimizeOptions,
}

impl<A: RoutingApi, S: Sleeper> Optimizer<A, S> {
    pub fn new(provider: Arc<DistanceProvider<A, S>>, options: OptimizeOptions) -> Self {
        Self {
            provider,
            clusterer: Clusterer::new(options.clustering.clone()),
            options,
        }
    }

    pub fn provider(&self) -> &Arc<DistanceProvider<A, S>> {
        &self.provider
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.provider.cache_stats()
    }

    pub fn clear_cache(&self) {
        self.provider.clear_cache();
    }

    /// Splits `locations` into vehicle routes of at most `vehicle_capacity`
    /// stops each.
    pub fn optimize(
        &self,
        locations: &[Location],
        vehicle_capacity: usize,
    ) -> Result<OptimizationResult, OptimizeError> {
        let depot = self.options.depot.as_ref();
        validate(locations, depot)?;

        let partition = self.clusterer.partition(locations, vehicle_capacity)?;
        let analysis = analyze(&partition, locations, depot, vehicle_capacity);
        let clusters = &partition.clusters;
        info!(
            locations = locations.len(),
            clusters = clusters.len(),
            noise = analysis.noise.len(),
            recommended_vehicles = analysis.recommended_vehicles,
            "clustered pickup points"
        );

        let by_id: HashMap<&LocationId, &Location> =
            locations.iter().map(|location| (location.id(), location)).collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.max(1))
            .build()?;
        let solver_options = SolveOptions {
            vehicle_capacity: Some(vehicle_capacity),
            ..self.options.solver.clone()
        };

        let mut routes = Vec::with_capacity(clusters.len());
        let mut stats = RunStats::default();

        for (index, cluster) in clusters.iter().enumerate() {
            if cluster.len() > vehicle_capacity {
                return Err(OptimizeError::CapacityInvariant {
                    index,
                    size: cluster.len(),
                    capacity: vehicle_capacity,
                });
            }

            let mut nodes: Vec<&Location> = Vec::with_capacity(cluster.len() + 1);
            nodes.extend(depot);
            for id in cluster.members() {
                let location = by_id
                    .get(id)
                    .copied()
                    .ok_or_else(|| OptimizeError::UnknownLocation(id.clone()))?;
                nodes.push(location);
            }

            let mut priced = pool.install(|| self.price_cluster(&nodes));
            let route = solve(
                cluster,
                depot.map(Location::id),
                &priced.distances,
                &solver_options,
            )?;
            let travel_s = priced.durations.path_cost(route.depot.as_ref(), &route.stops)?;
            let duration_s = travel_s + self.options.service_time_secs * route.stops.len() as f64;
            let geometry = stitch_geometry(&route, &nodes, &mut priced.legs);

            debug!(
                vehicle = index,
                stops = route.stops.len(),
                distance_m = route.total_cost,
                improvements = route.improvements,
                fallback_legs = priced.fallback_legs,
                "solved cluster"
            );

            stats.cache_hits += priced.cache_hits;
            stats.cache_misses += priced.cache_misses;
            stats.fallback_lookups += priced.fallback_legs;
            routes.push(VehicleRoute {
                vehicle: index,
                distance_m: route.total_cost,
                duration_s,
                fallback_legs: priced.fallback_legs,
                geometry,
                route,
            });
        }

        let total_distance_m: f64 = routes.iter().map(|r| r.distance_m).sum();
        let max_route_duration_s = routes.iter().map(|r| r.duration_s).fold(0.0, f64::max);
        info!(
            vehicles = routes.len(),
            total_distance_m,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            fallback_lookups = stats.fallback_lookups,
            "optimization finished"
        );

        Ok(OptimizationResult {
            vehicle_count: routes.len(),
            routes,
            total_distance_m,
            max_route_duration_s,
            cache_hits: stats.cache_hits,
            cache_misses: stats.cache_misses,
            fallback_lookups: stats.fallback_lookups,
            analysis,
        })
    }

    /// Looks up every pair of `nodes` on the current rayon pool.
    fn price_cluster(&self, nodes: &[&Location]) -> PricedCluster {
        let symmetric = self.options.symmetric;
        let pairs: Vec<(usize, usize)> = (0..nodes.len())
            .flat_map(|i| (0..nodes.len()).map(move |j| (i, j)))
            .filter_map(|(i, j)| match (symmetric, i.cmp(&j)) {
                (true, std::cmp::Ordering::Less) => Some(canonical(nodes, i, j)),
                (false, ordering) if ordering.is_ne() => Some((i, j)),
                _ => None,
            })
            .collect();

        let lookups: Vec<(usize, usize, Lookup)> = pairs
            .par_iter()
            .map(|&(i, j)| (i, j, self.provider.lookup(nodes[i], nodes[j])))
            .collect();

        let mut priced = PricedCluster::default();
        for (i, j, lookup) in lookups {
            if lookup.cache_hit {
                priced.cache_hits += 1;
            } else {
                priced.cache_misses += 1;
            }
            if lookup.result.is_fallback() {
                priced.fallback_legs += 1;
            }

            let from = nodes[i].id().clone();
            let to = nodes[j].id().clone();
            let DistanceResult {
                distance_m,
                duration_s,
                geometry,
                ..
            } = lookup.result;
            if symmetric {
                priced
                    .distances
                    .insert_symmetric(from.clone(), to.clone(), distance_m);
                priced
                    .durations
                    .insert_symmetric(from.clone(), to.clone(), duration_s);
                if let Some(geometry) = geometry {
                    priced
                        .legs
                        .insert((to.clone(), from.clone()), geometry.clone().reversed());
                    priced.legs.insert((from, to), geometry);
                }
            } else {
                priced.distances.insert(from.clone(), to.clone(), distance_m);
                priced.durations.insert(from.clone(), to.clone(), duration_s);
                if let Some(geometry) = geometry {
                    priced.legs.insert((from, to), geometry);
                }
            }
        }
        priced
    }
}

/// Orders a pair so it maps to the same cache entry whichever way round
/// the cluster lists it.
fn canonical(nodes: &[&Location], i: usize, j: usize) -> (usize, usize) {
    let key = CacheKey::between(nodes[i], nodes[j]);
    if key.reversed() < key {
        (j, i)
    } else {
        (i, j)
    }
}

/// Joins the leg geometries along the route's driving order.
fn stitch_geometry(
    route: &Route,
    nodes: &[&Location],
    legs: &mut HashMap<(LocationId, LocationId), Polyline>,
) -> Polyline {
    let coords = |id: &LocationId| {
        nodes
            .iter()
            .find(|node| node.id() == id)
            .map(|node| node.coords())
    };
    let sequence: Vec<&LocationId> = route.sequence().collect();

    let mut points: Vec<(f64, f64)> = Vec::new();
    for pair in sequence.windows(2) {
        let leg = match legs.remove(&(pair[0].clone(), pair[1].clone())) {
            Some(polyline) => polyline.into_points(),
            None => coords(pair[0]).into_iter().chain(coords(pair[1])).collect(),
        };
        // Consecutive legs share their joining point.
        let skip = usize::from(points.last() == leg.first());
        points.extend(leg.into_iter().skip(skip));
    }
    Polyline::new(points)
}

#[derive(Debug, Default)]
struct PricedCluster {
    distances: CostMatrix,
    durations: CostMatrix,
    legs: HashMap<(LocationId, LocationId), Polyline>,
    cache_hits: u64,
    cache_misses: u64,
    fallback_legs: usize,
}

#[derive(Debug, Default)]
struct RunStats {
    cache_hits: u64,
    cache_misses: u64,
    fallback_lookups: usize,
}

fn validate(locations: &[Location], depot: Option<&Location>) -> Result<(), LocationError> {
    let mut seen = HashSet::with_capacity(locations.len() + 1);
    for location in depot.into_iter().chain(locations) {
        location.validate()?;
        if !seen.insert(location.id()) {
            return Err(LocationError::DuplicateId(location.id().clone()));
        }
    }
    Ok(())
}
