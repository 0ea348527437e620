//! Property-based tests for clustering, solving and cache keys.
//!
//! # Invariants tested
//!
//! - **Partition:** every location lands in exactly one cluster.
//! - **Capacity:** no cluster exceeds the vehicle capacity.
//! - **Permutation:** a solved route visits each cluster member once.
//! - **Consistent cost:** the reported cost matches the matrix walk.
//! - **Rounding:** coordinates equal to four places share a cache key.

use std::collections::HashSet;

use pickup_planner::cluster::{Cluster, Clusterer};
use pickup_planner::location::CacheKey;
use pickup_planner::solver::{CostMatrix, SolveOptions, solve};
use pickup_planner::{Location, LocationId};
use proptest::prelude::*;

/// Points scattered over Singapore.
fn locations_strategy(max: usize) -> impl Strategy<Value = Vec<Location>> {
    prop::collection::vec((1.25_f64..1.45, 103.65_f64..104.0), 0..max).prop_map(|points| {
        points
            .into_iter()
            .enumerate()
            .map(|(i, (lat, lng))| {
                Location::new(format!("p{i:03}"), format!("Pickup {i}"), lat, lng)
                    .expect("generated coordinates are valid")
            })
            .collect()
    })
}

/// Square matrix of non-negative costs, diagonal ignored.
fn costs_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1_usize..12).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0.0_f64..1000.0, n), n)
    })
}

fn id(index: usize) -> LocationId {
    LocationId::new(format!("n{index:02}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn clusters_partition_input_within_capacity(
        locations in locations_strategy(60),
        capacity in 1_usize..15,
    ) {
        let clusters = Clusterer::default()
            .cluster(&locations, capacity)
            .expect("capacity is positive");

        let mut seen = HashSet::new();
        for cluster in &clusters {
            prop_assert!(!cluster.is_empty());
            prop_assert!(cluster.len() <= capacity, "cluster of {} > {}", cluster.len(), capacity);
            for member in cluster.members() {
                prop_assert!(seen.insert(member.clone()), "{} assigned twice", member);
            }
        }
        prop_assert_eq!(seen.len(), locations.len());
        prop_assert!(clusters.len() >= locations.len().div_ceil(capacity));
    }

    #[test]
    fn clustering_is_deterministic(
        locations in locations_strategy(40),
        capacity in 1_usize..15,
    ) {
        let clusterer = Clusterer::default();
        let first = clusterer.cluster(&locations, capacity).expect("cluster");
        let second = clusterer.cluster(&locations, capacity).expect("cluster");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn solved_route_is_a_permutation(
        costs in costs_strategy(),
        with_depot in any::<bool>(),
    ) {
        let mut matrix = CostMatrix::new();
        for (i, row) in costs.iter().enumerate() {
            for (j, &cost) in row.iter().enumerate() {
                if i != j {
                    matrix.insert(id(i), id(j), cost);
                }
            }
        }

        // Node 0 doubles as the depot when one is used.
        let depot = with_depot.then(|| id(0));
        let first_stop = usize::from(with_depot);
        let members: Vec<LocationId> = (first_stop..costs.len()).rev().map(id).collect();
        let cluster = Cluster::new(members.clone());

        let route = solve(&cluster, depot.as_ref(), &matrix, &SolveOptions::default())
            .expect("matrix is complete");

        let mut visited = route.stops.clone();
        visited.sort();
        let mut expected = members;
        expected.sort();
        prop_assert_eq!(visited, expected);

        let walked = matrix.path_cost(depot.as_ref(), &route.stops).expect("complete");
        prop_assert!((walked - route.total_cost).abs() < 1e-6);
        prop_assert!(route.total_cost >= 0.0 && route.total_cost.is_finite());

        let again = solve(&cluster, depot.as_ref(), &matrix, &SolveOptions::default())
            .expect("matrix is complete");
        prop_assert_eq!(route, again);
    }

    #[test]
    fn nearby_coordinates_share_cache_key(
        lat in -899_999_i64..=899_999,
        lng in -1_799_999_i64..=1_799_999,
        jitter in (-0.45_f64..0.45, -0.45_f64..0.45),
    ) {
        let exact = (lat as f64 / 1e4, lng as f64 / 1e4);
        let nudged = ((lat as f64 + jitter.0) / 1e4, (lng as f64 + jitter.1) / 1e4);
        let other = (1.3400, 103.7050);

        prop_assert_eq!(CacheKey::new(exact, other), CacheKey::new(nudged, other));
        prop_assert_eq!(CacheKey::new(other, exact), CacheKey::new(other, nudged));
    }
}
