//! Single-vehicle route solver.
//!
//! Builds a tour with nearest neighbor, then improves it with 2-opt and
//! relocate moves until neither finds an improvement or the budget runs
//! out. Stops are handled in id order, and ties always go to the lowest
//! id, so identical input gives identical routes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cluster::Cluster;
use crate::error::SolveError;
use crate::location::LocationId;

/// Improvements smaller than this are treated as noise.
const EPSILON: f64 = 1e-9;

/// Directed travel costs between location ids.
#[derive(Debug, Clone, Default)]
pub struct CostMatrix {
    costs: HashMap<LocationId, HashMap<LocationId, f64>>,
}

impl CostMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: LocationId, to: LocationId, cost: f64) {
        self.costs.entry(from).or_default().insert(to, cost);
    }

    pub fn insert_symmetric(&mut self, a: LocationId, b: LocationId, cost: f64) {
        self.insert(a.clone(), b.clone(), cost);
        self.insert(b, a, cost);
    }

    /// Cost from `from` to `to`. A location to itself always costs zero.
    pub fn get(&self, from: &LocationId, to: &LocationId) -> Option<f64> {
        if from == to {
            return Some(0.0);
        }
        self.costs.get(from).and_then(|row| row.get(to)).copied()
    }

    /// Number of stored directed entries.
    pub fn len(&self) -> usize {
        self.costs.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cost of visiting `stops` in order, leaving from and returning to
    /// `depot` when there is one.
    pub fn path_cost(
        &self,
        depot: Option<&LocationId>,
        stops: &[LocationId],
    ) -> Result<f64, SolveError> {
        let mut sequence: Vec<&LocationId> = Vec::with_capacity(stops.len() + 2);
        sequence.extend(depot);
        sequence.extend(stops);
        if !stops.is_empty() {
            sequence.extend(depot);
        }

        sequence.windows(2).try_fold(0.0, |total, pair| {
            self.get(pair[0], pair[1])
                .map(|cost| total + cost)
                .ok_or_else(|| SolveError::MissingCost {
                    from: pair[0].clone(),
                    to: pair[1].clone(),
                })
        })
    }
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum local search passes.
    pub max_iterations: usize,
    /// Wall-clock budget for local search.
    pub time_limit: Duration,
    /// Stops one vehicle can take. `None` means unbounded.
    pub vehicle_capacity: Option<usize>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            time_limit: Duration::from_secs(30),
            vehicle_capacity: None,
        }
    }
}

/// Visiting order for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depot: Option<LocationId>,
    /// Every cluster member exactly once, in visiting order.
    pub stops: Vec<LocationId>,
    pub total_cost: f64,
    /// Local search moves accepted after construction.
    pub improvements: usize,
}

impl Route {
    /// Every node in driving order. A depot appears at both ends.
    pub fn sequence(&self) -> impl Iterator<Item = &LocationId> {
        let back = self.depot.iter().filter(|_| !self.stops.is_empty());
        self.depot.iter().chain(self.stops.iter()).chain(back)
    }
}

/// Orders one cluster's stops.
///
/// With a depot the route is a closed tour; without one it is an open path
/// starting at the lowest id's nearest-neighbor chain. Budget exhaustion
/// returns the best route found so far.
pub fn solve(
    cluster: &Cluster,
    depot: Option<&LocationId>,
    matrix: &CostMatrix,
    options: &SolveOptions,
) -> Result<Route, SolveError> {
    if let Some(capacity) = options.vehicle_capacity {
        if cluster.len() > capacity {
            return Err(SolveError::OverCapacity {
                size: cluster.len(),
                capacity,
            });
        }
    }

    let mut stops: Vec<LocationId> = cluster.members().to_vec();
    stops.sort();
    if let Some(pair) = stops.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(SolveError::DuplicateStop(pair[0].clone()));
    }

    let mut nodes: Vec<&LocationId> = Vec::with_capacity(stops.len() + 1);
    nodes.extend(depot);
    nodes.extend(&stops);
    let costs = dense_costs(&nodes, matrix)?;
    let tour = Tour {
        costs: &costs,
        depot: depot.map(|_| 0),
    };

    let first_stop = usize::from(depot.is_some());
    let mut order = tour.nearest_neighbor((first_stop..nodes.len()).collect());
    let improvements = local_search(&tour, &mut order, options);
    let total_cost = tour.cost(&order);

    Ok(Route {
        depot: depot.cloned(),
        stops: order.into_iter().map(|node| nodes[node].clone()).collect(),
        total_cost,
        improvements,
    })
}

/// Copies the required entries into a dense matrix, failing on any hole.
fn dense_costs(nodes: &[&LocationId], matrix: &CostMatrix) -> Result<Vec<Vec<f64>>, SolveError> {
    let mut costs = vec![vec![0.0; nodes.len()]; nodes.len()];
    for (i, from) in nodes.iter().enumerate() {
        for (j, to) in nodes.iter().enumerate() {
            if i == j {
                continue;
            }
            let cost = matrix.get(from, to).ok_or_else(|| SolveError::MissingCost {
                from: (*from).clone(),
                to: (*to).clone(),
            })?;
            if !cost.is_finite() || cost < 0.0 {
                return Err(SolveError::InvalidCost {
                    from: (*from).clone(),
                    to: (*to).clone(),
                    cost,
                });
            }
            costs[i][j] = cost;
        }
    }
    Ok(costs)
}

struct Tour<'a> {
    costs: &'a [Vec<f64>],
    depot: Option<usize>,
}

impl Tour<'_> {
    fn cost(&self, order: &[usize]) -> f64 {
        let Some((&first, &last)) = order.first().zip(order.last()) else {
            return 0.0;
        };
        let inner: f64 = order.windows(2).map(|pair| self.costs[pair[0]][pair[1]]).sum();
        match self.depot {
            Some(depot) => self.costs[depot][first] + inner + self.costs[last][depot],
            None => inner,
        }
    }

    /// Greedy construction; `pending` must be in id order.
    fn nearest_neighbor(&self, mut pending: Vec<usize>) -> Vec<usize> {
        let mut order = Vec::with_capacity(pending.len());
        let mut current = match self.depot {
            Some(depot) => depot,
            None if pending.is_empty() => return order,
            None => {
                let start = pending.remove(0);
                order.push(start);
                start
            }
        };

        while !pending.is_empty() {
            let mut best = 0;
            for slot in 1..pending.len() {
                if self.costs[current][pending[slot]] < self.costs[current][pending[best]] {
                    best = slot;
                }
            }
            current = pending.remove(best);
            order.push(current);
        }

        order
    }
}

/// 2-opt: reverse a segment of the route. Returns true on the first
/// improving move.
fn two_opt_improve(tour: &Tour<'_>, order: &mut [usize]) -> bool {
    let n = order.len();
    if n < 2 {
        return false;
    }
    let current_cost = tour.cost(order);
    let mut candidate = order.to_vec();

    for i in 0..n - 1 {
        for j in i + 1..n {
            candidate[i..=j].reverse();
            if tour.cost(&candidate) < current_cost - EPSILON {
                order.copy_from_slice(&candidate);
                return true;
            }
            candidate[i..=j].reverse();
        }
    }

    false
}

/// Relocate: move one stop to another position. Returns true on the first
/// improving move.
fn relocate_improve(tour: &Tour<'_>, order: &mut Vec<usize>) -> bool {
    let n = order.len();
    if n < 3 {
        return false;
    }
    let current_cost = tour.cost(order);

    for from in 0..n {
        for to in 0..n {
            if to == from {
                continue;
            }
            let mut candidate = order.clone();
            let stop = candidate.remove(from);
            candidate.insert(to, stop);
            if tour.cost(&candidate) < current_cost - EPSILON {
                *order = candidate;
                return true;
            }
        }
    }

    false
}

/// Runs local search until no move improves or the budget is spent.
/// Returns the number of accepted moves.
fn local_search(tour: &Tour<'_>, order: &mut Vec<usize>, options: &SolveOptions) -> usize {
    let started = Instant::now();
    let mut accepted = 0;

    for _ in 0..options.max_iterations {
        if started.elapsed() >= options.time_limit {
            break;
        }

        let mut improved = false;
        if two_opt_improve(tour, order) {
            accepted += 1;
            improved = true;
        }
        if relocate_improve(tour, order) {
            accepted += 1;
            improved = true;
        }

        if !improved {
            break;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<LocationId> {
        names.iter().map(|name| LocationId::new(*name)).collect()
    }

    /// Symmetric matrix from points on a line: cost = |x_a - x_b|.
    fn line_matrix(points: &[(&str, f64)]) -> CostMatrix {
        let mut matrix = CostMatrix::new();
        for (i, (a, xa)) in points.iter().enumerate() {
            for (b, xb) in &points[i + 1..] {
                matrix.insert_symmetric(LocationId::new(*a), LocationId::new(*b), (xa - xb).abs());
            }
        }
        matrix
    }

    #[test]
    fn test_open_path_on_a_line() {
        let matrix = line_matrix(&[("a", 0.0), ("b", 3.0), ("c", 1.0), ("d", 2.0)]);
        let cluster = Cluster::new(ids(&["d", "b", "a", "c"]));

        let route = solve(&cluster, None, &matrix, &SolveOptions::default()).unwrap();

        assert_eq!(route.stops, ids(&["a", "c", "d", "b"]));
        assert_eq!(route.total_cost, 3.0);
        assert!(route.depot.is_none());
    }

    #[test]
    fn test_closed_tour_from_depot() {
        let matrix = line_matrix(&[("depot", 0.0), ("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let cluster = Cluster::new(ids(&["c", "a", "b"]));
        let depot = LocationId::new("depot");

        let route = solve(&cluster, Some(&depot), &matrix, &SolveOptions::default()).unwrap();

        assert_eq!(route.total_cost, 6.0);
        let sequence: Vec<&LocationId> = route.sequence().collect();
        assert_eq!(sequence.len(), 5);
        assert_eq!(sequence.first(), Some(&&depot));
        assert_eq!(sequence.last(), Some(&&depot));
        assert_eq!(
            matrix.path_cost(Some(&depot), &route.stops).unwrap(),
            route.total_cost
        );
    }

    #[test]
    fn test_local_search_fixes_greedy_trap() {
        // Nearest neighbor starts at "a", heads right to "b" and then has to
        // cross back past "a" to reach "c".
        let matrix = line_matrix(&[("a", 0.0), ("b", 1.0), ("c", -1.1)]);
        let cluster = Cluster::new(ids(&["a", "b", "c"]));

        let route = solve(&cluster, None, &matrix, &SolveOptions::default()).unwrap();

        assert!((route.total_cost - 2.1).abs() < 1e-9, "cost {}", route.total_cost);
        assert_eq!(route.stops, ids(&["b", "a", "c"]));
        assert_eq!(route.improvements, 1);
    }

    #[test]
    fn test_missing_entry_is_fatal() {
        let mut matrix = line_matrix(&[("a", 0.0), ("b", 1.0)]);
        matrix.insert(LocationId::new("a"), LocationId::new("c"), 2.0);
        let cluster = Cluster::new(ids(&["a", "b", "c"]));

        let err = solve(&cluster, None, &matrix, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, SolveError::MissingCost { .. }));
    }

    #[test]
    fn test_negative_cost_is_rejected() {
        let mut matrix = CostMatrix::new();
        matrix.insert_symmetric(LocationId::new("a"), LocationId::new("b"), -4.0);
        let cluster = Cluster::new(ids(&["a", "b"]));

        let err = solve(&cluster, None, &matrix, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, SolveError::InvalidCost { cost, .. } if cost == -4.0));
    }

    #[test]
    fn test_over_capacity_is_fatal() {
        let matrix = line_matrix(&[("a", 0.0), ("b", 1.0), ("c", 2.0)]);
        let cluster = Cluster::new(ids(&["a", "b", "c"]));
        let options = SolveOptions {
            vehicle_capacity: Some(2),
            ..Default::default()
        };

        assert_eq!(
            solve(&cluster, None, &matrix, &options),
            Err(SolveError::OverCapacity {
                size: 3,
                capacity: 2
            })
        );
    }

    #[test]
    fn test_duplicate_stop_is_rejected() {
        let matrix = line_matrix(&[("a", 0.0), ("b", 1.0)]);
        let cluster = Cluster::new(ids(&["a", "b", "a"]));

        assert_eq!(
            solve(&cluster, None, &matrix, &SolveOptions::default()),
            Err(SolveError::DuplicateStop(LocationId::new("a")))
        );
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let mut matrix = CostMatrix::new();
        for (a, b) in [("a", "b"), ("a", "c"), ("b", "c")] {
            matrix.insert_symmetric(LocationId::new(a), LocationId::new(b), 1.0);
        }
        let cluster = Cluster::new(ids(&["c", "b", "a"]));

        let route = solve(&cluster, None, &matrix, &SolveOptions::default()).unwrap();
        assert_eq!(route.stops, ids(&["a", "b", "c"]));
        assert_eq!(route.improvements, 0);
    }

    #[test]
    fn test_empty_and_single_clusters() {
        let matrix = CostMatrix::new();
        let depot = LocationId::new("depot");

        let empty = solve(
            &Cluster::new(Vec::new()),
            Some(&depot),
            &matrix,
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(empty.stops.is_empty());
        assert_eq!(empty.total_cost, 0.0);

        let single = solve(&Cluster::new(ids(&["a"])), None, &matrix, &SolveOptions::default())
            .unwrap();
        assert_eq!(single.stops, ids(&["a"]));
        assert_eq!(single.total_cost, 0.0);
    }

    #[test]
    fn test_spent_time_limit_returns_constructed_route() {
        // Same instance as the greedy trap; no time means no repair.
        let matrix = line_matrix(&[("a", 0.0), ("b", 1.0), ("c", -1.1)]);
        let cluster = Cluster::new(ids(&["a", "b", "c"]));
        let options = SolveOptions {
            time_limit: Duration::ZERO,
            ..Default::default()
        };

        let route = solve(&cluster, None, &matrix, &options).unwrap();

        assert_eq!(route.stops, ids(&["a", "b", "c"]));
        assert_eq!(route.improvements, 0);
        assert!((route.total_cost - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_zero_budget_returns_constructed_route() {
        let matrix = line_matrix(&[("a", 0.0), ("b", 3.0), ("c", 1.0), ("d", 2.0)]);
        let cluster = Cluster::new(ids(&["a", "b", "c", "d"]));
        let options = SolveOptions {
            max_iterations: 0,
            ..Default::default()
        };

        let route = solve(&cluster, None, &matrix, &options).unwrap();
        assert_eq!(route.improvements, 0);
        assert_eq!(route.stops.len(), 4);
    }

    #[test]
    fn test_path_cost_reports_missing_leg() {
        let matrix = line_matrix(&[("a", 0.0), ("b", 1.0)]);
        let depot = LocationId::new("depot");
        assert!(matches!(
            matrix.path_cost(Some(&depot), &ids(&["a", "b"])),
            Err(SolveError::MissingCost { .. })
        ));
        assert_eq!(matrix.path_cost(None, &ids(&["a", "b"])).unwrap(), 1.0);
    }
}
