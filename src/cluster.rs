//! Density-based grouping of pickup points into vehicle-sized clusters.
//!
//! DBSCAN finds the natural groups; capacity is enforced afterwards.
//! Groups larger than a vehicle are cut along a nearest-neighbor chain so
//! each piece stays spatially contiguous, and noise points join the
//! nearest cluster that still has room. No point is ever dropped.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClusterError;
use crate::haversine::haversine_km;
use crate::location::{Location, LocationId};

/// Locations that share one vehicle. Member order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    members: Vec<LocationId>,
}

impl Cluster {
    pub fn new(members: Vec<LocationId>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[LocationId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOptions {
    /// Neighborhood radius in kilometers.
    pub eps_km: f64,
    /// Neighbors (including the point itself) needed for a dense point.
    pub min_points: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            eps_km: 3.0,
            min_points: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Clusterer {
    options: ClusterOptions,
}

impl Clusterer {
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Partitions `locations` into clusters of at most `capacity` members.
    ///
    /// Deterministic for a fixed input order.
    pub fn cluster(
        &self,
        locations: &[Location],
        capacity: usize,
    ) -> Result<Vec<Cluster>, ClusterError> {
        self.partition(locations, capacity).map(|partition| partition.clusters)
    }

    /// Same as [`Self::cluster`], also keeping the dense groups and noise
    /// points density clustering found before capacity was enforced.
    pub fn partition(
        &self,
        locations: &[Location],
        capacity: usize,
    ) -> Result<Partition, ClusterError> {
        if capacity == 0 {
            return Err(ClusterError::ZeroCapacity);
        }
        if locations.is_empty() {
            return Ok(Partition::default());
        }
        let to_cluster = |group: &[usize]| {
            Cluster::new(group.iter().map(|&i| locations[i].id().clone()).collect())
        };

        let coords: Vec<(f64, f64)> = locations.iter().map(Location::coords).collect();
        let labels = dbscan(&coords, self.options.eps_km, self.options.min_points);

        let mut dense: Vec<Vec<usize>> = Vec::new();
        let mut noise = Vec::new();
        for (index, label) in labels.iter().enumerate() {
            match label {
                Label::Member(cluster) => {
                    if dense.len() <= *cluster {
                        dense.resize_with(cluster + 1, Vec::new);
                    }
                    dense[*cluster].push(index);
                }
                _ => noise.push(index),
            }
        }
        debug!(
            dense_groups = dense.len(),
            noise = noise.len(),
            "density clustering finished"
        );

        let dense_groups: Vec<Cluster> = dense.iter().map(|group| to_cluster(group)).collect();
        let noise_ids: Vec<LocationId> = noise.iter().map(|&i| locations[i].id().clone()).collect();

        let mut groups: Vec<Vec<usize>> = Vec::new();
        for group in dense {
            if group.len() <= capacity {
                groups.push(group);
            } else {
                let chain = chain_order(&group, locations);
                groups.extend(balanced_chunks(chain, capacity));
            }
        }

        let mut centroids: Vec<Centroid> = groups
            .iter()
            .map(|group| Centroid::of(group.iter().map(|&i| coords[i])))
            .collect();

        for index in noise {
            let point = coords[index];
            let nearest = groups
                .iter()
                .zip(&centroids)
                .enumerate()
                .filter(|(_, (group, _))| group.len() < capacity)
                .map(|(slot, (_, centroid))| (slot, haversine_km(point, centroid.position())))
                .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                    Some(current) if current.1 <= candidate.1 => Some(current),
                    _ => Some(candidate),
                });

            match nearest {
                Some((slot, _)) => {
                    groups[slot].push(index);
                    centroids[slot].add(point);
                }
                None => {
                    groups.push(vec![index]);
                    centroids.push(Centroid::of([point]));
                }
            }
        }

        Ok(Partition {
            clusters: groups.iter().map(|group| to_cluster(group)).collect(),
            dense_groups,
            noise: noise_ids,
        })
    }
}

/// Full outcome of [`Clusterer::partition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Capacity-feasible clusters covering every location.
    pub clusters: Vec<Cluster>,
    /// Groups as density clustering found them, before splitting and noise
    /// assignment.
    pub dense_groups: Vec<Cluster>,
    /// Points in no dense group.
    pub noise: Vec<LocationId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Member(usize),
}

fn dbscan(coords: &[(f64, f64)], eps_km: f64, min_points: usize) -> Vec<Label> {
    let mut labels = vec![Label::Unvisited; coords.len()];
    let mut next_cluster = 0;

    for point in 0..coords.len() {
        if labels[point] != Label::Unvisited {
            continue;
        }
        let neighbors = region_query(coords, point, eps_km);
        if neighbors.len() < min_points {
            labels[point] = Label::Noise;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[point] = Label::Member(cluster);

        let mut frontier: VecDeque<usize> = neighbors.into();
        while let Some(candidate) = frontier.pop_front() {
            match labels[candidate] {
                // Border point: reachable but not dense itself.
                Label::Noise => labels[candidate] = Label::Member(cluster),
                Label::Unvisited => {
                    labels[candidate] = Label::Member(cluster);
                    let reach = region_query(coords, candidate, eps_km);
                    if reach.len() >= min_points {
                        frontier.extend(reach);
                    }
                }
                Label::Member(_) => {}
            }
        }
    }

    labels
}

fn region_query(coords: &[(f64, f64)], point: usize, eps_km: f64) -> Vec<usize> {
    coords
        .iter()
        .enumerate()
        .filter(|(_, other)| haversine_km(coords[point], **other) <= eps_km)
        .map(|(index, _)| index)
        .collect()
}

/// Orders a group into a nearest-neighbor chain starting at its lowest id.
fn chain_order(group: &[usize], locations: &[Location]) -> Vec<usize> {
    let mut remaining: Vec<usize> = group.to_vec();
    remaining.sort_by(|a, b| locations[*a].id().cmp(locations[*b].id()));

    let mut chain = Vec::with_capacity(remaining.len());
    let mut current = remaining.remove(0);
    chain.push(current);

    while !remaining.is_empty() {
        let from = locations[current].coords();
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        // `remaining` is id-sorted, so strict `<` keeps the lowest id on ties.
        for (slot, &candidate) in remaining.iter().enumerate() {
            let distance = haversine_km(from, locations[candidate].coords());
            if distance < best_distance {
                best = slot;
                best_distance = distance;
            }
        }
        current = remaining.remove(best);
        chain.push(current);
    }

    chain
}

/// Cuts `items` into `ceil(len / capacity)` contiguous pieces whose sizes
/// differ by at most one.
fn balanced_chunks(items: Vec<usize>, capacity: usize) -> Vec<Vec<usize>> {
    let pieces = items.len().div_ceil(capacity);
    let base = items.len() / pieces;
    let extra = items.len() % pieces;

    let mut chunks = Vec::with_capacity(pieces);
    let mut rest = items.into_iter();
    for piece in 0..pieces {
        let size = base + usize::from(piece < extra);
        chunks.push(rest.by_ref().take(size).collect());
    }
    chunks
}

#[derive(Debug, Clone, Copy, Default)]
struct Centroid {
    lat_sum: f64,
    lng_sum: f64,
    count: usize,
}

impl Centroid {
    fn of(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut centroid = Self::default();
        for point in points {
            centroid.add(point);
        }
        centroid
    }

    fn add(&mut self, (lat, lng): (f64, f64)) {
        self.lat_sum += lat;
        self.lng_sum += lng;
        self.count += 1;
    }

    fn position(&self) -> (f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0);
        }
        let count = self.count as f64;
        (self.lat_sum / count, self.lng_sum / count)
    }
}

/// Dense groups whose centroids are on average farther apart than this get
/// a vehicle of their own.
pub const FAR_APART_KM: f64 = 7.0;

/// Shape of one cluster, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub index: usize,
    pub size: usize,
    pub centroid: (f64, f64),
    /// Largest pairwise great-circle distance between members.
    pub spread_km: f64,
    pub distance_from_depot_km: Option<f64>,
}

/// How the dense groups sit relative to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// No dense group; every point is isolated.
    #[default]
    Spread,
    SingleGroup,
    /// Several groups close enough to share vehicles.
    Close,
    /// Several groups more than [`FAR_APART_KM`] apart on average.
    FarApart,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterAnalysis {
    pub clusters: Vec<ClusterSummary>,
    pub dense_groups: usize,
    /// Points density clustering left out of every group.
    pub noise: Vec<LocationId>,
    /// Mean great-circle distance between dense group centroids.
    pub mean_centroid_gap_km: f64,
    pub layout: Layout,
    /// Fleet lower bound: all points divided by vehicle capacity.
    pub min_vehicles: usize,
    /// Fleet size suggested by the layout. Far-apart groups never share a
    /// vehicle, so this can exceed `min_vehicles`.
    pub recommended_vehicles: usize,
}

/// Summarizes a partition of `locations`.
pub fn analyze(
    partition: &Partition,
    locations: &[Location],
    depot: Option<&Location>,
    capacity: usize,
) -> ClusterAnalysis {
    let by_id: HashMap<&LocationId, &Location> =
        locations.iter().map(|location| (location.id(), location)).collect();
    let points_of = |cluster: &Cluster| -> Vec<(f64, f64)> {
        cluster
            .members()
            .iter()
            .filter_map(|id| by_id.get(id).map(|location| location.coords()))
            .collect()
    };

    let summaries: Vec<ClusterSummary> = partition
        .clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| {
            let points = points_of(cluster);
            let centroid = Centroid::of(points.iter().copied()).position();

            let mut spread_km: f64 = 0.0;
            for (i, a) in points.iter().enumerate() {
                for b in &points[i + 1..] {
                    spread_km = spread_km.max(haversine_km(*a, *b));
                }
            }

            ClusterSummary {
                index,
                size: cluster.len(),
                centroid,
                spread_km,
                distance_from_depot_km: depot.map(|d| haversine_km(d.coords(), centroid)),
            }
        })
        .collect();

    let dense_centroids: Vec<(f64, f64)> = partition
        .dense_groups
        .iter()
        .map(|group| Centroid::of(points_of(group)).position())
        .collect();
    let mut gap_total = 0.0;
    let mut gap_count = 0usize;
    for (i, a) in dense_centroids.iter().enumerate() {
        for b in &dense_centroids[i + 1..] {
            gap_total += haversine_km(*a, *b);
            gap_count += 1;
        }
    }
    let mean_centroid_gap_km = if gap_count == 0 {
        0.0
    } else {
        gap_total / gap_count as f64
    };

    let layout = match partition.dense_groups.len() {
        0 => Layout::Spread,
        1 => Layout::SingleGroup,
        _ if mean_centroid_gap_km > FAR_APART_KM => Layout::FarApart,
        _ => Layout::Close,
    };

    let total: usize = partition.clusters.iter().map(Cluster::len).sum();
    let vehicles_for = |count: usize| {
        if capacity == 0 {
            0
        } else {
            count.div_ceil(capacity)
        }
    };
    let min_vehicles = vehicles_for(total);
    let recommended_vehicles = match layout {
        Layout::FarApart => {
            partition
                .dense_groups
                .iter()
                .map(|group| vehicles_for(group.len()))
                .sum::<usize>()
                + vehicles_for(partition.noise.len())
        }
        _ => min_vehicles,
    };

    ClusterAnalysis {
        clusters: summaries,
        dense_groups: partition.dense_groups.len(),
        noise: partition.noise.clone(),
        mean_centroid_gap_km,
        layout,
        min_vehicles,
        recommended_vehicles,
    }
}
