//! Pickup points around Singapore.
//!
//! Tampines and Jurong West sit roughly 26 km apart, far beyond the default
//! 3 km clustering radius, so points drawn from the two regions never share
//! a cluster.

use pickup_planner::Location;

/// Centre of the Tampines pickup grid.
pub const TAMPINES: (f64, f64) = (1.3530, 103.9440);
/// Centre of the Jurong West pickup grid.
pub const JURONG_WEST: (f64, f64) = (1.3400, 103.7050);
/// Grid spacing, about 220 m.
pub const GRID_STEP: f64 = 0.002;

pub fn stop(id: &str, lat: f64, lng: f64) -> Location {
    Location::new(id, format!("Pickup {id}"), lat, lng).expect("valid fixture location")
}

/// The school every route starts and ends at.
pub fn school() -> Location {
    Location::new("school", "Tampines Secondary School", 1.3546, 103.9437)
        .expect("valid fixture location")
}

/// Three pickups within 50 m of each other.
pub fn tight_trio() -> Vec<Location> {
    vec![
        stop("blk-101", 1.3530, 103.9440),
        stop("blk-102", 1.3532, 103.9441),
        stop("blk-103", 1.3531, 103.9443),
    ]
}

/// `count` pickups laid out on a five-column grid around `centre`.
///
/// Ids are `{prefix}-00`, `{prefix}-01`, ... so they sort in grid order.
pub fn grid(prefix: &str, centre: (f64, f64), count: usize) -> Vec<Location> {
    (0..count)
        .map(|i| {
            let row = (i / 5) as f64;
            let col = (i % 5) as f64;
            stop(
                &format!("{prefix}-{i:02}"),
                centre.0 + row * GRID_STEP,
                centre.1 + col * GRID_STEP,
            )
        })
        .collect()
}

/// 45 pickups: 23 in Tampines and 22 in Jurong West.
pub fn two_regions() -> Vec<Location> {
    let mut locations = grid("tam", TAMPINES, 23);
    locations.extend(grid("jw", JURONG_WEST, 22));
    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_regions_count() {
        assert_eq!(two_regions().len(), 45);
    }

    #[test]
    fn test_coordinates_in_singapore() {
        for location in two_regions().into_iter().chain(tight_trio()).chain([school()]) {
            assert!(location.lat() > 1.2 && location.lat() < 1.5, "{} lat", location.id());
            assert!(location.lng() > 103.6 && location.lng() < 104.1, "{} lng", location.id());
        }
    }
}
