//! Great-circle distance utilities
//!
//! Haversine distances between (lat, lon) pairs so the allocation solver
//! can penalize far-away depots.

/// Mean Earth radius in km (WGS-84).
const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in km between two points.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Build a depots × zones distance matrix (values in km).
///
/// `matrix[i][j]` is the distance from depot `i` to zone `j`.
pub fn distance_matrix(depots: &[(f64, f64)], zones: &[(f64, f64)]) -> Vec<Vec<f64>> {
    depots
        .iter()
        .map(|&(dlat, dlon)| {
            zones
                .iter()
                .map(|&(zlat, zlon)| haversine(dlat, dlon, zlat, zlon))
                .collect()
        })
        .collect()
}
