//! Bearing, angle-difference, and great-circle distance.

/// Meters per degree of latitude, and of longitude at the equator.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Earth radius for the haversine distance, in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Compass bearing from a reference point to a target point, in degrees
/// [0, 360), 0 = true north, increasing clockwise.
///
/// Uses an equirectangular small-area approximation: the longitude delta is
/// scaled by the cosine of the mean latitude before `atan2`. Valid at the
/// scale of a single tactical area (a few km). The position-sector
/// thresholds are tuned against this approximation; do not swap in a true
/// great-circle initial bearing without retuning them.
pub fn bearing(ref_lon: f64, ref_lat: f64, target_lon: f64, target_lat: f64) -> f64 {
    let avg_lat = ((ref_lat + target_lat) / 2.0).to_radians();
    let dx = (target_lon - ref_lon) * METERS_PER_DEGREE * avg_lat.cos();
    let dy = (target_lat - ref_lat) * METERS_PER_DEGREE;
    dx.atan2(dy).to_degrees().rem_euclid(360.0)
}

/// Signed minimal angular difference between a bearing and a reference
/// direction, in degrees within [-180, 180).
pub fn angle_difference(bearing: f64, reference_direction: f64) -> f64 {
    (bearing - reference_direction + 180.0).rem_euclid(360.0) - 180.0
}

/// Haversine great-circle distance between two geographic points, meters.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}
