/// Mean Earth radius used for spherical projection.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Destination reached by travelling `distance_m` from (`lat_deg`, `lon_deg`)
/// along the initial `bearing_deg` (clockwise from true north) on a sphere.
///
/// Returned longitude is normalized to [-180, 180).
pub fn project(lat_deg: f64, lon_deg: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let lat1 = lat_deg.to_radians();
    let lon1 = lon_deg.to_radians();
    let bearing = bearing_deg.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), normalize_longitude(lon2.to_degrees()))
}

fn normalize_longitude(lon_deg: f64) -> f64 {
    (lon_deg + 180.0).rem_euclid(360.0) - 180.0
}
