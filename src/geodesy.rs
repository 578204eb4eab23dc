//! Great-circle distance and bearing primitives
//!
//! All functions take angles in radians at the math boundary; callers convert
//! degrees with `f64::to_radians` at the call site. Distances come back as
//! central angles in radians until scaled by the Earth radius.

/// Mean Earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle central angle between two points, in radians.
///
/// Haversine form, numerically stable for the short gaps between consecutive
/// track points.
pub fn gcdist(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = lat2 - lat1;
    let delta_lon = lon2 - lon1;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Scale a central angle in radians to meters on the spherical Earth.
#[inline]
pub fn radians_to_meters(radians: f64) -> f64 {
    radians * EARTH_RADIUS_M
}

/// Great-circle distance between two points in meters.
#[inline]
pub fn gcdist_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    radians_to_meters(gcdist(lat1, lon1, lat2, lon2))
}

/// Initial true bearing from the first point towards the second, in degrees
/// normalized to [0, 360).
pub fn heading_true_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lon = lon2 - lon1;
    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    let degrees = y.atan2(x).to_degrees();
    // atan2 yields (-180, 180]; fold into [0, 360)
    (degrees + 360.0) % 360.0
}
