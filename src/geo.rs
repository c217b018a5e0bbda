//! Great-circle distance
//!
//! Geofencing for attendance sessions compares the Haversine distance
//! between the session's reference point and the submitted location against
//! the session radius.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Compute the great-circle distance between two points, in meters.
///
/// Uses the Haversine formula. The intermediate `a` term is clamped to 1.0
/// before the square roots: for near-antipodal points floating-point drift
/// can push it fractionally past 1, and `sqrt(1 - a)` must not go NaN.
pub fn distance_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
