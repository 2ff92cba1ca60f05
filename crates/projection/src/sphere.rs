//! Spherical Earth geometry.
//!
//! Radar composites span at most a few thousand kilometres, so a spherical
//! Earth with the mean radius is accurate enough for neighbour searches and
//! great-circle extrapolation.

use nalgebra::Vector3;
use std::f64::consts::PI;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const TO_RAD: f64 = PI / 180.0;
const TO_DEG: f64 = 180.0 / PI;

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Position on the unit sphere.
    pub fn to_xyz(self) -> Vector3<f64> {
        lat_lon_to_xyz(self.lat, self.lon)
    }

    /// Point for a position on (or near) the unit sphere.
    pub fn from_xyz(v: &Vector3<f64>) -> Self {
        let (lat, lon) = xyz_to_lat_lon(v);
        Self { lat, lon }
    }
}

/// Wrap a longitude into `[-180, 180)`.
#[inline]
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Wrap every longitude of a slice into `[-180, 180)`.
pub fn normalize_longitudes(lons: &mut [f64]) {
    for lon in lons.iter_mut() {
        *lon = normalize_longitude(*lon);
    }
}

/// Convert lat/lon in degrees to a unit vector.
///
/// x points at (0N, 0E), y at (0N, 90E), z at the north pole.
#[inline]
pub fn lat_lon_to_xyz(lat: f64, lon: f64) -> Vector3<f64> {
    let (phi, lambda) = (lat * TO_RAD, lon * TO_RAD);
    Vector3::new(
        phi.cos() * lambda.cos(),
        phi.cos() * lambda.sin(),
        phi.sin(),
    )
}

/// Convert a vector to lat/lon in degrees. The vector need not be normalised.
pub fn xyz_to_lat_lon(v: &Vector3<f64>) -> (f64, f64) {
    let horizontal = (v.x * v.x + v.y * v.y).sqrt();
    let lat = v.z.atan2(horizontal) * TO_DEG;
    let lon = normalize_longitude(v.y.atan2(v.x) * TO_DEG);
    (lat, lon)
}

/// Great-circle distance in km (haversine).
pub fn great_circle_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (phi1, phi2) = (a.lat * TO_RAD, b.lat * TO_RAD);
    let dphi = phi2 - phi1;
    let dlambda = (b.lon - a.lon) * TO_RAD;
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Chord length on the unit sphere for a great-circle distance in km.
///
/// Neighbour searches run in xyz space, where distances are chords.
#[inline]
pub fn chord_for_distance_km(distance_km: f64) -> f64 {
    let angle = (distance_km / EARTH_RADIUS_KM).min(PI);
    2.0 * (angle / 2.0).sin()
}

/// Great-circle distance in km for a chord on the unit sphere.
#[inline]
pub fn distance_km_for_chord(chord: f64) -> f64 {
    2.0 * EARTH_RADIUS_KM * (chord / 2.0).clamp(0.0, 1.0).asin()
}
