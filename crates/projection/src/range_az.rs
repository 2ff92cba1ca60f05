//! Radar-centred coordinates: range and azimuth from a site.

use crate::sphere::{normalize_longitude, GeoPoint, EARTH_RADIUS_KM};
use std::f64::consts::PI;

const TO_RAD: f64 = PI / 180.0;
const TO_DEG: f64 = 180.0 / PI;

/// Destination point at `range_km` from `origin` along `azimuth_deg`
/// (clockwise from north).
pub fn lat_lon_range_az(origin: GeoPoint, range_km: f64, azimuth_deg: f64) -> GeoPoint {
    let delta = range_km / EARTH_RADIUS_KM;
    let theta = azimuth_deg * TO_RAD;
    let phi1 = origin.lat * TO_RAD;
    let lambda1 = origin.lon * TO_RAD;

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    GeoPoint::new(phi2 * TO_DEG, normalize_longitude(lambda2 * TO_DEG))
}

/// Coordinates of a polar radar grid, shape `(azimuths.len(), ranges.len())`
/// in row-major order. Returns `(lats, lons)`.
pub fn polar_grid(origin: GeoPoint, ranges_km: &[f64], azimuths_deg: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = ranges_km.len() * azimuths_deg.len();
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);
    for &az in azimuths_deg {
        for &r in ranges_km {
            let p = lat_lon_range_az(origin, r, az);
            lats.push(p.lat);
            lons.push(p.lon);
        }
    }
    (lats, lons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::great_circle_distance_km;

    #[test]
    fn test_due_north() {
        let p = lat_lon_range_az(GeoPoint::new(45.0, -75.0), 111.19492664455873, 0.0);
        assert!((p.lat - 46.0).abs() < 1e-9);
        assert!((p.lon - -75.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_is_preserved() {
        let origin = GeoPoint::new(46.5, -72.3);
        for az in [0.0, 45.0, 90.0, 200.0, 315.0] {
            let p = lat_lon_range_az(origin, 240.0, az);
            let d = great_circle_distance_km(origin, p);
            assert!((d - 240.0).abs() < 1e-6, "az {} gave {}", az, d);
        }
    }

    #[test]
    fn test_polar_grid_shape() {
        let (lats, lons) = polar_grid(GeoPoint::new(45.0, -73.0), &[0.5, 1.5, 2.5], &[0.0, 90.0]);
        assert_eq!(lats.len(), 6);
        assert_eq!(lons.len(), 6);
        // Second row is due east: latitude barely changes
        assert!((lats[3] - 45.0).abs() < 1e-3);
        assert!(lons[3] > -73.0);
    }
}
