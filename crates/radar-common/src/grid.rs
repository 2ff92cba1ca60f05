//! Lat/lon grids.

use crate::error::{RadarError, RadarResult};
use projection::{lat_lon_extend, normalize_longitude, polar_grid, ExtendDistance, GeoPoint};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Co-located 2-D latitude and longitude arrays, row-major, in degrees.
///
/// Longitudes are normalised to `[-180, 180)` on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    nrows: usize,
    ncols: usize,
    lat: Vec<f64>,
    lon: Vec<f64>,
}

impl LatLonGrid {
    /// Create a grid from coordinate arrays.
    pub fn new(nrows: usize, ncols: usize, lat: Vec<f64>, mut lon: Vec<f64>) -> RadarResult<Self> {
        let n = nrows * ncols;
        if n == 0 {
            return Err(RadarError::invalid_config("grid must have at least one point"));
        }
        if lat.len() != n || lon.len() != n {
            return Err(RadarError::invalid_config(format!(
                "grid of shape ({}, {}) needs {} coordinates, got {} lat / {} lon",
                nrows,
                ncols,
                n,
                lat.len(),
                lon.len()
            )));
        }
        if lat.iter().any(|v| !v.is_finite() || v.abs() > 90.0) {
            return Err(RadarError::invalid_config("latitudes must be finite and within [-90, 90]"));
        }
        if lon.iter().any(|v| !v.is_finite()) {
            return Err(RadarError::invalid_config("longitudes must be finite"));
        }
        projection::normalize_longitudes(&mut lon);
        Ok(Self {
            nrows,
            ncols,
            lat,
            lon,
        })
    }

    /// Regular lat/lon grid. Row `r`, column `c` sits at
    /// `(lat0 + r * dlat, lon0 + c * dlon)`.
    pub fn regular(
        lat0: f64,
        lon0: f64,
        dlat: f64,
        dlon: f64,
        nrows: usize,
        ncols: usize,
    ) -> RadarResult<Self> {
        let mut lat = Vec::with_capacity(nrows * ncols);
        let mut lon = Vec::with_capacity(nrows * ncols);
        for r in 0..nrows {
            for c in 0..ncols {
                lat.push(lat0 + r as f64 * dlat);
                lon.push(lon0 + c as f64 * dlon);
            }
        }
        Self::new(nrows, ncols, lat, lon)
    }

    /// North-up display raster covering `[lon_min, lon_max, lat_min, lat_max]`
    /// with `(nx, ny)` pixels. Coordinates are pixel centres; row 0 is the
    /// northernmost row.
    pub fn from_extent(extent: [f64; 4], image_res: (usize, usize)) -> RadarResult<Self> {
        let [lon_min, lon_max, lat_min, lat_max] = extent;
        let (nx, ny) = image_res;
        if lon_max <= lon_min || lat_max <= lat_min {
            return Err(RadarError::invalid_config(format!(
                "extent {:?} must be [lon_min, lon_max, lat_min, lat_max] with min < max",
                extent
            )));
        }
        if nx == 0 || ny == 0 {
            return Err(RadarError::invalid_config("image resolution must be non-zero"));
        }
        let dx = (lon_max - lon_min) / nx as f64;
        let dy = (lat_max - lat_min) / ny as f64;
        Self::regular(lat_max - dy / 2.0, lon_min + dx / 2.0, -dy, dx, ny, nx)
    }

    /// Polar grid around a radar site, one row per azimuth.
    pub fn polar(site: GeoPoint, ranges_km: &[f64], azimuths_deg: &[f64]) -> RadarResult<Self> {
        let (lat, lon) = polar_grid(site, ranges_km, azimuths_deg);
        Self::new(azimuths_deg.len(), ranges_km.len(), lat, lon)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    /// Point at flat (row-major) index `idx`.
    #[inline]
    pub fn point(&self, idx: usize) -> GeoPoint {
        GeoPoint::new(self.lat[idx], self.lon[idx])
    }

    /// Content hash of the shape and the exact coordinate bits.
    ///
    /// Two grids built from the same coordinates share a fingerprint, which
    /// makes it usable as a cache key for projection indices.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.nrows.hash(&mut hasher);
        self.ncols.hash(&mut hasher);
        for v in self.lat.iter().chain(&self.lon) {
            v.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// The grid surrounded by one extra ring of cells, shape
    /// `(nrows + 2, ncols + 2)`.
    pub fn with_ring(&self, distance: ExtendDistance) -> LatLonGrid {
        self.extended(true, true, distance)
    }

    /// The grid padded by one cell on both sides of the selected axes.
    ///
    /// Padding points continue the great circle from the adjacent interior
    /// cells outward, by a full or half cell. Along an axis with a single
    /// cell the padding coincides with the edge.
    pub fn extended(&self, pad_rows: bool, pad_cols: bool, distance: ExtendDistance) -> LatLonGrid {
        let (n, m) = (self.nrows as i64, self.ncols as i64);
        let (pr, pc) = (pad_rows as i64, pad_cols as i64);
        let (nr, nc) = ((n + 2 * pr) as usize, (m + 2 * pc) as usize);
        let mut lat = Vec::with_capacity(nr * nc);
        let mut lon = Vec::with_capacity(nr * nc);

        for big_r in 0..nr as i64 {
            for big_c in 0..nc as i64 {
                let (r, c) = (big_r - pr, big_c - pc);
                let (er, ec) = (r.clamp(0, n - 1), c.clamp(0, m - 1));
                let edge = self.point((er * m + ec) as usize);
                let p = if (er, ec) == (r, c) {
                    edge
                } else {
                    let (dr, dc) = (r - er, c - ec);
                    let (ir, ic) = ((er - dr).clamp(0, n - 1), (ec - dc).clamp(0, m - 1));
                    let inward = self.point((ir * m + ic) as usize);
                    lat_lon_extend(inward, edge, distance)
                };
                lat.push(p.lat);
                lon.push(normalize_longitude(p.lon));
            }
        }

        LatLonGrid {
            nrows: nr,
            ncols: nc,
            lat,
            lon,
        }
    }

    /// Closed polygon around the domain, half a cell outside the outermost
    /// cell centres, walking clockwise from the first corner.
    pub fn border_polygon(&self) -> Vec<GeoPoint> {
        let ring = self.with_ring(ExtendDistance::Half);
        let (nr, nc) = ring.shape();
        let mut out = Vec::with_capacity(2 * (nr + nc));

        for c in 0..nc {
            out.push(ring.point(c));
        }
        for r in 1..nr {
            out.push(ring.point(r * nc + nc - 1));
        }
        for c in (0..nc - 1).rev() {
            out.push(ring.point((nr - 1) * nc + c));
        }
        for r in (0..nr - 1).rev() {
            out.push(ring.point(r * nc));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_longitudes() {
        let g = LatLonGrid::new(1, 2, vec![10.0, 10.0], vec![190.0, 359.5]).unwrap();
        assert!((g.lon()[0] - -170.0).abs() < 1e-12);
        assert!((g.lon()[1] - -0.5).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(LatLonGrid::new(2, 2, vec![0.0; 3], vec![0.0; 4]).is_err());
        assert!(LatLonGrid::new(1, 1, vec![95.0], vec![0.0]).is_err());
        assert!(LatLonGrid::new(1, 1, vec![f64::NAN], vec![0.0]).is_err());
        assert!(LatLonGrid::new(0, 3, vec![], vec![]).is_err());
    }

    #[test]
    fn test_from_extent_is_north_up() {
        let g = LatLonGrid::from_extent([-80.0, -70.0, 40.0, 50.0], (10, 5)).unwrap();
        assert_eq!(g.shape(), (5, 10));
        assert!((g.lat()[0] - 49.0).abs() < 1e-12);
        assert!((g.lon()[0] - -79.5).abs() < 1e-12);
        assert!((g.lat()[49] - 41.0).abs() < 1e-12);
        assert!((g.lon()[49] - -70.5).abs() < 1e-12);
        assert!(LatLonGrid::from_extent([-70.0, -80.0, 40.0, 50.0], (10, 5)).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = LatLonGrid::regular(45.0, -75.0, 0.1, 0.1, 4, 4).unwrap();
        let b = LatLonGrid::regular(45.0, -75.0, 0.1, 0.1, 4, 4).unwrap();
        let c = LatLonGrid::regular(45.0, -75.0, 0.1, 0.1001, 4, 4).unwrap();
        let d = LatLonGrid::regular(45.0, -75.0, 0.1, 0.1, 2, 8).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_with_ring_extends_regular_grid() {
        let g = LatLonGrid::regular(0.0, 0.0, 1.0, 1.0, 3, 3).unwrap();
        let ring = g.with_ring(ExtendDistance::Full);
        assert_eq!(ring.shape(), (5, 5));
        // interior is unchanged
        assert!((ring.lat()[5 + 1] - 0.0).abs() < 1e-12);
        assert!((ring.lon()[5 + 1] - 0.0).abs() < 1e-12);
        // west of (0, 0) along the equator
        assert!((ring.lat()[5] - 0.0).abs() < 1e-9);
        assert!((ring.lon()[5] - -1.0).abs() < 1e-9);
        // south of (0, 0)
        assert!((ring.lat()[1] - -1.0).abs() < 1e-9);
        assert!((ring.lon()[1] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_extended_single_axis() {
        let g = LatLonGrid::regular(0.0, 0.0, 1.0, 1.0, 3, 3).unwrap();
        let ext = g.extended(false, true, ExtendDistance::Full);
        assert_eq!(ext.shape(), (3, 5));
        assert!((ext.lon()[0] - -1.0).abs() < 1e-9);
        assert!((ext.lon()[4] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_border_polygon_surrounds_domain() {
        let g = LatLonGrid::regular(0.0, 0.0, 1.0, 1.0, 3, 4).unwrap();
        let poly = g.border_polygon();
        // Perimeter of the 5 x 6 ring, plus the closing point
        assert_eq!(poly.len(), 2 * (5 + 6) - 4 + 1);
        assert_eq!(poly.first(), poly.last());
        let min_lat = poly.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
        let max_lon = poly.iter().map(|p| p.lon).fold(f64::NEG_INFINITY, f64::max);
        assert!((min_lat - -0.5).abs() < 1e-3);
        assert!((max_lon - 3.5).abs() < 1e-3);
    }

    #[test]
    fn test_polar_grid() {
        let g = LatLonGrid::polar(GeoPoint::new(45.0, -73.0), &[1.0, 2.0], &[0.0, 90.0, 180.0])
            .unwrap();
        assert_eq!(g.shape(), (3, 2));
    }
}
