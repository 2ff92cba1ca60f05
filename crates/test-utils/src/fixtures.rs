//! Common test fixtures for radar processing tests.
//!
//! This module provides pre-defined domains and times that represent
//! common scenarios in radar mosaic processing.

/// Common domains for testing, as `[lon_min, lon_max, lat_min, lat_max]`.
pub mod extent {
    /// A small domain over southern Quebec
    pub const QUEBEC: [f64; 4] = [-76.0, -70.0, 44.0, 48.0];
}

/// Common grid specifications for testing.
pub mod grid {
    /// Coarse stand-in for a radar composite grid (0.05 degree)
    pub const COMPOSITE: GridSpec = GridSpec {
        width: 40,
        height: 30,
        lat0: 45.0,
        lon0: -75.0,
        resolution: 0.05,
    };

    /// Coarser model-like grid over the same area (0.1 degree)
    pub const MODEL: GridSpec = GridSpec {
        width: 20,
        height: 15,
        lat0: 45.025,
        lon0: -74.975,
        resolution: 0.1,
    };

    /// Regular grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub lat0: f64,
        pub lon0: f64,
        pub resolution: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Builds the lat/lon grid.
        pub fn build(&self) -> radar_common::LatLonGrid {
            crate::create_latlon_grid(self.lat0, self.lon0, self.resolution, self.width, self.height)
        }
    }
}

/// Common time values for testing.
pub mod time {
    use chrono::{DateTime, TimeZone, Utc};

    /// File name recipe used by test composites
    pub const RECIPE: &str = "%Y%m%d/qcomp_%Y%m%d%H%M.json";

    /// `2024-07-01 hh:mm` UTC.
    pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, minute, 0)
            .single()
            .expect("valid fixture time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_specs() {
        assert_eq!(grid::COMPOSITE.size(), 1200);
        assert_eq!(grid::MODEL.build().shape(), (15, 20));
    }

    #[test]
    fn test_reference_time() {
        assert_eq!(time::at(16, 0).to_rfc3339(), "2024-07-01T16:00:00+00:00");
    }
}
