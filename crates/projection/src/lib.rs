//! Geographic helpers on a spherical Earth.
//!
//! Everything here is plain math on `f64` degrees, with `nalgebra` for the
//! vector algebra.

pub mod beam;
pub mod extend;
pub mod range_az;
pub mod sphere;

pub use beam::{BeamModel, AUTHALIC_RADIUS_KM};
pub use extend::{lat_lon_extend, ExtendDistance};
pub use range_az::{lat_lon_range_az, polar_grid};
pub use sphere::{
    chord_for_distance_km, distance_km_for_chord, great_circle_distance_km, lat_lon_to_xyz,
    normalize_longitude, normalize_longitudes, xyz_to_lat_lon, GeoPoint, EARTH_RADIUS_KM,
};
