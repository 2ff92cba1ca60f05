//! Common types shared by the radar crates: tagged cells, fields, lat/lon
//! grids, quantities, time helpers and the error type.

pub mod cell;
pub mod error;
pub mod field;
pub mod grid;
pub mod quantity;
pub mod time;

pub use cell::{Cell, Sentinels};
pub use error::{RadarError, RadarResult};
pub use field::Field;
pub use grid::LatLonGrid;
pub use quantity::Quantity;
pub use time::{floor_to_resolution, parse_time, time_range, PathTemplate};
