//! Reflectivity / precipitation-rate conversion.
//!
//! Uses the exponential drop-size law `Z = a * R^b`, so
//! `R = (10^(dBZ/10) / a)^(1/b)` and `dBZ = 10 log10(a) + 10 b log10(R)`.

use radar_common::{Cell, Field, RadarError, RadarResult};
use serde::{Deserialize, Serialize};

/// Rates below this magnitude (mm/h) convert back to `Undetect`.
pub const MIN_RATE: f32 = 1e-3;

/// Coefficients of a Z-R relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZrRelation {
    pub a: f64,
    pub b: f64,
}

impl Default for ZrRelation {
    /// The WSR-88D convective relation, `Z = 300 R^1.4`.
    fn default() -> Self {
        Self { a: 300.0, b: 1.4 }
    }
}

impl ZrRelation {
    pub fn new(a: f64, b: f64) -> RadarResult<Self> {
        let zr = Self { a, b };
        zr.validate()?;
        Ok(zr)
    }

    /// `Z = 200 R^1.6`.
    pub fn marshall_palmer() -> Self {
        Self { a: 200.0, b: 1.6 }
    }

    pub fn validate(&self) -> RadarResult<()> {
        if !(self.a.is_finite() && self.a > 0.0 && self.b.is_finite() && self.b > 0.0) {
            return Err(RadarError::invalid_config(format!(
                "Z-R coefficients must be positive, got a={} b={}",
                self.a, self.b
            )));
        }
        Ok(())
    }

    /// Precipitation rate (mm/h) for a reflectivity in dBZ.
    #[inline]
    pub fn dbz_to_rate(&self, dbz: f32) -> f32 {
        let z = 10f64.powf(dbz as f64 / 10.0);
        (z / self.a).powf(1.0 / self.b) as f32
    }

    /// Reflectivity in dBZ for a positive rate in mm/h.
    #[inline]
    pub fn rate_to_dbz(&self, rate: f32) -> f32 {
        (10.0 * self.a.log10() + 10.0 * self.b * (rate as f64).log10()) as f32
    }

    /// Convert a reflectivity cell. `Undetect` becomes a zero rate.
    pub fn dbz_cell_to_rate(&self, cell: Cell) -> Cell {
        match cell {
            Cell::Value(dbz) => Cell::Value(self.dbz_to_rate(dbz)),
            Cell::Undetect => Cell::Value(0.0),
            other => other,
        }
    }

    /// Convert a rate cell. Near-zero rates become `Undetect`, negative
    /// rates `Missing`.
    pub fn rate_cell_to_dbz(&self, cell: Cell) -> Cell {
        match cell {
            Cell::Value(r) if r.abs() < MIN_RATE => Cell::Undetect,
            Cell::Value(r) if r < 0.0 || !r.is_finite() => Cell::Missing,
            Cell::Value(r) => Cell::Value(self.rate_to_dbz(r)),
            other => other,
        }
    }

    pub fn dbz_field_to_rate(&self, dbz: &Field) -> Field {
        dbz.map(|c| self.dbz_cell_to_rate(c))
    }

    pub fn rate_field_to_dbz(&self, rate: &Field) -> Field {
        rate.map(|c| self.rate_cell_to_dbz(c))
    }
}
