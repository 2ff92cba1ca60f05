//! Tagged cell states for radar fields.

use serde::{Deserialize, Serialize};

/// Tolerance used when matching raw values against numeric sentinels.
const SENTINEL_TOLERANCE: f32 = 1e-3;

/// State of a single grid cell.
///
/// Radar composites distinguish "the radar saw nothing" from "nobody
/// looked" and from "this point is not covered by the source grid at all".
/// Keeping these as tags avoids collisions with legitimate data values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Cell {
    /// A measured value.
    Value(f32),
    /// The sensor reported no echo.
    Undetect,
    /// No measurement is available.
    Missing,
    /// Outside the coverage of the source grid.
    Unmapped,
}

impl Cell {
    /// The measured value, if any.
    #[inline]
    pub fn value(self) -> Option<f32> {
        match self {
            Cell::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True for a measured value.
    #[inline]
    pub fn is_value(self) -> bool {
        matches!(self, Cell::Value(_))
    }

    /// True for `Missing` and `Unmapped`, the states that carry no information
    /// about precipitation at all.
    #[inline]
    pub fn is_void(self) -> bool {
        matches!(self, Cell::Missing | Cell::Unmapped)
    }

    /// Magnitude where "no echo" counts as zero.
    ///
    /// This is the reading used for precipitation rates and quality weights.
    #[inline]
    pub fn magnitude(self) -> Option<f32> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Undetect => Some(0.0),
            Cell::Missing | Cell::Unmapped => None,
        }
    }

    /// Apply `f` to a measured value, leaving sentinel states untouched.
    #[inline]
    pub fn map_value(self, f: impl FnOnce(f32) -> f32) -> Cell {
        match self {
            Cell::Value(v) => Cell::Value(f(v)),
            other => other,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Missing
    }
}

impl From<f32> for Cell {
    fn from(v: f32) -> Self {
        Cell::Value(v)
    }
}

/// Numeric sentinels used when fields cross a raw `f32` boundary
/// (file readers and writers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentinels {
    pub missing: f32,
    pub undetect: f32,
    pub unmapped: f32,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            missing: -9999.0,
            undetect: -3333.0,
            unmapped: -9999.0,
        }
    }
}

impl Sentinels {
    /// Decode a raw value. NaN is read as missing.
    pub fn decode(&self, raw: f32) -> Cell {
        if raw.is_nan() || (raw - self.missing).abs() < SENTINEL_TOLERANCE {
            Cell::Missing
        } else if (raw - self.undetect).abs() < SENTINEL_TOLERANCE {
            Cell::Undetect
        } else if (raw - self.unmapped).abs() < SENTINEL_TOLERANCE {
            Cell::Unmapped
        } else {
            Cell::Value(raw)
        }
    }

    /// Encode a cell as a raw value.
    pub fn encode(&self, cell: Cell) -> f32 {
        match cell {
            Cell::Value(v) => v,
            Cell::Undetect => self.undetect,
            Cell::Missing => self.missing,
            Cell::Unmapped => self.unmapped,
        }
    }
}
