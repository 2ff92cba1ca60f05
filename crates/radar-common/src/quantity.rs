//! Physical quantities carried by radar fields.

use crate::error::RadarError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Quantity of a data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Equivalent reflectivity, dBZ.
    Reflectivity,
    /// Instantaneous precipitation rate, mm/h.
    PrecipRate,
    /// Precipitation depth over an interval, mm.
    Accumulation,
    /// Mean precipitation rate over an interval, mm/h.
    AvgPrecipRate,
}

impl Quantity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reflectivity => "reflectivity",
            Self::PrecipRate => "precip_rate",
            Self::Accumulation => "accumulation",
            Self::AvgPrecipRate => "avg_precip_rate",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Self::Reflectivity => "dBZ",
            Self::PrecipRate | Self::AvgPrecipRate => "mm/h",
            Self::Accumulation => "mm",
        }
    }

    /// True for quantities only produced by accumulations.
    pub fn is_accumulated(&self) -> bool {
        matches!(self, Self::Accumulation | Self::AvgPrecipRate)
    }
}

impl FromStr for Quantity {
    type Err = RadarError;

    /// Parse from string (case-insensitive). Short aliases used by the
    /// command line (`dbz`, `rate`, `accum`) are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reflectivity" | "dbz" => Ok(Self::Reflectivity),
            "precip_rate" | "precipitation" | "rate" | "mm/h" => Ok(Self::PrecipRate),
            "accumulation" | "accum" | "mm" => Ok(Self::Accumulation),
            "avg_precip_rate" | "avg_rate" => Ok(Self::AvgPrecipRate),
            other => Err(RadarError::UnsupportedQuantity(other.to_string())),
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!("DBZ".parse::<Quantity>().unwrap(), Quantity::Reflectivity);
        assert_eq!("precip_rate".parse::<Quantity>().unwrap(), Quantity::PrecipRate);
        assert_eq!("accum".parse::<Quantity>().unwrap(), Quantity::Accumulation);
        assert!(matches!(
            "velocity".parse::<Quantity>(),
            Err(RadarError::UnsupportedQuantity(_))
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for q in [
            Quantity::Reflectivity,
            Quantity::PrecipRate,
            Quantity::Accumulation,
            Quantity::AvgPrecipRate,
        ] {
            assert_eq!(q.to_string().parse::<Quantity>().unwrap(), q);
        }
    }
}
