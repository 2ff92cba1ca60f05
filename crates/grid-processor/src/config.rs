//! Resampling configuration.
//!
//! Callers describe what they want with [`ResampleOptions`] (loose, as it
//! comes from a config file or the command line) and turn it into a
//! [`ResampleConfig`] with [`ResampleOptions::validate`], which rejects
//! contradictory combinations before any data is touched.

use radar_common::{RadarError, RadarResult};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Resampling method, as named by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodName {
    Nearest,
    TileAverage,
    RadiusAverage,
}

impl MethodName {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "nearest" => Some(Self::Nearest),
            "tile_average" | "average" => Some(Self::TileAverage),
            "radius_average" | "smooth_radius" => Some(Self::RadiusAverage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::TileAverage => "tile_average",
            Self::RadiusAverage => "radius_average",
        }
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated resampling method.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ResampleMethod {
    /// Closest source point.
    #[default]
    Nearest,
    /// Average of every source point whose nearest destination cell is
    /// this one. The most expensive mode to build.
    TileAverage,
    /// Average of every source point within `radius_km` of the
    /// destination cell centre.
    RadiusAverage { radius_km: f64 },
}

impl ResampleMethod {
    pub fn name(&self) -> MethodName {
        match self {
            Self::Nearest => MethodName::Nearest,
            Self::TileAverage => MethodName::TileAverage,
            Self::RadiusAverage { .. } => MethodName::RadiusAverage,
        }
    }

    /// True for the averaging modes.
    pub fn is_average(&self) -> bool {
        !matches!(self, Self::Nearest)
    }
}

/// Unvalidated resampling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleOptions {
    /// Explicit method. When unset, a positive radius selects radius
    /// averaging and anything else selects nearest neighbour.
    #[serde(default)]
    pub method: Option<MethodName>,

    /// Averaging radius in km.
    #[serde(default)]
    pub radius_km: Option<f64>,

    /// Minimum number of valid contributions for an average.
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,

    /// Detect the source border along columns (disable for grids that wrap
    /// around the globe).
    #[serde(default = "default_true")]
    pub extend_x: bool,

    /// Detect the source border along rows.
    #[serde(default = "default_true")]
    pub extend_y: bool,
}

fn default_min_hits() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            method: None,
            radius_km: None,
            min_hits: 1,
            extend_x: true,
            extend_y: true,
        }
    }
}

impl ResampleOptions {
    /// Load options from environment variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("RESAMPLE_METHOD") {
            options.method = MethodName::from_str(&val);
        }

        if let Ok(val) = std::env::var("RESAMPLE_RADIUS_KM") {
            if let Ok(radius) = val.parse() {
                options.radius_km = Some(radius);
            }
        }

        if let Ok(val) = std::env::var("RESAMPLE_MIN_HITS") {
            if let Ok(min_hits) = val.parse() {
                options.min_hits = min_hits;
            }
        }

        if let Ok(val) = std::env::var("RESAMPLE_EXTEND") {
            let extend = val.to_lowercase() == "true" || val == "1";
            options.extend_x = extend;
            options.extend_y = extend;
        }

        options
    }

    /// Check the options and resolve the method.
    pub fn validate(&self) -> RadarResult<ResampleConfig> {
        if let Some(r) = self.radius_km {
            if !r.is_finite() || r < 0.0 {
                return Err(RadarError::invalid_config(format!(
                    "radius_km must be a non-negative number, got {}",
                    r
                )));
            }
        }
        let radius = self.radius_km.filter(|r| *r > 0.0);

        let method = match (self.method, radius) {
            (None, None) | (Some(MethodName::Nearest), None) => ResampleMethod::Nearest,
            (None, Some(radius_km)) | (Some(MethodName::RadiusAverage), Some(radius_km)) => {
                ResampleMethod::RadiusAverage { radius_km }
            }
            (Some(MethodName::TileAverage), None) => ResampleMethod::TileAverage,
            (Some(MethodName::RadiusAverage), None) => {
                return Err(RadarError::invalid_config(
                    "radius_average requires a positive radius_km",
                ));
            }
            (Some(name), Some(r)) => {
                return Err(RadarError::invalid_config(format!(
                    "radius_km = {} cannot be combined with method {}",
                    r, name
                )));
            }
        };

        if self.min_hits == 0 {
            return Err(RadarError::invalid_config("min_hits must be > 0"));
        }
        if self.min_hits > 1 && !method.is_average() {
            return Err(RadarError::invalid_config(
                "min_hits > 1 only applies to tile_average or radius_average",
            ));
        }

        Ok(ResampleConfig {
            method,
            min_hits: self.min_hits,
            extend_x: self.extend_x,
            extend_y: self.extend_y,
        })
    }
}

/// Validated resampling configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleConfig {
    pub method: ResampleMethod,
    pub min_hits: usize,
    pub extend_x: bool,
    pub extend_y: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            method: ResampleMethod::Nearest,
            min_hits: 1,
            extend_x: true,
            extend_y: true,
        }
    }
}

impl ResampleConfig {
    /// Nearest neighbour with border detection.
    pub fn nearest() -> Self {
        Self::default()
    }

    /// Tile averaging with the given minimum number of hits.
    pub fn tile_average(min_hits: usize) -> RadarResult<Self> {
        ResampleOptions {
            method: Some(MethodName::TileAverage),
            min_hits,
            ..Default::default()
        }
        .validate()
    }

    /// Radius averaging with the given minimum number of hits.
    pub fn radius_average(radius_km: f64, min_hits: usize) -> RadarResult<Self> {
        ResampleOptions {
            method: Some(MethodName::RadiusAverage),
            radius_km: Some(radius_km),
            min_hits,
            ..Default::default()
        }
        .validate()
    }

    /// Disable border detection, for global grids.
    pub fn without_border(mut self) -> Self {
        self.extend_x = false;
        self.extend_y = false;
        self
    }

    /// Stable hash of every setting, used as part of the index cache key.
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.method.name().hash(&mut hasher);
        if let ResampleMethod::RadiusAverage { radius_km } = self.method {
            radius_km.to_bits().hash(&mut hasher);
        }
        self.min_hits.hash(&mut hasher);
        self.extend_x.hash(&mut hasher);
        self.extend_y.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(method: Option<MethodName>, radius_km: Option<f64>, min_hits: usize) -> ResampleOptions {
        ResampleOptions {
            method,
            radius_km,
            min_hits,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_nearest() {
        let cfg = ResampleOptions::default().validate().unwrap();
        assert_eq!(cfg.method, ResampleMethod::Nearest);
        assert!(cfg.extend_x && cfg.extend_y);

        // A zero radius with no method is the same as no radius
        let cfg = opts(None, Some(0.0), 1).validate().unwrap();
        assert_eq!(cfg.method, ResampleMethod::Nearest);
    }

    #[test]
    fn test_radius_selects_radius_average() {
        let cfg = opts(None, Some(10.0), 3).validate().unwrap();
        assert_eq!(cfg.method, ResampleMethod::RadiusAverage { radius_km: 10.0 });
        assert_eq!(cfg.min_hits, 3);
    }

    #[test]
    fn test_contradictions_are_rejected() {
        assert!(opts(Some(MethodName::RadiusAverage), None, 1).validate().is_err());
        assert!(opts(Some(MethodName::Nearest), Some(5.0), 1).validate().is_err());
        assert!(opts(Some(MethodName::TileAverage), Some(5.0), 1).validate().is_err());
        assert!(opts(None, Some(-1.0), 1).validate().is_err());
        assert!(opts(None, Some(f64::NAN), 1).validate().is_err());
        assert!(opts(Some(MethodName::TileAverage), None, 0).validate().is_err());
        assert!(opts(None, None, 2).validate().is_err());
    }

    #[test]
    fn test_min_hits_with_average() {
        let cfg = opts(Some(MethodName::TileAverage), None, 4).validate().unwrap();
        assert_eq!(cfg.method, ResampleMethod::TileAverage);
        assert_eq!(cfg.min_hits, 4);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(MethodName::from_str("Tile-Average"), Some(MethodName::TileAverage));
        assert_eq!(MethodName::from_str("smooth_radius"), Some(MethodName::RadiusAverage));
        assert_eq!(MethodName::from_str("bilinear"), None);
    }

    #[test]
    fn test_cache_key_distinguishes_configs() {
        let a = ResampleConfig::radius_average(10.0, 1).unwrap();
        let b = ResampleConfig::radius_average(12.0, 1).unwrap();
        let c = ResampleConfig::nearest();
        let d = ResampleConfig::nearest().without_border();
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert_ne!(c.cache_key(), d.cache_key());
        assert_ne!(
            ResampleConfig::tile_average(1).unwrap().cache_key(),
            ResampleConfig::tile_average(3).unwrap().cache_key()
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let opts: ResampleOptions = serde_json::from_str(r#"{"radius_km": 5.0}"#).unwrap();
        assert_eq!(opts.min_hits, 1);
        assert!(opts.extend_x);
        assert_eq!(
            opts.validate().unwrap().method,
            ResampleMethod::RadiusAverage { radius_km: 5.0 }
        );
    }
}
