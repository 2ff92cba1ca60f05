//! Time handling: file path templates and time-step arithmetic.

use crate::error::{RadarError, RadarResult};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// A strftime recipe for file names under a base directory,
/// e.g. `%Y/%m/%d/qcomp_%Y%m%d%H%M.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    base_dir: PathBuf,
    recipe: String,
}

impl PathTemplate {
    /// Create a template, rejecting recipes chrono cannot format.
    pub fn new(base_dir: impl Into<PathBuf>, recipe: impl Into<String>) -> RadarResult<Self> {
        let recipe = recipe.into();
        if recipe.is_empty() {
            return Err(RadarError::Template {
                template: recipe,
                message: "recipe is empty".to_string(),
            });
        }
        if StrftimeItems::new(&recipe).any(|item| matches!(item, Item::Error)) {
            return Err(RadarError::Template {
                template: recipe,
                message: "invalid strftime specifier".to_string(),
            });
        }
        Ok(Self {
            base_dir: base_dir.into(),
            recipe,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn recipe(&self) -> &str {
        &self.recipe
    }

    /// Extension of the recipe (without the dot, lowercased), if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.recipe)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Path of the file valid at `time`.
    pub fn path_for(&self, time: DateTime<Utc>) -> RadarResult<PathBuf> {
        let mut name = String::new();
        write!(name, "{}", time.format_with_items(StrftimeItems::new(&self.recipe))).map_err(
            |_| RadarError::Template {
                template: self.recipe.clone(),
                message: format!("cannot format {}", time),
            },
        )?;
        Ok(self.base_dir.join(name))
    }
}

/// Round `time` down to a multiple of `resolution` since the Unix epoch.
pub fn floor_to_resolution(time: DateTime<Utc>, resolution: Duration) -> DateTime<Utc> {
    let step = resolution.num_seconds();
    if step <= 0 {
        return time;
    }
    let secs = time.timestamp();
    let floored = secs - secs.rem_euclid(step);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(time)
}

/// Times from `start` to `end` inclusive, every `step`.
pub fn time_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> RadarResult<Vec<DateTime<Utc>>> {
    if step <= Duration::zero() {
        return Err(RadarError::invalid_config("time step must be positive"));
    }
    if end < start {
        return Err(RadarError::invalid_config(format!(
            "end time {} is before start time {}",
            end, start
        )));
    }
    let mut times = Vec::new();
    let mut t = start;
    while t <= end {
        times.push(t);
        t += step;
    }
    Ok(times)
}

/// Parse a time given as RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` or `YYYYMMDDHHMM`
/// (all UTC).
pub fn parse_time(s: &str) -> RadarResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y%m%d%H%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }
    Err(RadarError::invalid_config(format!("cannot parse time '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_path_for() {
        let tpl = PathTemplate::new("/data/radar", "%Y%m%d/qcomp_%Y%m%d%H%M.json").unwrap();
        assert_eq!(
            tpl.path_for(t(15, 40)).unwrap(),
            PathBuf::from("/data/radar/20240701/qcomp_202407011540.json")
        );
        assert_eq!(tpl.extension().as_deref(), Some("json"));
    }

    #[test]
    fn test_invalid_recipe_is_rejected() {
        assert!(matches!(
            PathTemplate::new("/data", "qcomp_%Q.json"),
            Err(RadarError::Template { .. })
        ));
        assert!(PathTemplate::new("/data", "").is_err());
    }

    #[test]
    fn test_floor_to_resolution() {
        let ten = Duration::minutes(10);
        assert_eq!(floor_to_resolution(t(15, 47), ten), t(15, 40));
        assert_eq!(floor_to_resolution(t(15, 40), ten), t(15, 40));
        assert_eq!(
            floor_to_resolution(Utc.with_ymd_and_hms(2024, 7, 1, 15, 40, 59).unwrap(), ten),
            t(15, 40)
        );
    }

    #[test]
    fn test_time_range() {
        let times = time_range(t(15, 0), t(15, 30), Duration::minutes(10)).unwrap();
        assert_eq!(times, vec![t(15, 0), t(15, 10), t(15, 20), t(15, 30)]);
        assert!(time_range(t(15, 30), t(15, 0), Duration::minutes(10)).is_err());
        assert!(time_range(t(15, 0), t(15, 30), Duration::zero()).is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("202407011540").unwrap(), t(15, 40));
        assert_eq!(parse_time("2024-07-01T15:40").unwrap(), t(15, 40));
        assert_eq!(parse_time("2024-07-01T15:40:00Z").unwrap(), t(15, 40));
        assert!(parse_time("yesterday").is_err());
    }
}
