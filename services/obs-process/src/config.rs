//! Batch configuration.
//!
//! Loaded from YAML, then overridden from the environment and finally from
//! the command line. Everything is validated before any file is read.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use grid_processor::{ResampleConfig, ResampleOptions};
use radar_common::{parse_time, time_range, LatLonGrid, PathTemplate, Quantity};
use radar_tools::{MedianFilter, SnapPolicy, ZrRelation};

/// Top-level batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsProcessConfig {
    /// Directory holding the input composites
    pub input_dir: PathBuf,

    /// strftime recipe of input files, relative to `input_dir`
    #[serde(default = "default_input_recipe")]
    pub input_recipe: String,

    /// Directory receiving processed files
    pub output_dir: PathBuf,

    /// strftime recipe of processed files, relative to `output_dir`
    #[serde(default = "default_output_recipe")]
    pub output_recipe: String,

    /// First input time
    pub start: DateTime<Utc>,

    /// Last input time, inclusive
    pub end: DateTime<Utc>,

    /// Interval between input times (minutes)
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,

    /// Accumulate over this many minutes instead of reading instantaneous
    /// composites
    #[serde(default)]
    pub accumulation_minutes: Option<i64>,

    /// Output quantity. Defaults to precipitation rate, or accumulation
    /// when `accumulation_minutes` is set.
    #[serde(default)]
    pub quantity: Option<Quantity>,

    /// Median filter window (odd)
    #[serde(default)]
    pub median_filter: Option<usize>,

    /// Snap missing composites to the previous multiple of this many minutes
    #[serde(default)]
    pub snap_minutes: Option<i64>,

    #[serde(default)]
    pub zr: ZrRelation,

    #[serde(default)]
    pub resample: ResampleOptions,

    /// Destination grid. Without one, composites keep their own grid.
    #[serde(default)]
    pub destination: Option<GridConfig>,

    /// Worker threads (default: all cores)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Skip times whose output already exists
    #[serde(default)]
    pub complete_dataset: bool,

    /// Time interpolation of the processed files
    #[serde(default)]
    pub nowcast: Option<NowcastConfig>,
}

/// Regular north-up destination grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// `[lon_min, lon_max, lat_min, lat_max]`
    pub extent: [f64; 4],
    pub nx: usize,
    pub ny: usize,
}

impl GridConfig {
    pub fn build(&self) -> Result<LatLonGrid> {
        LatLonGrid::from_extent(self.extent, (self.nx, self.ny)).context("Invalid destination grid")
    }
}

/// Interpolation of processed files onto a finer time list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowcastConfig {
    /// Interval between interpolated times (minutes)
    pub output_step_minutes: i64,

    /// strftime recipe of interpolated files, relative to `output_dir`
    #[serde(default = "default_nowcast_recipe")]
    pub output_recipe: String,

    /// Last interpolated time. Times after the last processed file are
    /// extrapolated.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Steering motion along columns (cells per hour)
    #[serde(default)]
    pub u_per_hour: f32,

    /// Steering motion along rows (cells per hour)
    #[serde(default)]
    pub v_per_hour: f32,
}

fn default_input_recipe() -> String {
    "%Y%m%d/qcomp_%Y%m%d%H%M.json".to_string()
}

fn default_output_recipe() -> String {
    "%Y%m%d%H%M_processed.json".to_string()
}

fn default_nowcast_recipe() -> String {
    "%Y%m%d%H%M_interpolated.json".to_string()
}

fn default_step_minutes() -> i64 {
    10
}

impl ObsProcessConfig {
    /// Load from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Override settings from `OBS_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = env::var("OBS_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("OBS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(start) = env::var("OBS_START") {
            self.start = parse_time(&start)?;
        }
        if let Ok(end) = env::var("OBS_END") {
            self.end = parse_time(&end)?;
        }
        if let Ok(workers) = env::var("OBS_WORKERS") {
            self.workers = Some(workers.parse().context("OBS_WORKERS must be an integer")?);
        }
        if let Ok(window) = env::var("OBS_MEDIAN_FILTER") {
            self.median_filter = Some(window.parse().context("OBS_MEDIAN_FILTER must be an integer")?);
        }
        if let Ok(flag) = env::var("OBS_COMPLETE_DATASET") {
            self.complete_dataset = flag == "true" || flag == "1";
        }
        if env::var("RESAMPLE_METHOD").is_ok() || env::var("RESAMPLE_RADIUS_KM").is_ok() {
            self.resample = ResampleOptions::from_env();
        }
        Ok(())
    }

    /// Quantity written to the processed files.
    pub fn output_quantity(&self) -> Quantity {
        match (self.quantity, self.accumulation_minutes) {
            (Some(q), _) => q,
            (None, Some(_)) => Quantity::Accumulation,
            (None, None) => Quantity::PrecipRate,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::minutes(self.step_minutes)
    }

    pub fn input_times(&self) -> Result<Vec<DateTime<Utc>>> {
        Ok(time_range(self.start, self.end, self.step())?)
    }

    pub fn input_template(&self) -> Result<PathTemplate> {
        Ok(PathTemplate::new(&self.input_dir, &self.input_recipe)?)
    }

    pub fn output_template(&self) -> Result<PathTemplate> {
        Ok(PathTemplate::new(&self.output_dir, &self.output_recipe)?)
    }

    pub fn snap(&self) -> Option<SnapPolicy> {
        self.snap_minutes.map(|m| SnapPolicy::new(Duration::minutes(m)))
    }

    /// Validated resampling configuration.
    pub fn resample_config(&self) -> Result<ResampleConfig> {
        self.resample.validate().context("Invalid resampling options")
    }

    /// Check every setting before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.step_minutes <= 0 {
            bail!("step_minutes must be positive, got {}", self.step_minutes);
        }
        if self.end < self.start {
            bail!("end {} is before start {}", self.end, self.start);
        }
        self.input_template()?;
        self.output_template()?;
        self.resample_config()?;
        self.zr.validate()?;

        if let Some(window) = self.median_filter {
            MedianFilter::new(window)?;
        }
        if let Some(snap) = self.snap() {
            snap.validate()?;
        }
        if let Some(grid) = &self.destination {
            grid.build()?;
        }
        if self.workers == Some(0) {
            bail!("workers must be at least 1");
        }

        let quantity = self.output_quantity();
        match self.accumulation_minutes {
            Some(minutes) => {
                if minutes <= 0 || minutes % self.step_minutes != 0 {
                    bail!(
                        "accumulation_minutes ({}) must be a positive multiple of step_minutes ({})",
                        minutes,
                        self.step_minutes
                    );
                }
                if quantity == Quantity::PrecipRate {
                    bail!("accumulations produce avg_precip_rate, not precip_rate");
                }
            }
            None if quantity.is_accumulated() => {
                bail!("{} requires accumulation_minutes", quantity);
            }
            None => {}
        }

        if let Some(nowcast) = &self.nowcast {
            if nowcast.output_step_minutes <= 0 {
                bail!("nowcast.output_step_minutes must be positive");
            }
            PathTemplate::new(&self.output_dir, &nowcast.output_recipe)?;
            if nowcast.end.is_some_and(|end| end < self.start) {
                bail!("nowcast.end is before start");
            }
        }
        Ok(())
    }
}
