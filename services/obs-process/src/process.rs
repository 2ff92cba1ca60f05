//! Batch processing of radar composites.
//!
//! Every input time is an independent task. A failing task is logged and
//! counted; it never stops the rest of the batch.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use grid_processor::{CacheStats, IndexCache};
use radar_common::{time_range, Cell, Field, LatLonGrid, PathTemplate, Quantity};
use radar_tools::{
    accumulate, bracket, AccumulationRequest, Bracket, CompositeFile, CompositeReader, Destination,
    FetchOptions, Frame, InstantaneousAccessor, JsonCompositeReader, NowcastInterpolator,
    ReaderRegistry, UniformMotion,
};

use crate::config::{NowcastConfig, ObsProcessConfig};

/// Outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Output written from data.
    Written,
    /// No composite for this time; a placeholder was written if the output
    /// grid is known.
    NoData,
    /// Output already present.
    Skipped,
}

/// Counts for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub written: usize,
    pub no_data: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    fn from_results(results: &[Result<TaskOutcome>], started: Instant) -> Self {
        let mut summary = Self {
            total: results.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(TaskOutcome::Written) => summary.written += 1,
                Ok(TaskOutcome::NoData) => summary.no_data += 1,
                Ok(TaskOutcome::Skipped) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn merge(&mut self, other: &BatchSummary) {
        self.total += other.total;
        self.written += other.written;
        self.no_data += other.no_data;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.duration_ms += other.duration_ms;
    }
}

/// Runs a configured batch.
pub struct ObsProcessor {
    config: ObsProcessConfig,
    accessor: InstantaneousAccessor,
    destination: Option<Destination>,
    output: PathTemplate,
}

impl ObsProcessor {
    /// Validate the configuration and prepare the accessor.
    pub fn new(config: ObsProcessConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(IndexCache::default());
        let accessor = InstantaneousAccessor::new(
            config.input_template()?,
            &ReaderRegistry::with_defaults(),
            cache,
        )?;
        let destination = match &config.destination {
            Some(grid) => Some(Destination::new(grid.build()?, config.resample_config()?)),
            None => None,
        };
        let output = config.output_template()?;
        Ok(Self {
            config,
            accessor,
            destination,
            output,
        })
    }

    pub fn config(&self) -> &ObsProcessConfig {
        &self.config
    }

    /// Statistics of the projection index cache shared by all tasks.
    pub fn cache_stats(&self) -> CacheStats {
        self.accessor.cache().stats()
    }

    /// Process every input time, then interpolate if configured.
    pub fn run(&self) -> Result<BatchSummary> {
        let times = self.config.input_times()?;
        info!(
            tasks = times.len(),
            start = %self.config.start,
            end = %self.config.end,
            quantity = %self.config.output_quantity(),
            "Processing composites"
        );

        let mut summary = self.process_times(&times);
        info!(?summary, cache = ?self.cache_stats(), "Processing complete");

        if let Some(nowcast) = &self.config.nowcast {
            let interpolated = self.interpolate(&times, nowcast)?;
            info!(summary = ?interpolated, "Time interpolation complete");
            summary.merge(&interpolated);
        }
        Ok(summary)
    }

    /// Process the given input times in parallel.
    pub fn process_times(&self, times: &[DateTime<Utc>]) -> BatchSummary {
        let started = Instant::now();
        let results: Vec<Result<TaskOutcome>> = times
            .par_iter()
            .map(|&time| {
                let result = self.process_time(time);
                if let Err(e) = &result {
                    error!(%time, error = %format!("{:#}", e), "Task failed");
                }
                result
            })
            .collect();
        BatchSummary::from_results(&results, started)
    }

    /// Process a single input time.
    pub fn process_time(&self, time: DateTime<Utc>) -> Result<TaskOutcome> {
        let path = self.output.path_for(time)?;
        if self.config.complete_dataset && path.is_file() {
            debug!(%time, path = %path.display(), "Output exists, skipping");
            return Ok(TaskOutcome::Skipped);
        }

        let quantity = self.config.output_quantity();
        let produced = match self.config.accumulation_minutes {
            Some(minutes) => self.accumulation(time, minutes)?,
            None => self.instantaneous(time)?,
        };

        let (data, quality, grid) = match produced {
            Some(fields) => fields,
            None => {
                let Some(dest) = &self.destination else {
                    warn!(%time, "No data and no destination grid, nothing written");
                    return Ok(TaskOutcome::NoData);
                };
                warn!(%time, "No data, writing missing placeholder");
                let (rows, cols) = dest.grid.shape();
                CompositeFile::new(
                    quantity,
                    Some(time),
                    &Field::filled(rows, cols, Cell::Missing),
                    Some(&Field::filled(rows, cols, Cell::Value(0.0))),
                    Some(dest.grid.as_ref()),
                )
                .write(&path)?;
                return Ok(TaskOutcome::NoData);
            }
        };

        CompositeFile::new(quantity, Some(time), &data, Some(&quality), grid.as_deref())
            .write(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(%time, path = %path.display(), "Wrote output");
        Ok(TaskOutcome::Written)
    }

    fn instantaneous(&self, time: DateTime<Utc>) -> Result<Option<(Field, Field, Option<Arc<LatLonGrid>>)>> {
        let options = FetchOptions {
            quantity: self.config.output_quantity(),
            zr: self.config.zr,
            median_filter: self.config.median_filter,
            snap: self.config.snap(),
            destination: self.destination.clone(),
            source_grid: None,
        };
        Ok(self.accessor.fetch(time, &options)?.map(|obs| {
            let data = obs.data().clone();
            (data, obs.quality, obs.grid)
        }))
    }

    fn accumulation(
        &self,
        time: DateTime<Utc>,
        minutes: i64,
    ) -> Result<Option<(Field, Field, Option<Arc<LatLonGrid>>)>> {
        let request = AccumulationRequest {
            step: self.config.step(),
            quantity: self.config.output_quantity(),
            zr: self.config.zr,
            median_filter: self.config.median_filter,
            snap: self.config.snap(),
            destination: self.destination.clone(),
            ..AccumulationRequest::new(time, Duration::minutes(minutes))
        };
        Ok(accumulate(&self.accessor, &request)?.map(|acc| (acc.data, acc.quality, acc.grid)))
    }

    /// Interpolate the processed files onto the nowcast time list.
    pub fn interpolate(&self, input_times: &[DateTime<Utc>], nowcast: &NowcastConfig) -> Result<BatchSummary> {
        let started = Instant::now();
        let output = PathTemplate::new(&self.config.output_dir, &nowcast.output_recipe)?;

        let mut frames = Vec::new();
        let mut grid = None;
        for &time in input_times {
            let path = self.output.path_for(time)?;
            let Some(raw) = JsonCompositeReader.read(&path)? else {
                continue;
            };
            let quality = raw.quality_or_default();
            grid = grid.or(raw.grid);
            frames.push(Frame {
                time,
                data: self.to_rate(&raw.data),
                quality,
            });
        }
        if frames.is_empty() {
            bail!("No processed files to interpolate");
        }

        let end = nowcast.end.unwrap_or(self.config.end);
        let targets = time_range(self.config.start, end, Duration::minutes(nowcast.output_step_minutes))?;
        let times: Vec<DateTime<Utc>> = frames.iter().map(|f| f.time).collect();
        let interpolator = NowcastInterpolator::new(UniformMotion::new(nowcast.u_per_hour, nowcast.v_per_hour));
        let quantity = self.config.output_quantity();
        info!(targets = targets.len(), frames = frames.len(), "Interpolating in time");

        let results: Vec<Result<TaskOutcome>> = targets
            .par_iter()
            .map(|&target| {
                let result = (|| -> Result<TaskOutcome> {
                    let path = output.path_for(target)?;
                    if self.config.complete_dataset && path.is_file() {
                        return Ok(TaskOutcome::Skipped);
                    }
                    let frame = match bracket(&times, target) {
                        Bracket::Exact(i) => frames[i].clone(),
                        Bracket::Between(i, j) => interpolator.interpolate(&frames[i], &frames[j], target)?,
                        Bracket::After(last) if last > 0 => {
                            interpolator.extrapolate(&frames[last - 1], &frames[last], target)?
                        }
                        Bracket::After(_) => bail!("Need two processed files to extrapolate to {}", target),
                        Bracket::Before => bail!("{} is before the first processed file", target),
                    };
                    let data = self.from_rate(&frame.data);
                    CompositeFile::new(quantity, Some(target), &data, Some(&frame.quality), grid.as_ref())
                        .write(&path)?;
                    Ok(TaskOutcome::Written)
                })();
                if let Err(e) = &result {
                    error!(%target, error = %format!("{:#}", e), "Interpolation failed");
                }
                result
            })
            .collect();
        Ok(BatchSummary::from_results(&results, started))
    }

    /// Processed data in the space frames are blended in. Reflectivity is
    /// logarithmic, so it is blended as precipitation rate.
    fn to_rate(&self, data: &Field) -> Field {
        match self.config.output_quantity() {
            Quantity::Reflectivity => self.config.zr.dbz_field_to_rate(data),
            _ => data.clone(),
        }
    }

    fn from_rate(&self, data: &Field) -> Field {
        match self.config.output_quantity() {
            Quantity::Reflectivity => self.config.zr.rate_field_to_dbz(data),
            _ => data.clone(),
        }
    }
}
