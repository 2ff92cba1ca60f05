//! Accumulations over a time window.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use radar_common::{Cell, Field, LatLonGrid, Quantity, RadarError, RadarResult};

use crate::instantaneous::{
    resample, source_grid, Destination, FetchOptions, InstantaneousAccessor, Observation, SnapPolicy,
};
use crate::median_filter::MedianFilter;
use crate::zr::ZrRelation;

/// Default interval between composites.
pub const DEFAULT_STEP_MINUTES: i64 = 10;

/// What to accumulate, and where.
#[derive(Debug, Clone)]
pub struct AccumulationRequest {
    /// End of the window, inclusive.
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    /// Interval between composites.
    pub step: Duration,
    /// `Accumulation`, `AvgPrecipRate` or `Reflectivity`.
    pub quantity: Quantity,
    pub zr: ZrRelation,
    pub median_filter: Option<usize>,
    /// Applied to the end time only; the rest of the window follows it.
    pub snap: Option<SnapPolicy>,
    /// Applied once, to the averaged fields.
    pub destination: Option<Destination>,
    pub source_grid: Option<Arc<LatLonGrid>>,
}

impl AccumulationRequest {
    pub fn new(end_time: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            end_time,
            duration,
            step: Duration::minutes(DEFAULT_STEP_MINUTES),
            quantity: Quantity::Accumulation,
            zr: ZrRelation::default(),
            median_filter: None,
            snap: None,
            destination: None,
            source_grid: None,
        }
    }

    pub fn validate(&self) -> RadarResult<()> {
        if self.step <= Duration::zero() {
            return Err(RadarError::invalid_config("accumulation step must be positive"));
        }
        if self.duration <= Duration::zero() {
            return Err(RadarError::invalid_config("accumulation duration must be positive"));
        }
        if self.duration.num_seconds() % self.step.num_seconds() != 0 {
            return Err(RadarError::invalid_config(format!(
                "accumulation duration of {} min is not a multiple of the {} min step",
                self.duration.num_minutes(),
                self.step.num_minutes()
            )));
        }
        if self.quantity == Quantity::PrecipRate {
            return Err(RadarError::UnsupportedQuantity(
                "accumulations produce avg_precip_rate, not precip_rate".to_string(),
            ));
        }
        self.zr.validate()?;
        if let Some(window) = self.median_filter {
            MedianFilter::new(window)?;
        }
        if let Some(snap) = &self.snap {
            snap.validate()?;
        }
        Ok(())
    }

    /// Number of composites in the window.
    pub fn steps(&self) -> usize {
        (self.duration.num_seconds() / self.step.num_seconds().max(1)).max(0) as usize
    }

    /// Composite times for a window ending at `end`, newest first. The
    /// start of the window is excluded.
    pub fn times_ending_at(&self, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        (0..self.steps() as i32).map(|k| end - self.step * k).collect()
    }

    fn fetch_options(&self, snap: Option<SnapPolicy>) -> FetchOptions {
        FetchOptions {
            quantity: Quantity::PrecipRate,
            zr: self.zr,
            median_filter: self.median_filter,
            snap,
            destination: None,
            source_grid: self.source_grid.clone(),
        }
    }
}

/// Result of an accumulation.
#[derive(Debug, Clone)]
pub struct Accumulation {
    pub requested_end: DateTime<Utc>,
    /// End of the window actually used, after snapping.
    pub end_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub quantity: Quantity,
    pub grid: Option<Arc<LatLonGrid>>,
    /// Requested quantity.
    pub data: Field,
    pub avg_precip_rate: Field,
    pub quality: Field,
}

impl Accumulation {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Accumulate precipitation over the requested window.
///
/// `Ok(None)` when no composite exists for the end of the window. Any other
/// missing composite fails the whole accumulation rather than biasing it.
pub fn accumulate(
    accessor: &InstantaneousAccessor,
    request: &AccumulationRequest,
) -> RadarResult<Option<Accumulation>> {
    request.validate()?;

    let Some(first) = accessor.fetch(request.end_time, &request.fetch_options(request.snap))? else {
        return Ok(None);
    };
    let end_time = first.valid_time;
    let times = request.times_ending_at(end_time);
    let exact = request.fetch_options(None);

    let mut observations: Vec<Observation> = Vec::with_capacity(times.len());
    observations.push(first);
    for &time in &times[1..] {
        match accessor.fetch(time, &exact)? {
            Some(obs) => {
                obs.quality.check_shape(observations[0].shape())?;
                debug!(%time, "Accumulating composite");
                observations.push(obs);
            }
            None => {
                return Err(RadarError::MissingIntermediateFile {
                    time,
                    path: accessor.path_for(time)?,
                })
            }
        }
    }

    let rates: Vec<&Field> = observations.iter().map(|o| &o.precip_rate).collect();
    let qualities: Vec<&Field> = observations.iter().map(|o| &o.quality).collect();
    let (mut avg_rate, mut quality) = weighted_mean(&rates, &qualities)?;

    let mut grid = observations[0].grid.clone();
    if let Some(dest) = &request.destination {
        let src = source_grid(grid.as_deref(), end_time)?;
        let projected = resample(accessor.cache(), src, dest, &request.zr, &avg_rate, &quality, None)?;
        avg_rate = projected.precip_rate;
        quality = projected.quality;
        grid = Some(Arc::clone(&dest.grid));
    }

    let hours = request.duration.num_seconds() as f32 / 3600.0;
    let data = match request.quantity {
        Quantity::Accumulation => avg_rate.map(|c| c.map_value(|r| r * hours)),
        Quantity::Reflectivity => request.zr.rate_field_to_dbz(&avg_rate),
        _ => avg_rate.clone(),
    };

    info!(
        end = %end_time,
        duration_min = request.duration.num_minutes(),
        composites = observations.len(),
        quantity = %request.quantity,
        "Accumulation complete"
    );

    Ok(Some(Accumulation {
        requested_end: request.end_time,
        end_time,
        start_time: end_time - request.duration,
        quantity: request.quantity,
        grid,
        data,
        avg_precip_rate: avg_rate,
        quality,
    }))
}

/// Quality-weighted mean rate and quality over a stack of fields.
///
/// Per cell, rate is `sum(q*R)/sum(q)` and quality `sum(q*q)/sum(q)` over
/// the layers where both are valid. Cells with no usable layer are
/// `Missing` with zero quality, or `Unmapped` when unmapped in every layer.
pub fn weighted_mean(rates: &[&Field], qualities: &[&Field]) -> RadarResult<(Field, Field)> {
    let Some(first) = rates.first() else {
        return Err(RadarError::invalid_config("nothing to average"));
    };
    if rates.len() != qualities.len() {
        return Err(RadarError::invalid_config(format!(
            "{} rate fields but {} quality fields",
            rates.len(),
            qualities.len()
        )));
    }
    let shape = first.shape();
    for field in rates.iter().chain(qualities) {
        field.check_shape(shape)?;
    }

    let (out_rate, out_quality): (Vec<Cell>, Vec<Cell>) = (0..first.len())
        .into_par_iter()
        .map(|i| {
            let mut sum_qr = 0.0f64;
            let mut sum_qq = 0.0f64;
            let mut sum_q = 0.0f64;
            let mut all_unmapped = true;
            for (rate, quality) in rates.iter().zip(qualities) {
                let r = rate.cells()[i];
                all_unmapped &= r == Cell::Unmapped;
                let (Some(r), Some(q)) = (r.magnitude(), quality.cells()[i].magnitude()) else {
                    continue;
                };
                let q = q as f64;
                sum_qr += q * r as f64;
                sum_qq += q * q;
                sum_q += q;
            }
            if sum_q > 0.0 {
                (Cell::Value((sum_qr / sum_q) as f32), Cell::Value((sum_qq / sum_q) as f32))
            } else if all_unmapped {
                (Cell::Unmapped, Cell::Unmapped)
            } else {
                (Cell::Missing, Cell::Value(0.0))
            }
        })
        .unzip();

    Ok((
        Field::new(shape.0, shape.1, out_rate)?,
        Field::new(shape.0, shape.1, out_quality)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_times() {
        let request = AccumulationRequest::new(t(12, 0), Duration::minutes(30));
        assert_eq!(request.steps(), 3);
        assert_eq!(
            request.times_ending_at(t(12, 0)),
            vec![t(12, 0), t(11, 50), t(11, 40)]
        );
    }

    #[test]
    fn test_validate() {
        let ok = AccumulationRequest::new(t(12, 0), Duration::minutes(60));
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.duration = Duration::minutes(25);
        assert!(matches!(bad.validate(), Err(RadarError::InvalidConfiguration(_))));

        let mut bad = ok.clone();
        bad.duration = Duration::zero();
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.quantity = Quantity::PrecipRate;
        assert!(matches!(bad.validate(), Err(RadarError::UnsupportedQuantity(_))));
    }

    #[test]
    fn test_weighted_mean() {
        let r1 = Field::from_values(1, 2, &[2.0, 4.0]).unwrap();
        let r2 = Field::new(1, 2, vec![Cell::Value(6.0), Cell::Missing]).unwrap();
        let q1 = Field::from_values(1, 2, &[1.0, 0.5]).unwrap();
        let q2 = Field::from_values(1, 2, &[0.5, 1.0]).unwrap();

        let (rate, quality) = weighted_mean(&[&r1, &r2], &[&q1, &q2]).unwrap();
        // (1*2 + 0.5*6) / 1.5
        let expected = 5.0 / 1.5;
        assert!((rate.cells()[0].value().unwrap() - expected).abs() < 1e-5);
        // (1 + 0.25) / 1.5
        assert!((quality.cells()[0].value().unwrap() - 1.25 / 1.5).abs() < 1e-5);
        // Only the first layer is valid in the second cell
        assert_eq!(rate.cells()[1], Cell::Value(4.0));
        assert_eq!(quality.cells()[1], Cell::Value(0.5));
    }

    #[test]
    fn test_weighted_mean_voids() {
        let r1 = Field::new(1, 2, vec![Cell::Missing, Cell::Unmapped]).unwrap();
        let r2 = Field::new(1, 2, vec![Cell::Unmapped, Cell::Unmapped]).unwrap();
        let q = Field::from_values(1, 2, &[1.0, 1.0]).unwrap();
        let (rate, quality) = weighted_mean(&[&r1, &r2], &[&q, &q]).unwrap();
        assert_eq!(rate.cells(), &[Cell::Missing, Cell::Unmapped]);
        assert_eq!(quality.cells(), &[Cell::Value(0.0), Cell::Unmapped]);
    }

    #[test]
    fn test_weighted_mean_shape_mismatch() {
        let a = Field::from_values(1, 2, &[1.0, 1.0]).unwrap();
        let b = Field::from_values(2, 1, &[1.0, 1.0]).unwrap();
        assert!(matches!(
            weighted_mean(&[&a, &b], &[&a, &a]),
            Err(RadarError::ShapeMismatch { .. })
        ));
    }
}
