//! Access to instantaneous composites at a given time.

use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use grid_processor::{IndexCache, ResampleConfig};
use radar_common::{
    floor_to_resolution, Field, LatLonGrid, PathTemplate, Quantity, RadarError, RadarResult,
};

use crate::median_filter::MedianFilter;
use crate::reader::{CompositeReader, RawComposite, ReaderRegistry};
use crate::zr::ZrRelation;

/// Fall back to earlier files when none exists at the requested time.
///
/// The requested time is floored to a multiple of `resolution`, then
/// earlier multiples are tried until `max_lookback` past the floored time
/// is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapPolicy {
    pub resolution: Duration,
    pub max_lookback: Duration,
}

impl SnapPolicy {
    /// Snap to the previous multiple of `resolution` only.
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution,
            max_lookback: Duration::zero(),
        }
    }

    pub fn with_max_lookback(mut self, max_lookback: Duration) -> Self {
        self.max_lookback = max_lookback;
        self
    }

    pub fn validate(&self) -> RadarResult<()> {
        if self.resolution <= Duration::zero() {
            return Err(RadarError::invalid_config("snap resolution must be positive"));
        }
        if self.max_lookback < Duration::zero() {
            return Err(RadarError::invalid_config("snap lookback cannot be negative"));
        }
        Ok(())
    }

    /// Times to try for `time`, newest first.
    pub fn candidates(&self, time: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let floored = floor_to_resolution(time, self.resolution);
        let oldest = floored - self.max_lookback;
        let mut times = Vec::new();
        let mut t = floored;
        while t >= oldest {
            times.push(t);
            t -= self.resolution;
        }
        times
    }
}

/// Destination grid and resampling method.
#[derive(Debug, Clone)]
pub struct Destination {
    pub grid: Arc<LatLonGrid>,
    pub resample: ResampleConfig,
}

impl Destination {
    pub fn new(grid: LatLonGrid, resample: ResampleConfig) -> Self {
        Self {
            grid: Arc::new(grid),
            resample,
        }
    }
}

/// Options for [`InstantaneousAccessor::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Quantity reported by [`Observation::data`].
    pub quantity: Quantity,
    pub zr: ZrRelation,
    /// Median filter window, if any.
    pub median_filter: Option<usize>,
    pub snap: Option<SnapPolicy>,
    pub destination: Option<Destination>,
    /// Coordinates for composites stored without them.
    pub source_grid: Option<Arc<LatLonGrid>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            quantity: Quantity::Reflectivity,
            zr: ZrRelation::default(),
            median_filter: None,
            snap: None,
            destination: None,
            source_grid: None,
        }
    }
}

impl FetchOptions {
    pub fn new(quantity: Quantity) -> Self {
        Self {
            quantity,
            ..Default::default()
        }
    }

    /// Check the options before any file is touched.
    pub fn validate(&self) -> RadarResult<()> {
        if self.quantity.is_accumulated() {
            return Err(RadarError::UnsupportedQuantity(format!(
                "{} is not an instantaneous quantity",
                self.quantity
            )));
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
}

/// An instantaneous composite, converted and optionally filtered and
/// resampled.
#[derive(Debug, Clone)]
pub struct Observation {
    pub requested_time: DateTime<Utc>,
    /// Time of the file actually read. Differs from `requested_time` when
    /// the request was snapped.
    pub valid_time: DateTime<Utc>,
    pub quantity: Quantity,
    pub grid: Option<Arc<LatLonGrid>>,
    pub reflectivity: Field,
    pub precip_rate: Field,
    pub quality: Field,
}

impl Observation {
    /// The field for the requested quantity.
    pub fn data(&self) -> &Field {
        match self.quantity {
            Quantity::Reflectivity => &self.reflectivity,
            _ => &self.precip_rate,
        }
    }

    pub fn is_snapped(&self) -> bool {
        self.valid_time != self.requested_time
    }

    pub fn shape(&self) -> (usize, usize) {
        self.quality.shape()
    }
}

/// Reads composites named by a path template.
pub struct InstantaneousAccessor {
    template: PathTemplate,
    reader: Arc<dyn CompositeReader>,
    cache: Arc<IndexCache>,
}

impl InstantaneousAccessor {
    /// Create an accessor, picking the reader from the template's extension.
    pub fn new(
        template: PathTemplate,
        registry: &ReaderRegistry,
        cache: Arc<IndexCache>,
    ) -> RadarResult<Self> {
        let reader = registry.for_template(&template)?;
        Ok(Self::with_reader(template, reader, cache))
    }

    pub fn with_reader(
        template: PathTemplate,
        reader: Arc<dyn CompositeReader>,
        cache: Arc<IndexCache>,
    ) -> Self {
        Self {
            template,
            reader,
            cache,
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Path of the file for `time`.
    pub fn path_for(&self, time: DateTime<Utc>) -> RadarResult<PathBuf> {
        self.template.path_for(time)
    }

    /// Find and read the composite for `time`, snapping if allowed.
    ///
    /// Returns the time of the file read with its content, or `None` when
    /// nothing was found.
    pub fn locate(
        &self,
        time: DateTime<Utc>,
        snap: Option<&SnapPolicy>,
    ) -> RadarResult<Option<(DateTime<Utc>, RawComposite)>> {
        if let Some(raw) = self.read_at(time)? {
            return Ok(Some((time, raw)));
        }
        let Some(snap) = snap else {
            debug!(%time, "No composite at requested time");
            return Ok(None);
        };
        for candidate in snap.candidates(time) {
            if candidate == time {
                continue;
            }
            if let Some(raw) = self.read_at(candidate)? {
                debug!(%time, snapped = %candidate, "Snapped to earlier composite");
                return Ok(Some((candidate, raw)));
            }
        }
        debug!(%time, resolution = ?snap.resolution, "No composite within snap lookback");
        Ok(None)
    }

    /// Fetch the observation for `time`.
    ///
    /// `Ok(None)` means no data: no file at `time` and none found by the
    /// snap policy.
    pub fn fetch(&self, time: DateTime<Utc>, options: &FetchOptions) -> RadarResult<Option<Observation>> {
        options.validate()?;
        let Some((valid_time, raw)) = self.locate(time, options.snap.as_ref())? else {
            return Ok(None);
        };

        let quality = raw.quality_or_default();
        quality.check_shape(raw.data.shape())?;
        let (mut reflectivity, mut precip_rate) = match raw.quantity {
            Quantity::Reflectivity => (raw.data.clone(), options.zr.dbz_field_to_rate(&raw.data)),
            Quantity::PrecipRate => (options.zr.rate_field_to_dbz(&raw.data), raw.data.clone()),
            other => {
                return Err(RadarError::UnsupportedQuantity(format!(
                    "composite at {} holds {}",
                    valid_time, other
                )))
            }
        };
        let mut quality = quality;

        if let Some(window) = options.median_filter {
            let filter = MedianFilter::new(window)?;
            let selection_source = match raw.quantity {
                Quantity::Reflectivity => &reflectivity,
                _ => &precip_rate,
            };
            let indices = filter.median_indices(selection_source);
            reflectivity = MedianFilter::apply(&reflectivity, &indices)?;
            precip_rate = MedianFilter::apply(&precip_rate, &indices)?;
            quality = MedianFilter::apply(&quality, &indices)?;
        }

        let mut grid = raw
            .grid
            .map(Arc::new)
            .or_else(|| options.source_grid.clone());

        if let Some(dest) = &options.destination {
            let src = source_grid(grid.as_deref(), valid_time)?;
            let projected = resample(&self.cache, src, dest, &options.zr, &precip_rate, &quality, Some(&reflectivity))?;
            reflectivity = projected.reflectivity;
            precip_rate = projected.precip_rate;
            quality = projected.quality;
            grid = Some(Arc::clone(&dest.grid));
        }

        debug!(
            requested = %time,
            valid = %valid_time,
            quantity = %options.quantity,
            shape = ?quality.shape(),
            "Fetched composite"
        );

        Ok(Some(Observation {
            requested_time: time,
            valid_time,
            quantity: options.quantity,
            grid,
            reflectivity,
            precip_rate,
            quality,
        }))
    }

    fn read_at(&self, time: DateTime<Utc>) -> RadarResult<Option<RawComposite>> {
        let path = self.template.path_for(time)?;
        self.reader.read(&path)
    }
}

impl std::fmt::Debug for InstantaneousAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantaneousAccessor")
            .field("template", &self.template)
            .field("reader", &self.reader.name())
            .finish()
    }
}

/// Fields after resampling.
pub(crate) struct Projected {
    pub reflectivity: Field,
    pub precip_rate: Field,
    pub quality: Field,
}

/// The grid a composite's cells sit on, required for resampling.
pub(crate) fn source_grid(grid: Option<&LatLonGrid>, time: DateTime<Utc>) -> RadarResult<&LatLonGrid> {
    grid.ok_or_else(|| {
        RadarError::invalid_config(format!(
            "composite at {} has no coordinates and no source grid was given",
            time
        ))
    })
}

/// Resample rate and quality onto `dest`.
///
/// Averaging methods average the rate weighted by quality and derive the
/// reflectivity from the averaged rate. Nearest copies every field,
/// `reflectivity` included when given.
pub(crate) fn resample(
    cache: &IndexCache,
    src: &LatLonGrid,
    dest: &Destination,
    zr: &ZrRelation,
    precip_rate: &Field,
    quality: &Field,
    reflectivity: Option<&Field>,
) -> RadarResult<Projected> {
    precip_rate.check_shape(src.shape())?;
    let index = cache.get_or_build(src, &dest.grid, &dest.resample)?;

    if dest.resample.method.is_average() {
        let (precip_rate, quality) = index.project_with_quality(precip_rate, quality)?;
        let reflectivity = zr.rate_field_to_dbz(&precip_rate);
        return Ok(Projected {
            reflectivity,
            precip_rate,
            quality,
        });
    }

    let precip_rate = index.project(precip_rate)?;
    let reflectivity = match reflectivity {
        Some(dbz) => index.project(dbz)?,
        None => zr.rate_field_to_dbz(&precip_rate),
    };
    Ok(Projected {
        reflectivity,
        precip_rate,
        quality: index.project(quality)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_snap_candidates() {
        let snap = SnapPolicy::new(Duration::minutes(10));
        assert_eq!(snap.candidates(t(12, 7)), vec![t(12, 0)]);

        let snap = snap.with_max_lookback(Duration::minutes(20));
        assert_eq!(snap.candidates(t(12, 7)), vec![t(12, 0), t(11, 50), t(11, 40)]);
        assert_eq!(snap.candidates(t(12, 10)), vec![t(12, 10), t(12, 0), t(11, 50)]);
    }

    #[test]
    fn test_snap_validate() {
        assert!(SnapPolicy::new(Duration::zero()).validate().is_err());
        assert!(SnapPolicy::new(Duration::minutes(5))
            .with_max_lookback(Duration::minutes(-5))
            .validate()
            .is_err());
    }

    #[test]
    fn test_fetch_options_validate() {
        assert!(FetchOptions::new(Quantity::Reflectivity).validate().is_ok());
        assert!(matches!(
            FetchOptions::new(Quantity::Accumulation).validate(),
            Err(RadarError::UnsupportedQuantity(_))
        ));

        let even_window = FetchOptions {
            median_filter: Some(4),
            ..FetchOptions::new(Quantity::PrecipRate)
        };
        assert!(matches!(
            even_window.validate(),
            Err(RadarError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_observation_data_follows_quantity() {
        let dbz = Field::from_values(1, 1, &[30.0]).unwrap();
        let rate = Field::from_values(1, 1, &[2.0]).unwrap();
        let mut obs = Observation {
            requested_time: t(12, 5),
            valid_time: t(12, 0),
            quantity: Quantity::Reflectivity,
            grid: None,
            reflectivity: dbz.clone(),
            precip_rate: rate.clone(),
            quality: Field::from_values(1, 1, &[1.0]).unwrap(),
        };
        assert_eq!(obs.data(), &dbz);
        assert!(obs.is_snapped());
        obs.quantity = Quantity::PrecipRate;
        assert_eq!(obs.data(), &rate);
    }
}
