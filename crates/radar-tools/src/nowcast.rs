//! Motion-compensated time interpolation between composites.
//!
//! Linear blending of two composites produces a double image when rain
//! moves between them. Both fields are advected to the target time first:
//! the earlier one forward along the motion, the later one backward, and
//! only then blended.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::debug;

use grid_processor::{bilinear_interpolate, Sample};
use radar_common::{Cell, Field, RadarError, RadarResult};

/// Per-cell displacement over one interval, in grid cells.
///
/// `u` moves along columns, `v` along rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionField {
    nrows: usize,
    ncols: usize,
    u: Vec<f32>,
    v: Vec<f32>,
}

impl MotionField {
    pub fn new(nrows: usize, ncols: usize, u: Vec<f32>, v: Vec<f32>) -> RadarResult<Self> {
        let len = nrows * ncols;
        if u.len() != len || v.len() != len {
            return Err(RadarError::Motion(format!(
                "motion components of length {} and {} for a {}x{} grid",
                u.len(),
                v.len(),
                nrows,
                ncols
            )));
        }
        Ok(Self { nrows, ncols, u, v })
    }

    pub fn zero(nrows: usize, ncols: usize) -> Self {
        Self::uniform(nrows, ncols, 0.0, 0.0)
    }

    pub fn uniform(nrows: usize, ncols: usize, u: f32, v: f32) -> Self {
        let len = nrows * ncols;
        Self {
            nrows,
            ncols,
            u: vec![u; len],
            v: vec![v; len],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Displacement `(u, v)` at a flat index.
    #[inline]
    pub fn at(&self, idx: usize) -> (f32, f32) {
        (self.u[idx], self.v[idx])
    }

    /// The same motion run backward in time.
    pub fn reversed(&self) -> Self {
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            u: self.u.iter().map(|u| -u).collect(),
            v: self.v.iter().map(|v| -v).collect(),
        }
    }

    fn check_shape(&self, expected: (usize, usize)) -> RadarResult<()> {
        if self.shape() != expected {
            return Err(RadarError::shape_mismatch(expected, self.shape()));
        }
        Ok(())
    }
}

/// Estimates motion between two composites.
pub trait MotionEstimator: Send + Sync {
    /// Displacement carrying `before` onto `after`, `interval` apart.
    fn estimate(&self, before: &Field, after: &Field, interval: Duration) -> RadarResult<MotionField>;
}

/// No motion at all; interpolation reduces to a linear blend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroMotion;

impl MotionEstimator for ZeroMotion {
    fn estimate(&self, before: &Field, _after: &Field, _interval: Duration) -> RadarResult<MotionField> {
        Ok(MotionField::zero(before.nrows(), before.ncols()))
    }
}

/// The same steering motion everywhere, in grid cells per hour.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformMotion {
    pub u_per_hour: f32,
    pub v_per_hour: f32,
}

impl UniformMotion {
    pub fn new(u_per_hour: f32, v_per_hour: f32) -> Self {
        Self {
            u_per_hour,
            v_per_hour,
        }
    }
}

impl MotionEstimator for UniformMotion {
    fn estimate(&self, before: &Field, _after: &Field, interval: Duration) -> RadarResult<MotionField> {
        let hours = interval.num_milliseconds() as f32 / 3_600_000.0;
        Ok(MotionField::uniform(
            before.nrows(),
            before.ncols(),
            self.u_per_hour * hours,
            self.v_per_hour * hours,
        ))
    }
}

/// Advect `field` by `fraction` of `motion` (semi-Lagrangian).
///
/// Each cell takes the bilinear value at its departure point; departure
/// points outside the grid give `Unmapped`.
pub fn advect(field: &Field, motion: &MotionField, fraction: f64) -> RadarResult<Field> {
    let samples = advect_samples(field, motion, fraction)?;
    Field::new(
        field.nrows(),
        field.ncols(),
        samples
            .into_iter()
            .map(|s| match s {
                Sample::Inside(cell) => cell,
                Sample::Outside => Cell::Unmapped,
            })
            .collect(),
    )
}

fn advect_samples(field: &Field, motion: &MotionField, fraction: f64) -> RadarResult<Vec<Sample>> {
    motion.check_shape(field.shape())?;
    let ncols = field.ncols();
    if fraction == 0.0 {
        return Ok(field.cells().iter().map(|&c| Sample::Inside(c)).collect());
    }
    Ok((0..field.len())
        .into_par_iter()
        .map(|idx| {
            let (u, v) = motion.at(idx);
            let x = (idx % ncols) as f64 - fraction * u as f64;
            let y = (idx / ncols) as f64 - fraction * v as f64;
            bilinear_interpolate(field, x, y)
        })
        .collect())
}

/// A composite at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub data: Field,
    pub quality: Field,
}

/// Where a time falls within a sorted list of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    /// Before the first time.
    Before,
    /// Equal to the time at this index.
    Exact(usize),
    /// Strictly between the times at `i` and `i + 1`.
    Between(usize, usize),
    /// After the last time.
    After(usize),
}

/// Locate `target` within ascending `times`.
pub fn bracket(times: &[DateTime<Utc>], target: DateTime<Utc>) -> Bracket {
    match times.binary_search(&target) {
        Ok(i) => Bracket::Exact(i),
        Err(0) => Bracket::Before,
        Err(i) if i == times.len() => Bracket::After(i - 1),
        Err(i) => Bracket::Between(i - 1, i),
    }
}

/// Interpolates composites in time using an estimated motion field.
#[derive(Debug, Clone, Default)]
pub struct NowcastInterpolator<E> {
    estimator: E,
}

impl<E: MotionEstimator> NowcastInterpolator<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Blend `before` and `after` at weight `w` in [0, 1].
    ///
    /// `before` is advected by `w` along `forward`, `after` by `1 - w` along
    /// `backward`, and the two are blended with weights `1 - w` and `w`.
    /// Where only one side is usable it is taken alone; where both
    /// departure points leave the grid the result is `Unmapped`.
    pub fn interpolate_with_motion(
        before: &Field,
        after: &Field,
        forward: &MotionField,
        backward: &MotionField,
        w: f64,
    ) -> RadarResult<Field> {
        if !(0.0..=1.0).contains(&w) {
            return Err(RadarError::invalid_config(format!(
                "interpolation weight {} is outside [0, 1]",
                w
            )));
        }
        after.check_shape(before.shape())?;
        if w == 0.0 {
            return Ok(before.clone());
        }
        if w == 1.0 {
            return Ok(after.clone());
        }

        let from_before = advect_samples(before, forward, w)?;
        let from_after = advect_samples(after, backward, 1.0 - w)?;
        let cells = from_before
            .par_iter()
            .zip(from_after.par_iter())
            .map(|(&a, &b)| blend(a, b, w))
            .collect();
        Field::new(before.nrows(), before.ncols(), cells)
    }

    /// Frame at `target`, between `before` and `after` inclusive.
    pub fn interpolate(&self, before: &Frame, after: &Frame, target: DateTime<Utc>) -> RadarResult<Frame> {
        let interval = after.time - before.time;
        if interval <= Duration::zero() {
            return Err(RadarError::invalid_config(format!(
                "frames at {} and {} are not in time order",
                before.time, after.time
            )));
        }
        if target < before.time || target > after.time {
            return Err(RadarError::invalid_config(format!(
                "{} is outside [{}, {}]",
                target, before.time, after.time
            )));
        }
        let w = fraction(target - before.time, interval);
        let forward = self.estimator.estimate(&before.data, &after.data, interval)?;
        let backward = forward.reversed();
        debug!(%target, before = %before.time, after = %after.time, w, "Interpolating frame");

        Ok(Frame {
            time: target,
            data: Self::interpolate_with_motion(&before.data, &after.data, &forward, &backward, w)?,
            quality: Self::interpolate_with_motion(&before.quality, &after.quality, &forward, &backward, w)?,
        })
    }

    /// Frame at `target` after `last`, advecting `last` forward only, with
    /// motion estimated from `previous` and `last`.
    pub fn extrapolate(&self, previous: &Frame, last: &Frame, target: DateTime<Utc>) -> RadarResult<Frame> {
        let interval = last.time - previous.time;
        if interval <= Duration::zero() {
            return Err(RadarError::invalid_config(format!(
                "frames at {} and {} are not in time order",
                previous.time, last.time
            )));
        }
        if target < last.time {
            return Err(RadarError::invalid_config(format!(
                "cannot extrapolate backward to {} from {}",
                target, last.time
            )));
        }
        let motion = self.estimator.estimate(&previous.data, &last.data, interval)?;
        let lead = fraction(target - last.time, interval);
        debug!(%target, last = %last.time, lead, "Extrapolating frame");

        Ok(Frame {
            time: target,
            data: advect(&last.data, &motion, lead)?,
            quality: advect(&last.quality, &motion, lead)?,
        })
    }
}

fn fraction(elapsed: Duration, interval: Duration) -> f64 {
    elapsed.num_milliseconds() as f64 / interval.num_milliseconds() as f64
}

fn blend(a: Sample, b: Sample, w: f64) -> Cell {
    let magnitude = |s: Sample| match s {
        Sample::Inside(cell) => cell.magnitude().map(|m| (m as f64, cell.is_value())),
        Sample::Outside => None,
    };
    match (magnitude(a), magnitude(b)) {
        (Some((va, da)), Some((vb, db))) => {
            if !da && !db {
                Cell::Undetect
            } else {
                Cell::Value(((1.0 - w) * va + w * vb) as f32)
            }
        }
        (Some(_), None) => single(a),
        (None, Some(_)) => single(b),
        (None, None) => {
            let unmapped = |s: Sample| matches!(s, Sample::Outside | Sample::Inside(Cell::Unmapped));
            if unmapped(a) && unmapped(b) {
                Cell::Unmapped
            } else {
                Cell::Missing
            }
        }
    }
}

fn single(s: Sample) -> Cell {
    match s {
        Sample::Inside(cell) => cell,
        Sample::Outside => Cell::Unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    type Interp = NowcastInterpolator<ZeroMotion>;

    fn t(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, m, 0).unwrap()
    }

    fn ramp() -> Field {
        let values: Vec<f32> = (0..20).map(|i| (i % 5) as f32).collect();
        Field::from_values(4, 5, &values).unwrap()
    }

    #[test]
    fn test_endpoints_exact() {
        let before = ramp();
        let after = before.map(|c| c.map_value(|v| v + 7.0));
        let motion = MotionField::uniform(4, 5, 1.3, -0.4);
        let back = motion.reversed();
        assert_eq!(Interp::interpolate_with_motion(&before, &after, &motion, &back, 0.0).unwrap(), before);
        assert_eq!(Interp::interpolate_with_motion(&before, &after, &motion, &back, 1.0).unwrap(), after);
    }

    #[test]
    fn test_zero_motion_is_linear() {
        let before = Field::filled(3, 3, Cell::Value(10.0));
        let after = Field::filled(3, 3, Cell::Value(20.0));
        let zero = MotionField::zero(3, 3);
        let mid = Interp::interpolate_with_motion(&before, &after, &zero, &zero, 0.25).unwrap();
        assert!(mid.cells().iter().all(|&c| c == Cell::Value(12.5)));
    }

    #[test]
    fn test_rejects_bad_weight() {
        let f = ramp();
        let zero = MotionField::zero(4, 5);
        assert!(Interp::interpolate_with_motion(&f, &f, &zero, &zero, 1.5).is_err());
        assert!(Interp::interpolate_with_motion(&f, &f, &zero, &zero, f64::NAN).is_err());
    }

    #[test]
    fn test_advect_shifts_columns() {
        let f = ramp();
        let motion = MotionField::uniform(4, 5, 1.0, 0.0);
        let out = advect(&f, &motion, 1.0).unwrap();
        // Each cell takes the value one column to the left
        assert_eq!(out.get(0, 0), Some(Cell::Unmapped));
        assert_eq!(out.get(2, 3), Some(Cell::Value(2.0)));
    }

    #[test]
    fn test_moving_feature_no_double_image() {
        // A single echo moves four columns between the two frames
        let mut before = vec![Cell::Undetect; 9];
        before[2] = Cell::Value(40.0);
        let mut after = vec![Cell::Undetect; 9];
        after[6] = Cell::Value(40.0);
        let before = Field::new(1, 9, before).unwrap();
        let after = Field::new(1, 9, after).unwrap();

        let forward = MotionField::uniform(1, 9, 4.0, 0.0);
        let backward = forward.reversed();
        let mid = Interp::interpolate_with_motion(&before, &after, &forward, &backward, 0.5).unwrap();
        assert_eq!(mid.get(0, 4), Some(Cell::Value(40.0)));
        assert_eq!(mid.get(0, 2), Some(Cell::Undetect));
        assert_eq!(mid.get(0, 6), Some(Cell::Undetect));
    }

    #[test]
    fn test_one_side_outside() {
        let before = Field::filled(1, 3, Cell::Value(10.0));
        let after = Field::filled(1, 3, Cell::Value(20.0));
        let forward = MotionField::uniform(1, 3, 2.0, 0.0);
        let backward = forward.reversed();
        let mid = Interp::interpolate_with_motion(&before, &after, &forward, &backward, 0.5).unwrap();
        // Column 0 departs from -1 in `before` but from 1 in `after`
        assert_eq!(mid.get(0, 0), Some(Cell::Value(20.0)));
        assert_eq!(mid.get(0, 1), Some(Cell::Value(15.0)));
        assert_eq!(mid.get(0, 2), Some(Cell::Value(10.0)));
    }

    #[test]
    fn test_interpolate_frames() {
        let interp = NowcastInterpolator::new(ZeroMotion);
        let frame = |m, v| Frame {
            time: t(m),
            data: Field::filled(2, 2, Cell::Value(v)),
            quality: Field::filled(2, 2, Cell::Value(1.0)),
        };
        let out = interp.interpolate(&frame(0, 10.0), &frame(10, 20.0), t(5)).unwrap();
        assert_eq!(out.time, t(5));
        assert!(out.data.cells().iter().all(|&c| c == Cell::Value(15.0)));
        assert!(out.quality.cells().iter().all(|&c| c == Cell::Value(1.0)));

        assert!(interp.interpolate(&frame(0, 10.0), &frame(10, 20.0), t(11)).is_err());
        assert!(interp.interpolate(&frame(10, 10.0), &frame(0, 20.0), t(5)).is_err());
    }

    #[test]
    fn test_extrapolate_uniform_motion() {
        // Two cells per hour along columns
        let interp = NowcastInterpolator::new(UniformMotion::new(12.0, 0.0));
        let values: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let frame = |m| Frame {
            time: t(m),
            data: Field::from_values(1, 6, &values).unwrap(),
            quality: Field::filled(1, 6, Cell::Value(1.0)),
        };
        // 10 minutes apart: 2 cells per interval, half an interval ahead
        let out = interp.extrapolate(&frame(0), &frame(10), t(15)).unwrap();
        assert_eq!(out.data.get(0, 0), Some(Cell::Unmapped));
        let shifted = out.data.get(0, 3).and_then(Cell::value).unwrap();
        assert!((shifted - 2.0).abs() < 1e-4);
        assert!(interp.extrapolate(&frame(0), &frame(10), t(5)).is_err());
    }

    #[test]
    fn test_bracket() {
        let times = [t(0), t(10), t(20)];
        assert_eq!(bracket(&times, t(0)), Bracket::Exact(0));
        assert_eq!(bracket(&times, t(15)), Bracket::Between(1, 2));
        assert_eq!(bracket(&times, t(25)), Bracket::After(2));
        assert_eq!(bracket(&[t(10)], t(5)), Bracket::Before);
    }
}
