//! Median speckle filter.
//!
//! The filter returns source indices rather than values so the exact same
//! selection can be applied to the data and to its quality index.

use rayon::prelude::*;
use std::cmp::Ordering;

use radar_common::{Cell, Field, RadarError, RadarResult};

/// How `Undetect` cells take part in the order statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndetectHandling {
    /// Rank them below every measured value, so isolated echoes in clear
    /// air are filtered out.
    #[default]
    RankLowest,
    /// Ignore them, like the other sentinels.
    Exclude,
}

/// Square-window median filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedianFilter {
    window: usize,
    undetect: UndetectHandling,
}

impl MedianFilter {
    /// A filter with an odd `window` size.
    pub fn new(window: usize) -> RadarResult<Self> {
        if window == 0 || window % 2 == 0 {
            return Err(RadarError::invalid_config(format!(
                "median filter window must be odd and positive, got {}",
                window
            )));
        }
        Ok(Self {
            window,
            undetect: UndetectHandling::default(),
        })
    }

    pub fn with_undetect(mut self, undetect: UndetectHandling) -> Self {
        self.undetect = undetect;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// For each cell, the flat index of the median of its neighbourhood.
    ///
    /// Neighbourhoods are clamped at the edges, so border cells count more
    /// than once. The upper median is taken and equal values are ordered by
    /// source index. A neighbourhood without a single valid cell keeps its
    /// centre.
    pub fn median_indices(&self, field: &Field) -> Vec<usize> {
        let (nrows, ncols) = field.shape();
        let mut indices = vec![0usize; nrows * ncols];
        if ncols == 0 {
            return indices;
        }
        let half = (self.window / 2) as isize;
        let cells = field.cells();

        indices
            .par_chunks_mut(ncols)
            .enumerate()
            .for_each(|(row, out)| {
                let mut candidates: Vec<(Rank, usize)> = Vec::with_capacity(self.window * self.window);
                for (col, slot) in out.iter_mut().enumerate() {
                    candidates.clear();
                    for dr in -half..=half {
                        let r = clamp(row as isize + dr, nrows);
                        for dc in -half..=half {
                            let c = clamp(col as isize + dc, ncols);
                            let idx = r * ncols + c;
                            if let Some(rank) = self.rank(cells[idx]) {
                                candidates.push((rank, idx));
                            }
                        }
                    }
                    *slot = if candidates.is_empty() {
                        row * ncols + col
                    } else {
                        let k = candidates.len() / 2;
                        let (_, (_, idx), _) = candidates.select_nth_unstable_by(k, compare);
                        *idx
                    };
                }
            });
        indices
    }

    /// Select cells of `field` according to `indices` from
    /// [`median_indices`](Self::median_indices).
    pub fn apply(field: &Field, indices: &[usize]) -> RadarResult<Field> {
        if indices.len() != field.len() {
            return Err(RadarError::invalid_config(format!(
                "{} median indices for a field of {} cells",
                indices.len(),
                field.len()
            )));
        }
        let cells = field.cells();
        let selected = indices
            .iter()
            .map(|&i| {
                cells.get(i).copied().ok_or_else(|| {
                    RadarError::invalid_config(format!("median index {} out of range", i))
                })
            })
            .collect::<RadarResult<Vec<Cell>>>()?;
        Field::new(field.nrows(), field.ncols(), selected)
    }

    /// Compute the selection on `field` and apply it.
    pub fn filter(&self, field: &Field) -> RadarResult<Field> {
        Self::apply(field, &self.median_indices(field))
    }

    fn rank(&self, cell: Cell) -> Option<Rank> {
        match (cell, self.undetect) {
            (Cell::Value(v), _) if !v.is_nan() => Some(Rank::Value(v)),
            (Cell::Undetect, UndetectHandling::RankLowest) => Some(Rank::Undetect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Rank {
    Undetect,
    Value(f32),
}

fn compare(a: &(Rank, usize), b: &(Rank, usize)) -> Ordering {
    let by_rank = match (a.0, b.0) {
        (Rank::Undetect, Rank::Undetect) => Ordering::Equal,
        (Rank::Undetect, Rank::Value(_)) => Ordering::Less,
        (Rank::Value(_), Rank::Undetect) => Ordering::Greater,
        (Rank::Value(x), Rank::Value(y)) => x.total_cmp(&y),
    };
    by_rank.then(a.1.cmp(&b.1))
}

#[inline]
fn clamp(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
