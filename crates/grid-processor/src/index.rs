//! Reusable projection index from a source grid to a destination grid.
//!
//! Building the index is the expensive step: every destination cell is
//! paired with the source cells that feed it. Once built, projecting a
//! field is a cheap gather, so one index serves any number of fields and
//! timestamps on the same grid pair.
//!
//! ```text
//! ProjIndex::build(src, dest, config)
//!      │
//!      ├─► Nearest:       dest cell ──► closest src cell (or none, outside)
//!      ├─► TileAverage:   src cell  ──► closest dest cell, inverted to lists
//!      └─► RadiusAverage: dest cell ──► src cells within radius
//!      │
//!      ▼
//! ProjIndex::project(field) / project_with_quality(field, quality)
//! ```

use crate::config::{ResampleConfig, ResampleMethod};
use crate::search::PointIndex;
use projection::{chord_for_distance_km, ExtendDistance, GeoPoint};
use radar_common::{Cell, Field, LatLonGrid, RadarError, RadarResult};
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Source cells feeding each destination cell.
#[derive(Debug, Clone)]
enum Mapping {
    /// At most one source cell per destination cell.
    Nearest(Vec<Option<usize>>),
    /// Compressed lists: the sources of destination `d` are
    /// `sources[offsets[d]..offsets[d + 1]]`, in increasing source order.
    Average {
        offsets: Vec<usize>,
        sources: Vec<usize>,
    },
}

/// Precomputed mapping between a source and a destination lat/lon grid.
#[derive(Debug, Clone)]
pub struct ProjIndex {
    config: ResampleConfig,
    src_shape: (usize, usize),
    dest_shape: (usize, usize),
    mapping: Mapping,
    border: Option<Vec<GeoPoint>>,
}

impl ProjIndex {
    /// Build the index for `src -> dest`.
    pub fn build(src: &LatLonGrid, dest: &LatLonGrid, config: &ResampleConfig) -> RadarResult<Self> {
        let start = Instant::now();

        let mapping = match config.method {
            ResampleMethod::Nearest => Mapping::Nearest(build_nearest(src, dest, config)),
            ResampleMethod::TileAverage => {
                let assigned = build_tile_assignment(src, dest, config);
                invert(&assigned, dest.len())
            }
            ResampleMethod::RadiusAverage { radius_km } => {
                if radius_km.is_nan() || radius_km <= 0.0 {
                    return Err(RadarError::invalid_config("radius_km must be positive"));
                }
                build_radius_lists(src, dest, radius_km)
            }
        };

        let border = (config.extend_x && config.extend_y).then(|| src.border_polygon());

        let index = Self {
            config: *config,
            src_shape: src.shape(),
            dest_shape: dest.shape(),
            mapping,
            border,
        };

        debug!(
            method = %config.method.name(),
            src_shape = ?index.src_shape,
            dest_shape = ?index.dest_shape,
            covered = index.covered_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built projection index"
        );

        Ok(index)
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    pub fn src_shape(&self) -> (usize, usize) {
        self.src_shape
    }

    pub fn dest_shape(&self) -> (usize, usize) {
        self.dest_shape
    }

    /// Outline of the source domain, half a cell outside its outermost
    /// cells. Only available when border detection is on in both
    /// directions.
    pub fn border(&self) -> Option<&[GeoPoint]> {
        self.border.as_deref()
    }

    /// Per destination cell (row-major), whether any source cell maps to it.
    pub fn coverage_mask(&self) -> Vec<bool> {
        match &self.mapping {
            Mapping::Nearest(src) => src.iter().map(Option::is_some).collect(),
            Mapping::Average { offsets, .. } => offsets.windows(2).map(|w| w[1] > w[0]).collect(),
        }
    }

    /// Number of destination cells with at least one source cell.
    pub fn covered_count(&self) -> usize {
        self.coverage_mask().into_iter().filter(|c| *c).count()
    }

    /// Approximate heap size of the index in bytes.
    pub fn memory_bytes(&self) -> usize {
        let word = std::mem::size_of::<usize>();
        let mapping = match &self.mapping {
            Mapping::Nearest(src) => src.len() * std::mem::size_of::<Option<usize>>(),
            Mapping::Average { offsets, sources } => (offsets.len() + sources.len()) * word,
        };
        let border = self.border.as_ref().map_or(0, |b| b.len() * std::mem::size_of::<GeoPoint>());
        mapping + border
    }

    /// Project a field onto the destination grid.
    ///
    /// Averaging modes give every valid source cell a weight of one.
    pub fn project(&self, data: &Field) -> RadarResult<Field> {
        data.check_shape(self.src_shape)?;
        match &self.mapping {
            Mapping::Nearest(src) => gather(data, src, self.dest_shape),
            Mapping::Average { offsets, sources } => {
                let ones = Field::filled(self.src_shape.0, self.src_shape.1, Cell::Value(1.0));
                let (out, _) = self.average(offsets, sources, data, &ones)?;
                Ok(out)
            }
        }
    }

    /// Project a field together with its quality index.
    ///
    /// Nearest copies both fields. Averaging modes weight each source value
    /// by its quality: data becomes `sum(q*v)/sum(q)` and quality
    /// `sum(q*q)/sum(q)`, so mixing confident and doubtful data lowers the
    /// resulting quality.
    pub fn project_with_quality(&self, data: &Field, quality: &Field) -> RadarResult<(Field, Field)> {
        data.check_shape(self.src_shape)?;
        quality.check_shape(self.src_shape)?;
        match &self.mapping {
            Mapping::Nearest(src) => Ok((
                gather(data, src, self.dest_shape)?,
                gather(quality, src, self.dest_shape)?,
            )),
            Mapping::Average { offsets, sources } => self.average(offsets, sources, data, quality),
        }
    }

    fn average(
        &self,
        offsets: &[usize],
        sources: &[usize],
        data: &Field,
        weights: &Field,
    ) -> RadarResult<(Field, Field)> {
        let (rows, cols) = self.dest_shape;
        let min_hits = self.config.min_hits;
        let data_cells = data.cells();
        let weight_cells = weights.cells();

        let (out_data, out_weights): (Vec<Cell>, Vec<Cell>) = offsets
            .par_windows(2)
            .map(|w| {
                let contributors = &sources[w[0]..w[1]];
                if contributors.is_empty() {
                    return (Cell::Unmapped, Cell::Unmapped);
                }
                let acc = contributors.iter().fold(Accumulator::default(), |mut acc, &s| {
                    acc.add(data_cells[s], weight_cells[s]);
                    acc
                });
                acc.finish(min_hits)
            })
            .unzip();

        Ok((Field::new(rows, cols, out_data)?, Field::new(rows, cols, out_weights)?))
    }
}

/// Running weighted sums for one destination cell.
#[derive(Debug, Default)]
struct Accumulator {
    sum_wv: f64,
    sum_ww: f64,
    sum_w: f64,
    hits: usize,
    any_value: bool,
}

impl Accumulator {
    fn add(&mut self, data: Cell, weight: Cell) {
        let Some(v) = data.magnitude() else {
            return;
        };
        let w = weight.magnitude().unwrap_or(0.0).max(0.0) as f64;
        self.sum_wv += w * v as f64;
        self.sum_ww += w * w;
        self.sum_w += w;
        self.hits += 1;
        self.any_value |= data.is_value();
    }

    fn finish(&self, min_hits: usize) -> (Cell, Cell) {
        if self.hits < min_hits || self.sum_w <= 0.0 {
            return (Cell::Missing, Cell::Value(0.0));
        }
        let quality = Cell::Value((self.sum_ww / self.sum_w) as f32);
        if !self.any_value {
            return (Cell::Undetect, quality);
        }
        (Cell::Value((self.sum_wv / self.sum_w) as f32), quality)
    }
}

fn gather(field: &Field, src: &[Option<usize>], shape: (usize, usize)) -> RadarResult<Field> {
    let cells = field.cells();
    Field::new(
        shape.0,
        shape.1,
        src.iter().map(|s| s.map_or(Cell::Unmapped, |i| cells[i])).collect(),
    )
}

/// xyz of every point of `grid`, padded along the axes border detection
/// asks for. Real points come first (flat index order), padding after, so
/// an index `>= grid.len()` designates padding. On exact ties the real point
/// wins since ties resolve to the lowest index.
fn padded_points(grid: &LatLonGrid, config: &ResampleConfig) -> Vec<[f64; 3]> {
    let mut points: Vec<[f64; 3]> = (0..grid.len()).map(|i| xyz(grid.point(i))).collect();
    let (pad_rows, pad_cols) = (config.extend_y, config.extend_x);
    if !(pad_rows || pad_cols) {
        return points;
    }

    let padded = grid.extended(pad_rows, pad_cols, ExtendDistance::Full);
    let (rows, cols) = grid.shape();
    let (pr, pc) = (pad_rows as usize, pad_cols as usize);
    let (_, padded_cols) = padded.shape();
    for i in 0..padded.len() {
        let (r, c) = (i / padded_cols, i % padded_cols);
        let interior = r >= pr && r < rows + pr && c >= pc && c < cols + pc;
        if !interior {
            points.push(xyz(padded.point(i)));
        }
    }
    points
}

fn build_nearest(src: &LatLonGrid, dest: &LatLonGrid, config: &ResampleConfig) -> Vec<Option<usize>> {
    let n_src = src.len();
    let tree = PointIndex::new(padded_points(src, config));
    (0..dest.len())
        .into_par_iter()
        .map(|d| tree.nearest(&xyz(dest.point(d))).filter(|&s| s < n_src))
        .collect()
}

/// Nearest destination cell of every source cell, `None` when the source
/// cell falls beyond the destination border.
fn build_tile_assignment(
    src: &LatLonGrid,
    dest: &LatLonGrid,
    config: &ResampleConfig,
) -> Vec<Option<usize>> {
    let n_dest = dest.len();
    let tree = PointIndex::new(padded_points(dest, config));
    (0..src.len())
        .into_par_iter()
        .map(|s| tree.nearest(&xyz(src.point(s))).filter(|&d| d < n_dest))
        .collect()
}

fn invert(assigned: &[Option<usize>], n_dest: usize) -> Mapping {
    let mut counts = vec![0usize; n_dest];
    for d in assigned.iter().flatten() {
        counts[*d] += 1;
    }
    let mut offsets = Vec::with_capacity(n_dest + 1);
    offsets.push(0);
    for c in &counts {
        offsets.push(offsets[offsets.len() - 1] + c);
    }
    let mut next = offsets[..n_dest].to_vec();
    let mut sources = vec![0usize; offsets[n_dest]];
    for (s, d) in assigned.iter().enumerate() {
        if let Some(d) = d {
            sources[next[*d]] = s;
            next[*d] += 1;
        }
    }
    Mapping::Average { offsets, sources }
}

fn build_radius_lists(src: &LatLonGrid, dest: &LatLonGrid, radius_km: f64) -> Mapping {
    let tree = PointIndex::new((0..src.len()).map(|i| xyz(src.point(i))));
    let chord = chord_for_distance_km(radius_km);
    let lists: Vec<Vec<usize>> = (0..dest.len())
        .into_par_iter()
        .map(|d| tree.within_chord(&xyz(dest.point(d)), chord))
        .collect();

    let mut offsets = Vec::with_capacity(lists.len() + 1);
    offsets.push(0);
    let mut sources = Vec::with_capacity(lists.iter().map(Vec::len).sum());
    for list in lists {
        sources.extend(list);
        offsets.push(sources.len());
    }
    Mapping::Average { offsets, sources }
}

#[inline]
fn xyz(p: GeoPoint) -> [f64; 3] {
    let v = p.to_xyz();
    [v.x, v.y, v.z]
}
