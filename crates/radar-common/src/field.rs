//! Two-dimensional fields of tagged cells.

use crate::cell::{Cell, Sentinels};
use crate::error::{RadarError, RadarResult};
use serde::{Deserialize, Serialize};

/// Row-major 2-D array of cells.
///
/// Fields are treated as immutable values: every transformation returns a
/// new field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    nrows: usize,
    ncols: usize,
    cells: Vec<Cell>,
}

impl Field {
    /// Create a field, checking that `cells` matches the shape.
    pub fn new(nrows: usize, ncols: usize, cells: Vec<Cell>) -> RadarResult<Self> {
        if cells.len() != nrows * ncols {
            return Err(RadarError::invalid_config(format!(
                "field of shape ({}, {}) needs {} cells, got {}",
                nrows,
                ncols,
                nrows * ncols,
                cells.len()
            )));
        }
        Ok(Self {
            nrows,
            ncols,
            cells,
        })
    }

    /// A field where every cell has the same state.
    pub fn filled(nrows: usize, ncols: usize, cell: Cell) -> Self {
        Self {
            nrows,
            ncols,
            cells: vec![cell; nrows * ncols],
        }
    }

    /// A field of measured values.
    pub fn from_values(nrows: usize, ncols: usize, values: &[f32]) -> RadarResult<Self> {
        Self::new(nrows, ncols, values.iter().map(|&v| Cell::Value(v)).collect())
    }

    /// Decode a raw array using numeric sentinels.
    pub fn from_raw(
        nrows: usize,
        ncols: usize,
        raw: &[f32],
        sentinels: &Sentinels,
    ) -> RadarResult<Self> {
        Self::new(nrows, ncols, raw.iter().map(|&v| sentinels.decode(v)).collect())
    }

    /// Encode as a raw array using numeric sentinels.
    pub fn to_raw(&self, sentinels: &Sentinels) -> Vec<f32> {
        self.cells.iter().map(|&c| sentinels.encode(c)).collect()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `(nrows, ncols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    /// Cell at `(row, col)`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        Some(self.cells[row * self.ncols + col])
    }

    /// Fail unless this field has the given shape.
    pub fn check_shape(&self, expected: (usize, usize)) -> RadarResult<()> {
        if self.shape() != expected {
            return Err(RadarError::shape_mismatch(expected, self.shape()));
        }
        Ok(())
    }

    /// Apply `f` to every cell.
    pub fn map(&self, f: impl Fn(Cell) -> Cell) -> Field {
        Field {
            nrows: self.nrows,
            ncols: self.ncols,
            cells: self.cells.iter().map(|&c| f(c)).collect(),
        }
    }

    /// Combine two fields of the same shape cell by cell.
    pub fn zip_map(&self, other: &Field, f: impl Fn(Cell, Cell) -> Cell) -> RadarResult<Field> {
        other.check_shape(self.shape())?;
        Ok(Field {
            nrows: self.nrows,
            ncols: self.ncols,
            cells: self
                .cells
                .iter()
                .zip(&other.cells)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Number of cells holding a measured value.
    pub fn count_values(&self) -> usize {
        self.cells.iter().filter(|c| c.is_value()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(Field::new(2, 3, vec![Cell::Missing; 5]).is_err());
        assert!(Field::new(2, 3, vec![Cell::Missing; 6]).is_ok());
    }

    #[test]
    fn test_get_row_major() {
        let f = Field::from_values(2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(f.get(1, 0), Some(Cell::Value(3.0)));
        assert_eq!(f.get(0, 2), Some(Cell::Value(2.0)));
        assert_eq!(f.get(2, 0), None);
    }

    #[test]
    fn test_raw_conversion() {
        let s = Sentinels::default();
        let f = Field::from_raw(1, 3, &[-9999.0, -3333.0, 4.0], &s).unwrap();
        assert_eq!(f.cells(), &[Cell::Missing, Cell::Undetect, Cell::Value(4.0)]);
        assert_eq!(f.to_raw(&s), vec![-9999.0, -3333.0, 4.0]);
    }

    #[test]
    fn test_zip_map_shape_mismatch() {
        let a = Field::filled(2, 2, Cell::Value(1.0));
        let b = Field::filled(3, 2, Cell::Value(1.0));
        match a.zip_map(&b, |x, _| x) {
            Err(RadarError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, (2, 2));
                assert_eq!(actual, (3, 2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
