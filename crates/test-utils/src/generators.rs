//! Test data generators for synthetic radar fields and grids.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

use radar_common::{Cell, Field, LatLonGrid};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Same pattern as [`create_test_grid`], as a field of values.
pub fn create_test_field(width: usize, height: usize) -> Field {
    Field::from_values(height, width, &create_test_grid(width, height))
        .expect("generated data matches shape")
}

/// Field filled with one value.
pub fn create_constant_field(width: usize, height: usize, value: f32) -> Field {
    Field::filled(height, width, Cell::Value(value))
}

/// Precipitation-rate field in mm/h: mostly `Undetect`, with rain in a
/// deterministic quarter of the cells (0 to 50 mm/h).
pub fn create_precipitation_field(width: usize, height: usize, seed: u32) -> Field {
    let mut cells = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            cells.push(if hash % 4 == 0 {
                Cell::Value((hash % 5000) as f32 / 100.0)
            } else {
                Cell::Undetect
            });
        }
    }
    Field::new(height, width, cells).expect("generated data matches shape")
}

/// A single Gaussian rain cell of `peak` mm/h centred on `(row, col)`,
/// `Undetect` where the rate drops below 0.1 mm/h.
pub fn create_storm_field(
    width: usize,
    height: usize,
    center: (f64, f64),
    sigma: f64,
    peak: f32,
) -> Field {
    let mut cells = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dr = row as f64 - center.0;
            let dc = col as f64 - center.1;
            let v = peak as f64 * (-(dr * dr + dc * dc) / (2.0 * sigma * sigma)).exp();
            cells.push(if v < 0.1 {
                Cell::Undetect
            } else {
                Cell::Value(v as f32)
            });
        }
    }
    Field::new(height, width, cells).expect("generated data matches shape")
}

/// Copy of `field` with the given `(row, col)` cells replaced by `cell`.
pub fn with_cells(field: &Field, positions: &[(usize, usize)], cell: Cell) -> Field {
    let (rows, cols) = field.shape();
    let mut cells = field.cells().to_vec();
    for &(row, col) in positions {
        if row < rows && col < cols {
            cells[row * cols + col] = cell;
        }
    }
    Field::new(rows, cols, cells).expect("shape unchanged")
}

/// Regular lat/lon grid with square cells of `resolution` degrees.
pub fn create_latlon_grid(
    lat0: f64,
    lon0: f64,
    resolution: f64,
    width: usize,
    height: usize,
) -> LatLonGrid {
    LatLonGrid::regular(lat0, lon0, resolution, resolution, height, width)
        .expect("valid regular grid")
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_field() {
        let f = create_test_field(4, 3);
        assert_eq!(f.shape(), (3, 4));
        assert_eq!(f.get(2, 1), Some(Cell::Value(1002.0)));
    }

    #[test]
    fn test_precipitation_field_is_deterministic() {
        let a = create_precipitation_field(20, 20, 7);
        let b = create_precipitation_field(20, 20, 7);
        assert_eq!(a, b);
        assert!(a.count_values() > 0);
        assert!(a.cells().iter().any(|c| *c == Cell::Undetect));
    }

    #[test]
    fn test_storm_field_peak() {
        let f = create_storm_field(11, 11, (5.0, 5.0), 2.0, 40.0);
        assert_eq!(f.get(5, 5), Some(Cell::Value(40.0)));
        assert_eq!(f.get(0, 0), Some(Cell::Undetect));
    }

    #[test]
    fn test_with_cells() {
        let f = with_cells(&create_constant_field(3, 3, 1.0), &[(1, 1), (9, 9)], Cell::Missing);
        assert_eq!(f.get(1, 1), Some(Cell::Missing));
        assert_eq!(f.count_values(), 8);
    }
}
