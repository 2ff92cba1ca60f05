//! Interpolation of cell fields at fractional grid positions.

use radar_common::{Cell, Field};

/// Result of sampling a field at a fractional position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// The position lies inside the grid.
    Inside(Cell),
    /// The position lies outside the grid.
    Outside,
}

/// Bilinear interpolation.
///
/// `x` is the fractional column, `y` the fractional row.
///
/// Corners without a magnitude (`Missing`, `Unmapped`) are dropped and the
/// remaining weights renormalised; `Undetect` corners count as zero. The
/// result is `Undetect` when every contributing corner is `Undetect`, and
/// `Missing` when no corner contributes.
pub fn bilinear_interpolate(field: &Field, x: f64, y: f64) -> Sample {
    if !in_bounds(field, x, y) {
        return Sample::Outside;
    }
    let (height, width) = field.shape();

    let x0 = (x.floor() as usize).min(width - 1);
    let y0 = (y.floor() as usize).min(height - 1);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = [
        (y0, x0, (1.0 - xf) * (1.0 - yf)),
        (y0, x1, xf * (1.0 - yf)),
        (y1, x0, (1.0 - xf) * yf),
        (y1, x1, xf * yf),
    ];

    let mut sum = 0.0f64;
    let mut weight = 0.0f64;
    let mut any_value = false;
    for (row, col, w) in corners {
        if w <= 0.0 {
            continue;
        }
        let Some(cell) = field.get(row, col) else {
            continue;
        };
        if let Some(v) = cell.magnitude() {
            sum += w * v as f64;
            weight += w;
            any_value |= cell.is_value();
        }
    }

    if weight <= 0.0 {
        // A position exactly on a sentinel cell keeps its state
        return Sample::Inside(match field.get(y0, x0) {
            Some(Cell::Unmapped) => Cell::Unmapped,
            _ => Cell::Missing,
        });
    }
    if !any_value {
        return Sample::Inside(Cell::Undetect);
    }
    Sample::Inside(Cell::Value((sum / weight) as f32))
}

#[inline]
fn in_bounds(field: &Field, x: f64, y: f64) -> bool {
    let (height, width) = field.shape();
    width > 0
        && height > 0
        && x.is_finite()
        && y.is_finite()
        && x >= 0.0
        && y >= 0.0
        && x <= (width - 1) as f64
        && y <= (height - 1) as f64
}
