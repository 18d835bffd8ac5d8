//! Square-window neighbourhood operations on single horizontal slices.
//!
//! A neighbourhood of half-width `r` about cell (i, j) is the
//! (2r+1)×(2r+1) square of cells (i±r, j±r). Cells beyond the domain edge
//! are absent: they add nothing to a sum and nothing to a maximum.

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::field::SpatialGrid;

/// Convert a physical radius in metres to a whole number of grid cells.
///
/// `round(radius / spacing)` along x. A zero radius is zero cells; a
/// positive radius that rounds to zero cells is an error, as is any
/// physical radius on a lat/lon grid.
pub fn radius_to_grid_cells(grid: &SpatialGrid, radius: f64) -> Result<usize> {
    if !(radius >= 0.0) {
        return Err(Error::NegativeRadius(radius));
    }
    if radius == 0.0 {
        return Ok(0);
    }
    if grid.crs().is_geographic() {
        return Err(Error::RadiusOnGeographicGrid);
    }
    let spacing = grid.grid_spacing()?;
    let cells = (radius / spacing).round();
    if cells < 1.0 {
        return Err(Error::ZeroCellExtent { radius, spacing });
    }
    Ok(cells as usize)
}

/// Sum of values within a square neighbourhood of every cell.
pub trait WindowedSum: Send + Sync {
    fn sum(&self, values: ArrayView2<f64>, half_width: usize) -> Array2<f64>;
}

/// [`WindowedSum`] backed by a summed-area table; cost is independent of the
/// window size.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareNeighbourhood;

impl WindowedSum for SquareNeighbourhood {
    fn sum(&self, values: ArrayView2<f64>, half_width: usize) -> Array2<f64> {
        let (rows, cols) = values.dim();
        let half_width = half_width.min(rows.max(cols));
        // table[[i, j]] = sum of values[..i, ..j]
        let mut table = Array2::<f64>::zeros((rows + 1, cols + 1));
        for i in 0..rows {
            let mut row_sum = 0.0;
            for j in 0..cols {
                row_sum += values[[i, j]];
                table[[i + 1, j + 1]] = table[[i, j + 1]] + row_sum;
            }
        }

        Array2::from_shape_fn((rows, cols), |(i, j)| {
            let r0 = i.saturating_sub(half_width);
            let c0 = j.saturating_sub(half_width);
            let r1 = (i + half_width + 1).min(rows);
            let c1 = (j + half_width + 1).min(cols);
            table[[r1, c1]] - table[[r0, c1]] - table[[r1, c0]] + table[[r0, c0]]
        })
    }
}

/// Maximum over a square neighbourhood, counting only cells where
/// `include` is true. A cell whose whole neighbourhood is excluded gets
/// `f64::NEG_INFINITY`.
///
/// Runs as two one-dimensional passes (rows, then columns), which gives the
/// same result as the full square for a maximum. A half-width wider than the
/// slice covers the whole slice.
pub fn maximum_filter(values: ArrayView2<f64>, include: ArrayView2<bool>, half_width: usize) -> Array2<f64> {
    let (rows, cols) = values.dim();
    let half_width = half_width.min(rows.max(cols));
    let masked = Array2::from_shape_fn((rows, cols), |idx| {
        if include[idx] {
            values[idx]
        } else {
            f64::NEG_INFINITY
        }
    });
    if half_width == 0 {
        return masked;
    }

    let along_rows = Array2::from_shape_fn((rows, cols), |(i, j)| {
        let c0 = j.saturating_sub(half_width);
        let c1 = (j + half_width).min(cols - 1);
        (c0..=c1).map(|c| masked[[i, c]]).fold(f64::NEG_INFINITY, f64::max)
    });
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let r0 = i.saturating_sub(half_width);
        let r1 = (i + half_width).min(rows - 1);
        (r0..=r1).map(|r| along_rows[[r, j]]).fold(f64::NEG_INFINITY, f64::max)
    })
}
