//! Day/night classification of grid cells from solar position.
//!
//! Projected grids are classified cell by cell from solar elevation.
//! Geographic grids are classified against the terminator latitude of each
//! longitude column, which needs one trigonometric evaluation per column
//! rather than per cell.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};
use tracing::debug;

use crate::constants::{DayNight, DAY_NIGHT_MASK, UNITLESS};
use crate::error::{Error, Result};
use crate::field::{GriddedField, SpatialGrid};
use crate::maybe_rayon::*;
use crate::projection::{Projector, SphericalProjector};
use crate::solar;
use crate::time::{EpochSeconds, SolarTime, TimeResolver};

/// Classify a cell against the terminator latitude of its column.
///
/// With the sun north of the equator, cells at or north of the terminator
/// are day. Otherwise cells strictly south of it are day, so a cell lying
/// exactly on the terminator is night in that branch.
pub fn classify_against_terminator(latitude: f64, terminator: f64, declination: f64) -> DayNight {
    let day = if declination > 0.0 {
        latitude >= terminator
    } else {
        latitude < terminator
    };
    if day {
        DayNight::Day
    } else {
        DayNight::Night
    }
}

/// Produces a 0/1 mask (night/day) for every horizontal slice of a field.
pub struct DayNightClassifier<P = SphericalProjector, T = EpochSeconds> {
    projector: P,
    time: T,
}

impl DayNightClassifier {
    pub fn new() -> Self {
        Self { projector: SphericalProjector, time: EpochSeconds }
    }
}

impl Default for DayNightClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Projector, T: TimeResolver> DayNightClassifier<P, T> {
    pub fn with_collaborators(projector: P, time: T) -> Self {
        Self { projector, time }
    }

    /// Mask for a single slice of `grid` at `when`.
    pub fn classify_slice(&self, grid: &SpatialGrid, when: SolarTime) -> Result<Array2<f64>> {
        if grid.crs().is_geographic() {
            return Ok(by_terminator(grid, when));
        }
        let (lats, lons) = self.projector.to_lat_lon(grid.crs(), grid.x(), grid.y())?;
        Ok(by_elevation(lats.view(), lons.view(), when))
    }

    /// Mask with the input's shape and coordinates, named `day_night_mask`.
    ///
    /// Each slice takes its time from the field's time dimension, or from a
    /// scalar time coordinate when there is none.
    pub fn process(&self, field: &GriddedField) -> Result<GriddedField> {
        if field.time_for_slice(0).is_none() {
            return Err(Error::MissingTime(field.name.clone()));
        }
        let grid = field.grid();
        // Projection does not depend on time, so invert the grid once.
        let latlon = if grid.crs().is_geographic() {
            None
        } else {
            Some(self.projector.to_lat_lon(grid.crs(), grid.x(), grid.y())?)
        };
        let n = field.n_slices();
        debug!(field = %field.name, slices = n, geographic = latlon.is_none(), "classifying day/night");

        let slices = (0..n)
            .into_par_iter()
            .map(|i| {
                let value = field
                    .time_for_slice(i)
                    .ok_or_else(|| Error::MissingTime(field.name.clone()))?;
                let when = self.time.resolve(value)?;
                Ok(match &latlon {
                    Some((lats, lons)) => by_elevation(lats.view(), lons.view(), when),
                    None => by_terminator(grid, when),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let data = field.stack_slices(slices)?;
        Ok(
            GriddedField::new(DAY_NIGHT_MASK, UNITLESS, data, grid.clone(), field.dims().to_vec())?
                .with_scalar_coords(field.scalar_coords().to_vec()),
        )
    }
}

fn by_elevation(lats: ArrayView2<f64>, lons: ArrayView2<f64>, when: SolarTime) -> Array2<f64> {
    solar::elevation_grid(lats, lons, when.day_of_year, when.utc_hour).mapv(|e| {
        if e > 0.0 {
            DayNight::Day.value()
        } else {
            DayNight::Night.value()
        }
    })
}

fn by_terminator(grid: &SpatialGrid, when: SolarTime) -> Array2<f64> {
    let terminator = solar::terminator_latitude(ArrayView1::from(grid.x()), when.day_of_year, when.utc_hour);
    let declination = solar::declination(when.day_of_year);
    let lats = grid.y();
    Array2::from_shape_fn(grid.shape(), |(r, c)| {
        classify_against_terminator(lats[r], terminator[c], declination).value()
    })
}

/// Zero the night cells of `target` using a day/night `mask`.
///
/// The mask is broadcast over any target dimensions it does not carry (e.g.
/// height levels). Its own extra dimensions must appear on the target, in
/// the same order and with the same points. The target's validity mask is
/// kept as is.
pub fn apply_night_mask(target: &GriddedField, mask: &GriddedField) -> Result<GriddedField> {
    if target.grid() != mask.grid() {
        return Err(Error::CoordinateMismatch {
            field: target.name.clone(),
            other: mask.name.clone(),
        });
    }

    let mut positions = Vec::with_capacity(mask.dims().len());
    let mut from = 0;
    for md in mask.dims() {
        let found = target.dims()[from..]
            .iter()
            .position(|td| td.name == md.name && td.points == md.points)
            .map(|p| p + from)
            .ok_or_else(|| {
                Error::InvalidField(format!(
                    "mask dimension {} does not broadcast onto {}",
                    md.name, target.name
                ))
            })?;
        positions.push(found);
        from = found + 1;
    }

    let values = target.slices()?;
    let flags = mask.slices()?;
    let masked: Vec<Array2<f64>> = (0..target.n_slices())
        .map(|i| {
            let idx = target.slice_index(i);
            let mask_idx: Vec<usize> = positions.iter().map(|&p| idx[p]).collect();
            let flag = flags.index_axis(Axis(0), mask.slice_number(&mask_idx));
            let mut slice = values.index_axis(Axis(0), i).to_owned();
            Zip::from(&mut slice).and(&flag).for_each(|v, &f| {
                if DayNight::from_value(f) == DayNight::Night {
                    *v = 0.0;
                }
            });
            slice
        })
        .collect();

    target.with_data(target.stack_slices(masked)?)
}
