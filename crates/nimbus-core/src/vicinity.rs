//! Occurrence-within-vicinity: a neighbourhood maximum that optionally
//! refuses to carry values across a coastline.

use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::LAND_BINARY_MASK;
use crate::error::{Error, Result};
use crate::field::GriddedField;
use crate::maybe_rayon::*;
use crate::neighbourhood::{maximum_filter, radius_to_grid_cells};

/// Vicinity size, as a physical distance or a cell count. Set at most one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VicinityParams {
    /// Radius in metres; needs a projected grid.
    #[serde(default)]
    pub radius: Option<f64>,
    /// Radius in whole grid cells.
    #[serde(default)]
    pub grid_point_radius: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Extent {
    Identity,
    Distance(f64),
    GridPoints(usize),
}

/// Replaces each cell with the maximum over its square vicinity.
///
/// Missing cells neither contribute to their neighbours nor receive a new
/// value. With a land mask, land cells only see land and sea cells only see
/// sea.
#[derive(Debug, Clone)]
pub struct VicinityFilter {
    extent: Extent,
    land_mask: Option<GriddedField>,
}

impl VicinityFilter {
    pub fn new(params: VicinityParams, land_mask: Option<GriddedField>) -> Result<Self> {
        let extent = match (params.radius, params.grid_point_radius) {
            (Some(radius), Some(grid_point_radius)) => {
                return Err(Error::BothRadii { radius, grid_point_radius })
            }
            (Some(r), None) if !(r >= 0.0) => return Err(Error::NegativeRadius(r)),
            (Some(r), None) if r == 0.0 => Extent::Identity,
            (Some(r), None) => Extent::Distance(r),
            (None, Some(0)) | (None, None) => Extent::Identity,
            (None, Some(g)) => Extent::GridPoints(g),
        };

        if let Some(mask) = &land_mask {
            if mask.name != LAND_BINARY_MASK {
                return Err(Error::LandMaskName {
                    expected: LAND_BINARY_MASK,
                    found: mask.name.clone(),
                });
            }
            if !mask.dims().is_empty() {
                return Err(Error::LandMaskDims(mask.dims().len()));
            }
        }

        Ok(Self { extent, land_mask })
    }

    /// True when no radius (or a zero radius) was configured.
    pub fn is_identity(&self) -> bool {
        self.extent == Extent::Identity
    }

    /// Vicinity maximum of every horizontal slice of `field`.
    ///
    /// The result has the input's shape, coordinates and validity mask.
    pub fn process(&self, field: &GriddedField) -> Result<GriddedField> {
        let half_width = match self.extent {
            Extent::Identity => return Ok(field.clone()),
            Extent::Distance(r) => radius_to_grid_cells(field.grid(), r)?,
            Extent::GridPoints(g) => g,
        };

        let land = match &self.land_mask {
            Some(mask) => {
                if mask.grid() != field.grid() {
                    return Err(Error::CoordinateMismatch {
                        field: field.name.clone(),
                        other: mask.name.clone(),
                    });
                }
                Some(mask.slice(0)?.mapv(|v| v != 0.0))
            }
            None => None,
        };

        let n = field.n_slices();
        debug!(
            field = %field.name,
            slices = n,
            half_width,
            land_mask = land.is_some(),
            "maximum within vicinity"
        );

        let values = field.slices()?;
        let slices = (0..n)
            .into_par_iter()
            .map(|i| {
                let valid = field.valid_slice(i)?;
                Ok(maximum_within_vicinity(
                    values.index_axis(Axis(0), i),
                    valid.view(),
                    land.as_ref().map(|l| l.view()),
                    half_width,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        field.with_data(field.stack_slices(slices)?)
    }
}

fn maximum_within_vicinity(
    values: ArrayView2<f64>,
    valid: ArrayView2<bool>,
    land: Option<ArrayView2<bool>>,
    half_width: usize,
) -> Array2<f64> {
    let mut out = match land {
        None => maximum_filter(values, valid, half_width),
        Some(land) => {
            let mut out = Array2::zeros(values.dim());
            for side in [true, false] {
                let include = Zip::from(&valid)
                    .and(&land)
                    .map_collect(|&ok, &is_land| ok && is_land == side);
                let side_max = maximum_filter(values, include.view(), half_width);
                Zip::from(&mut out)
                    .and(&side_max)
                    .and(&land)
                    .for_each(|o, &m, &is_land| {
                        if is_land == side {
                            *o = m;
                        }
                    });
            }
            out
        }
    };

    // Missing cells keep whatever they held.
    Zip::from(&mut out)
        .and(&values)
        .and(&valid)
        .for_each(|o, &v, &ok| {
            if !ok {
                *o = v;
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::field::{DimKind, ExtraDim, GridCrs, SpatialGrid};
    use ndarray::{array, Array, ArrayD, IxDyn};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const RADIUS: f64 = 2000.0;
    const GRID_POINT_RADIUS: usize = 1;

    fn equal_area(n: usize) -> SpatialGrid {
        let crs = GridCrs::LambertAzimuthalEqualArea {
            latitude_of_origin: 54.9,
            longitude_of_origin: -2.5,
            false_easting: 0.0,
            false_northing: 0.0,
        };
        SpatialGrid::regular(n, n, 0.0, 0.0, 2000.0, crs).unwrap()
    }

    fn latlon(n: usize) -> SpatialGrid {
        SpatialGrid::regular(n, n, 0.0, 0.0, 1.0, GridCrs::LatLon).unwrap()
    }

    fn field(data: Array2<f64>, grid: SpatialGrid) -> GriddedField {
        GriddedField::from_slice("lwe_precipitation_rate", "m s-1", data, grid).unwrap()
    }

    fn two_events() -> Array2<f64> {
        let mut data = Array2::zeros((5, 5));
        data[[0, 1]] = 1.0;
        data[[2, 3]] = 1.0;
        data
    }

    fn land_mask(n: usize) -> GriddedField {
        let mut mask = Array2::zeros((n, n));
        mask.slice_mut(ndarray::s![.., 3..]).fill(1.0);
        GriddedField::from_slice(LAND_BINARY_MASK, "1", mask, equal_area(n)).unwrap()
    }

    fn by_radius(radius: f64) -> VicinityParams {
        VicinityParams { radius: Some(radius), grid_point_radius: None }
    }

    fn by_cells(cells: usize) -> VicinityParams {
        VicinityParams { radius: None, grid_point_radius: Some(cells) }
    }

    fn binary_expected() -> Array2<f64> {
        array![
            [1.0, 1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0]
        ]
    }

    #[test]
    fn basic_by_radius_and_by_grid_points() {
        for params in [by_radius(RADIUS), by_cells(GRID_POINT_RADIUS)] {
            let input = field(two_events(), equal_area(5));
            let out = VicinityFilter::new(params, None).unwrap().process(&input).unwrap();
            assert_eq!(out.slice(0).unwrap(), binary_expected().view());
            assert_eq!(out.grid(), input.grid());
            assert_eq!(out.name, input.name);
        }
    }

    #[test]
    fn basic_latlon_by_grid_points() {
        let input = field(two_events(), latlon(5));
        let out = VicinityFilter::new(by_cells(GRID_POINT_RADIUS), None)
            .unwrap()
            .process(&input)
            .unwrap();
        assert_eq!(out.slice(0).unwrap(), binary_expected().view());
    }

    #[test]
    fn physical_radius_on_latlon_is_rejected() {
        let input = field(two_events(), latlon(5));
        let err = VicinityFilter::new(by_radius(RADIUS), None)
            .unwrap()
            .process(&input)
            .unwrap_err();
        assert!(matches!(err, Error::RadiusOnGeographicGrid));
    }

    #[test]
    fn zero_or_absent_radius_is_identity() {
        let params = [
            by_radius(0.0),
            by_cells(0),
            VicinityParams::default(),
        ];
        for grid in [equal_area(5), latlon(5)] {
            for p in params.clone() {
                let input = field(two_events(), grid.clone());
                let filter = VicinityFilter::new(p, None).unwrap();
                assert!(filter.is_identity());
                assert_eq!(filter.process(&input).unwrap(), input);
            }
        }
    }

    #[test]
    fn both_radii_always_rejected() {
        for (r, g) in [(0.0, 0), (RADIUS, 0), (0.0, 1), (RADIUS, 1), (-1.0, 3)] {
            let params = VicinityParams { radius: Some(r), grid_point_radius: Some(g) };
            let err = VicinityFilter::new(params, None).unwrap_err();
            assert!(matches!(err, Error::BothRadii { .. }));
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn negative_radius_rejected() {
        assert!(matches!(
            VicinityFilter::new(by_radius(-2000.0), None),
            Err(Error::NegativeRadius(_))
        ));
    }

    #[test]
    fn fuzzy_values_take_the_local_maximum() {
        let mut data = Array2::zeros((5, 5));
        data[[0, 1]] = 1.0;
        data[[2, 3]] = 0.5;
        let out = VicinityFilter::new(by_radius(RADIUS), None)
            .unwrap()
            .process(&field(data, equal_area(5)))
            .unwrap();
        let expected = array![
            [1.0, 1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 0.5, 0.5],
            [0.0, 0.0, 0.5, 0.5, 0.5],
            [0.0, 0.0, 0.5, 0.5, 0.5],
            [0.0, 0.0, 0.0, 0.0, 0.0]
        ];
        assert_eq!(out.slice(0).unwrap(), expected.view());
    }

    #[test]
    fn larger_distance() {
        let expected = array![
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0, 1.0, 1.0]
        ];
        for params in [by_radius(2.0 * RADIUS), by_cells(2 * GRID_POINT_RADIUS)] {
            let out = VicinityFilter::new(params, None)
                .unwrap()
                .process(&field(two_events(), equal_area(5)))
                .unwrap();
            assert_eq!(out.slice(0).unwrap(), expected.view());
        }
    }

    #[test]
    fn vicinity_wider_than_domain_takes_slice_maximum() {
        let mut data = two_events();
        data[[4, 0]] = 3.0;
        for params in [by_cells(usize::MAX), by_cells(50), by_radius(f64::INFINITY)] {
            let out = VicinityFilter::new(params, None)
                .unwrap()
                .process(&field(data.clone(), equal_area(5)))
                .unwrap();
            assert!(out.data().iter().all(|&v| v == 3.0));
        }
    }

    fn masked_corner_input() -> GriddedField {
        let mut data = two_events();
        data[[0, 4]] = 10.0;
        let mut missing = Array::from_elem(IxDyn(&[5, 5]), false);
        missing[[0, 4]] = true;
        field(data, equal_area(5)).with_mask(missing).unwrap()
    }

    #[test]
    fn missing_cells_are_ignored_and_mask_kept() {
        let input = masked_corner_input();
        let out = VicinityFilter::new(by_radius(RADIUS), None)
            .unwrap()
            .process(&input)
            .unwrap();
        let expected = array![
            [1.0, 1.0, 1.0, 0.0, 10.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0]
        ];
        assert_eq!(out.slice(0).unwrap(), expected.view());
        assert_eq!(out.mask(), input.mask());
    }

    #[test]
    fn land_mask_stops_events_crossing_the_coast() {
        let mut data = two_events();
        data[[0, 4]] = 10.0;
        let input = field(data, equal_area(5));
        let out = VicinityFilter::new(by_radius(RADIUS), Some(land_mask(5)))
            .unwrap()
            .process(&input)
            .unwrap();
        let expected = array![
            [1.0, 1.0, 1.0, 10.0, 10.0],
            [1.0, 1.0, 1.0, 10.0, 10.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0]
        ];
        assert_eq!(out.slice(0).unwrap(), expected.view());
        assert!(out.mask().is_none());
    }

    #[test]
    fn land_mask_with_missing_data() {
        let input = masked_corner_input();
        let out = VicinityFilter::new(by_radius(RADIUS), Some(land_mask(5)))
            .unwrap()
            .process(&input)
            .unwrap();
        let expected = array![
            [1.0, 1.0, 1.0, 0.0, 10.0],
            [1.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0]
        ];
        assert_eq!(out.slice(0).unwrap(), expected.view());
        assert_eq!(out.mask(), input.mask());
    }

    #[test]
    fn misnamed_land_mask_rejected() {
        let bad = land_mask(5).renamed("kittens", "1");
        let err = VicinityFilter::new(by_radius(RADIUS), Some(bad)).unwrap_err();
        assert!(matches!(err, Error::LandMaskName { ref found, .. } if found == "kittens"));
    }

    #[test]
    fn land_mask_on_other_grid_rejected() {
        let mask = land_mask(5);
        let mut x = mask.grid().x().to_vec();
        x[0] -= 1.0;
        let shifted = SpatialGrid::new(x, mask.grid().y().to_vec(), mask.grid().crs().clone()).unwrap();
        let bad = GriddedField::from_slice(LAND_BINARY_MASK, "1", mask.slice(0).unwrap().to_owned(), shifted).unwrap();
        let filter = VicinityFilter::new(by_radius(RADIUS), Some(bad)).unwrap();
        let err = filter.process(&field(two_events(), equal_area(5))).unwrap_err();
        assert!(matches!(err, Error::CoordinateMismatch { .. }));
    }

    #[test]
    fn multiple_realizations_and_times() {
        let dims = vec![
            ExtraDim::new("realization", DimKind::Realization, vec![0.0, 1.0]),
            ExtraDim::new("time", DimKind::Time, vec![1_510_228_800.0, 1_510_239_600.0]),
        ];
        let mut data: ArrayD<f64> = Array::zeros(IxDyn(&[2, 2, 4, 4]));
        data[[0, 0, 2, 1]] = 1.0;
        data[[1, 1, 1, 3]] = 1.0;
        let input = GriddedField::new("lwe_precipitation_rate", "m s-1", data, equal_area(4), dims).unwrap();

        let all_sea = GriddedField::from_slice(LAND_BINARY_MASK, "1", Array2::zeros((4, 4)), equal_area(4)).unwrap();
        for land in [None, Some(all_sea)] {
            let out = VicinityFilter::new(by_radius(RADIUS), land)
                .unwrap()
                .process(&input)
                .unwrap();
            assert_eq!(out.shape(), input.shape());
            let first = array![
                [0.0, 0.0, 0.0, 0.0],
                [1.0, 1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0, 0.0],
                [1.0, 1.0, 1.0, 0.0]
            ];
            let last = array![
                [0.0, 0.0, 1.0, 1.0],
                [0.0, 0.0, 1.0, 1.0],
                [0.0, 0.0, 1.0, 1.0],
                [0.0, 0.0, 0.0, 0.0]
            ];
            assert_eq!(out.slice(0).unwrap(), first.view());
            assert!(out.slice(1).unwrap().iter().all(|&v| v == 0.0));
            assert!(out.slice(2).unwrap().iter().all(|&v| v == 0.0));
            assert_eq!(out.slice(3).unwrap(), last.view());
        }
    }

    #[test]
    fn output_never_decreases_with_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let data = Array2::from_shape_fn((8, 8), |_| rng.gen_range(-5.0..5.0));
            let missing = Array::from_shape_fn(IxDyn(&[8, 8]), |_| rng.gen_bool(0.15));
            let land = Array2::from_shape_fn((8, 8), |_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 });
            let input = field(data, equal_area(8)).with_mask(missing).unwrap();
            let land = GriddedField::from_slice(LAND_BINARY_MASK, "1", land, equal_area(8)).unwrap();

            for mask in [None, Some(land)] {
                let mut previous = input.data().clone();
                for cells in 1..5 {
                    let out = VicinityFilter::new(by_cells(cells), mask.clone())
                        .unwrap()
                        .process(&input)
                        .unwrap();
                    assert!(
                        Zip::from(out.data()).and(&previous).all(|&a, &b| a >= b),
                        "radius {cells} decreased a cell"
                    );
                    previous = out.data().clone();
                }
            }
        }
    }
}
