use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coordinate reference of a grid's horizontal axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GridCrs {
    /// Axes are already geographic: x is longitude, y is latitude, in degrees.
    LatLon,
    /// Spherical Lambert azimuthal equal-area; axes in metres.
    LambertAzimuthalEqualArea {
        latitude_of_origin: f64,
        longitude_of_origin: f64,
        false_easting: f64,
        false_northing: f64,
    },
    /// A reference only an external projector knows how to invert.
    Named(String),
}

impl GridCrs {
    pub fn is_geographic(&self) -> bool {
        matches!(self, GridCrs::LatLon)
    }
}

#[derive(Deserialize)]
struct SpatialGridRepr {
    x: Vec<f64>,
    y: Vec<f64>,
    crs: GridCrs,
}

/// Horizontal grid: strictly monotonic x/y coordinates plus their reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpatialGridRepr")]
pub struct SpatialGrid {
    x: Vec<f64>,
    y: Vec<f64>,
    crs: GridCrs,
}

impl TryFrom<SpatialGridRepr> for SpatialGrid {
    type Error = Error;

    fn try_from(r: SpatialGridRepr) -> Result<Self> {
        SpatialGrid::new(r.x, r.y, r.crs)
    }
}

impl SpatialGrid {
    pub fn new(x: Vec<f64>, y: Vec<f64>, crs: GridCrs) -> Result<Self> {
        check_axis("x", &x)?;
        check_axis("y", &y)?;
        Ok(Self { x, y, crs })
    }

    /// Regularly spaced grid starting at `(x0, y0)`, increasing along both axes.
    pub fn regular(nx: usize, ny: usize, x0: f64, y0: f64, spacing: f64, crs: GridCrs) -> Result<Self> {
        let x = (0..nx).map(|i| x0 + i as f64 * spacing).collect();
        let y = (0..ny).map(|j| y0 + j as f64 * spacing).collect();
        Self::new(x, y, crs)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn crs(&self) -> &GridCrs {
        &self.crs
    }

    /// (rows, cols) of a single horizontal slice.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Absolute spacing between the first two x points, in axis units.
    pub fn grid_spacing(&self) -> Result<f64> {
        if self.x.len() < 2 {
            return Err(Error::InvalidField(
                "grid spacing needs at least two x points".into(),
            ));
        }
        Ok((self.x[1] - self.x[0]).abs())
    }
}

fn check_axis(name: &str, points: &[f64]) -> Result<()> {
    if points.is_empty() {
        return Err(Error::InvalidField(format!("{name} axis is empty")));
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(Error::InvalidField(format!("{name} axis has non-finite points")));
    }
    let increasing = points.windows(2).all(|w| w[1] > w[0]);
    let decreasing = points.windows(2).all(|w| w[1] < w[0]);
    if !(increasing || decreasing) {
        return Err(Error::InvalidField(format!("{name} axis is not strictly monotonic")));
    }
    Ok(())
}

/// Role of a non-spatial coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimKind {
    Realization,
    /// Seconds since 1970-01-01T00:00:00Z.
    Time,
    Other,
}

/// A leading (non-spatial) dimension of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraDim {
    pub name: String,
    pub kind: DimKind,
    pub points: Vec<f64>,
}

impl ExtraDim {
    pub fn new(name: impl Into<String>, kind: DimKind, points: Vec<f64>) -> Self {
        Self { name: name.into(), kind, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A coordinate that does not span a dimension, e.g. the single validity
/// time of a deterministic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarCoord {
    pub name: String,
    pub kind: DimKind,
    pub value: f64,
}

impl ScalarCoord {
    pub fn new(name: impl Into<String>, kind: DimKind, value: f64) -> Self {
        Self { name: name.into(), kind, value }
    }
}

#[derive(Deserialize)]
struct GriddedFieldRepr {
    name: String,
    units: String,
    data: ArrayD<f64>,
    #[serde(default)]
    mask: Option<ArrayD<bool>>,
    grid: SpatialGrid,
    #[serde(default)]
    dims: Vec<ExtraDim>,
    #[serde(default)]
    scalar_coords: Vec<ScalarCoord>,
}

/// An N-dimensional field on a fixed horizontal grid.
///
/// Data is laid out `[dims..., y, x]` in row-major order, so every
/// combination of extra-dimension indices owns one contiguous horizontal
/// slice. `mask`, when present, has the data's shape and is `true` where a
/// cell is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GriddedFieldRepr")]
pub struct GriddedField {
    pub name: String,
    pub units: String,
    data: ArrayD<f64>,
    mask: Option<ArrayD<bool>>,
    grid: SpatialGrid,
    dims: Vec<ExtraDim>,
    scalar_coords: Vec<ScalarCoord>,
}

impl TryFrom<GriddedFieldRepr> for GriddedField {
    type Error = Error;

    fn try_from(r: GriddedFieldRepr) -> Result<Self> {
        let field = GriddedField::new(r.name, r.units, r.data, r.grid, r.dims)?
            .with_scalar_coords(r.scalar_coords);
        match r.mask {
            Some(mask) => field.with_mask(mask),
            None => Ok(field),
        }
    }
}

impl GriddedField {
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        data: ArrayD<f64>,
        grid: SpatialGrid,
        dims: Vec<ExtraDim>,
    ) -> Result<Self> {
        check_shape(data.shape(), &grid, &dims)?;
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self {
            name: name.into(),
            units: units.into(),
            data,
            mask: None,
            grid,
            dims,
            scalar_coords: Vec::new(),
        })
    }

    /// Single horizontal slice with no extra dimensions.
    pub fn from_slice(
        name: impl Into<String>,
        units: impl Into<String>,
        data: Array2<f64>,
        grid: SpatialGrid,
    ) -> Result<Self> {
        Self::new(name, units, data.into_dyn(), grid, Vec::new())
    }

    /// Attach a validity mask (`true` = missing).
    pub fn with_mask(mut self, mask: ArrayD<bool>) -> Result<Self> {
        if mask.shape() != self.data.shape() {
            return Err(Error::InvalidField(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                self.data.shape()
            )));
        }
        self.mask = Some(if mask.is_standard_layout() {
            mask
        } else {
            mask.as_standard_layout().into_owned()
        });
        Ok(self)
    }

    pub fn with_scalar_coord(mut self, coord: ScalarCoord) -> Self {
        self.scalar_coords.push(coord);
        self
    }

    pub fn with_scalar_coords(mut self, coords: Vec<ScalarCoord>) -> Self {
        self.scalar_coords.extend(coords);
        self
    }

    /// Same metadata under a new name and units.
    pub fn renamed(mut self, name: impl Into<String>, units: impl Into<String>) -> Self {
        self.name = name.into();
        self.units = units.into();
        self
    }

    /// Copy of this field's coordinates and mask around new data of the same shape.
    pub fn with_data(&self, data: ArrayD<f64>) -> Result<Self> {
        if data.shape() != self.data.shape() {
            return Err(Error::InvalidField(format!(
                "replacement data shape {:?} does not match {:?}",
                data.shape(),
                self.data.shape()
            )));
        }
        let mut out = Self::new(
            self.name.clone(),
            self.units.clone(),
            data,
            self.grid.clone(),
            self.dims.clone(),
        )?
        .with_scalar_coords(self.scalar_coords.clone());
        out.mask = self.mask.clone();
        Ok(out)
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn mask(&self) -> Option<&ArrayD<bool>> {
        self.mask.as_ref()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn dims(&self) -> &[ExtraDim] {
        &self.dims
    }

    pub fn scalar_coords(&self) -> &[ScalarCoord] {
        &self.scalar_coords
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Index of the first extra dimension of the given kind.
    pub fn dim_position(&self, kind: DimKind) -> Option<usize> {
        self.dims.iter().position(|d| d.kind == kind)
    }

    /// Number of horizontal slices: the product of the extra-dimension lengths.
    pub fn n_slices(&self) -> usize {
        self.dims.iter().map(ExtraDim::len).product()
    }

    /// Multi-index over the extra dimensions of slice `i`, row-major.
    pub fn slice_index(&self, mut i: usize) -> Vec<usize> {
        let mut idx = vec![0; self.dims.len()];
        for (slot, dim) in idx.iter_mut().zip(&self.dims).rev() {
            *slot = i % dim.len();
            i /= dim.len();
        }
        idx
    }

    /// Inverse of [`slice_index`](Self::slice_index).
    pub fn slice_number(&self, idx: &[usize]) -> usize {
        idx.iter().zip(&self.dims).fold(0, |acc, (&i, dim)| acc * dim.len() + i)
    }

    /// All horizontal slices as a `(n_slices, y, x)` view.
    pub fn slices(&self) -> Result<ArrayView3<'_, f64>> {
        let (ny, nx) = self.grid.shape();
        Ok(self.data.view().into_shape_with_order((self.n_slices(), ny, nx))?)
    }

    /// The validity mask as `(n_slices, y, x)`, if present.
    pub fn mask_slices(&self) -> Result<Option<ArrayView3<'_, bool>>> {
        let (ny, nx) = self.grid.shape();
        let n = self.n_slices();
        match &self.mask {
            Some(m) => Ok(Some(m.view().into_shape_with_order((n, ny, nx))?)),
            None => Ok(None),
        }
    }

    /// Single horizontal slice by flat slice number.
    pub fn slice(&self, i: usize) -> Result<ArrayView2<'_, f64>> {
        Ok(self.slices()?.index_axis_move(Axis(0), i))
    }

    /// `true` where slice `i` holds a usable value.
    pub fn valid_slice(&self, i: usize) -> Result<Array2<bool>> {
        match self.mask_slices()? {
            Some(m) => Ok(m.index_axis(Axis(0), i).mapv(|missing| !missing)),
            None => Ok(Array2::from_elem(self.grid.shape(), true)),
        }
    }

    /// Time (epoch seconds) associated with slice `i`: the slice's point on a
    /// time dimension, else a scalar time coordinate.
    pub fn time_for_slice(&self, i: usize) -> Option<f64> {
        if let Some(pos) = self.dim_position(DimKind::Time) {
            let idx = self.slice_index(i);
            return Some(self.dims[pos].points[idx[pos]]);
        }
        self.scalar_coords
            .iter()
            .find(|c| c.kind == DimKind::Time)
            .map(|c| c.value)
    }

    /// Reassemble per-slice results, in slice order, into this field's full shape.
    pub fn stack_slices(&self, slices: Vec<Array2<f64>>) -> Result<ArrayD<f64>> {
        let (ny, nx) = self.grid.shape();
        let n = self.n_slices();
        if slices.len() != n {
            return Err(Error::InvalidField(format!(
                "expected {n} slices, got {}",
                slices.len()
            )));
        }
        let mut out = Array3::<f64>::zeros((n, ny, nx));
        for (i, s) in slices.iter().enumerate() {
            out.index_axis_mut(Axis(0), i).assign(s);
        }
        Ok(out.into_shape_with_order(self.data.shape().to_vec())?)
    }
}

fn check_shape(shape: &[usize], grid: &SpatialGrid, dims: &[ExtraDim]) -> Result<()> {
    let (ny, nx) = grid.shape();
    let mut expected: Vec<usize> = dims.iter().map(ExtraDim::len).collect();
    expected.push(ny);
    expected.push(nx);
    if shape != expected.as_slice() {
        return Err(Error::InvalidField(format!(
            "data shape {shape:?} does not match coordinates {expected:?}"
        )));
    }
    if let Some(d) = dims.iter().find(|d| d.is_empty()) {
        return Err(Error::InvalidField(format!("dimension {} is empty", d.name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn grid(nx: usize, ny: usize) -> SpatialGrid {
        SpatialGrid::regular(nx, ny, 0.0, 0.0, 2000.0, GridCrs::Named("test".into())).unwrap()
    }

    #[test]
    fn rejects_non_monotonic_axis() {
        let err = SpatialGrid::new(vec![0.0, 2.0, 1.0], vec![0.0], GridCrs::LatLon).unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn accepts_decreasing_axis() {
        let g = SpatialGrid::new(vec![3.0, 2.0, 1.0], vec![10.0, 5.0], GridCrs::LatLon).unwrap();
        assert_eq!(g.grid_spacing().unwrap(), 1.0);
        assert_eq!(g.shape(), (2, 3));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let data = Array::zeros(IxDyn(&[2, 4, 4]));
        let dims = vec![ExtraDim::new("realization", DimKind::Realization, vec![0.0, 1.0, 2.0])];
        assert!(GriddedField::new("x", "1", data, grid(4, 4), dims).is_err());
    }

    #[test]
    fn rejects_mask_of_wrong_shape() {
        let f = GriddedField::from_slice("x", "1", Array2::zeros((3, 3)), grid(3, 3)).unwrap();
        let mask = Array::from_elem(IxDyn(&[3, 2]), false);
        assert!(f.with_mask(mask).is_err());
    }

    #[test]
    fn slice_index_is_row_major_over_extra_dims() {
        let data = Array::zeros(IxDyn(&[2, 3, 2, 2]));
        let dims = vec![
            ExtraDim::new("realization", DimKind::Realization, vec![0.0, 1.0]),
            ExtraDim::new("time", DimKind::Time, vec![0.0, 3600.0, 7200.0]),
        ];
        let f = GriddedField::new("x", "1", data, grid(2, 2), dims).unwrap();
        assert_eq!(f.n_slices(), 6);
        assert_eq!(f.slice_index(0), vec![0, 0]);
        assert_eq!(f.slice_index(2), vec![0, 2]);
        assert_eq!(f.slice_index(4), vec![1, 1]);
        assert_eq!(f.slice_number(&[1, 1]), 4);
        assert_eq!(f.time_for_slice(4), Some(3600.0));
    }

    #[test]
    fn time_falls_back_to_scalar_coord() {
        let f = GriddedField::from_slice("x", "1", Array2::zeros((2, 2)), grid(2, 2))
            .unwrap()
            .with_scalar_coord(ScalarCoord::new("time", DimKind::Time, 1_510_228_800.0));
        assert_eq!(f.n_slices(), 1);
        assert_eq!(f.time_for_slice(0), Some(1_510_228_800.0));
    }

    #[test]
    fn stack_slices_restores_full_shape() {
        let data = Array::zeros(IxDyn(&[2, 2, 3]));
        let dims = vec![ExtraDim::new("realization", DimKind::Realization, vec![0.0, 1.0])];
        let f = GriddedField::new("x", "1", data, grid(3, 2), dims).unwrap();
        let stacked = f
            .stack_slices(vec![Array2::from_elem((2, 3), 1.0), Array2::from_elem((2, 3), 2.0)])
            .unwrap();
        assert_eq!(stacked.shape(), &[2, 2, 3]);
        assert_eq!(stacked[[1, 1, 2]], 2.0);
        assert_eq!(f.slice(1).unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn deserialising_validates_shape() {
        let good = GriddedField::from_slice("x", "1", Array2::zeros((2, 2)), grid(2, 2)).unwrap();
        let json = serde_json::to_string(&good).unwrap();
        let back: GriddedField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, good);

        let bad = json.replace("\"x\":[0.0,2000.0]", "\"x\":[0.0,2000.0,4000.0]");
        assert!(serde_json::from_str::<GriddedField>(&bad).is_err());
    }
}
