//! Field texture: how fragmented a binary field is within a neighbourhood.
//!
//! For every cell where the field is present, the number of edges it shares
//! with absent cells is compared with the number of edges it could share.
//! A high ratio marks a broken, clumpy field; a low one a contiguous sheet.

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::UNITLESS;
use crate::error::{Error, Result};
use crate::field::{DimKind, ExtraDim, GriddedField};
use crate::maybe_rayon::*;
use crate::neighbourhood::{radius_to_grid_cells, SquareNeighbourhood, WindowedSum};
use crate::threshold::BasicThreshold;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureParams {
    /// Neighbourhood radius in metres.
    pub neighbourhood_radius: f64,
    /// Ratio above which a cell counts as textured.
    #[serde(default = "default_ratio_threshold")]
    pub ratio_threshold: f64,
}

fn default_ratio_threshold() -> f64 {
    0.05
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            neighbourhood_radius: 10_000.0,
            ratio_threshold: default_ratio_threshold(),
        }
    }
}

/// Number of the four orthogonal neighbours of each present cell that are
/// absent. Edges are padded by repeating the border value, so the domain
/// boundary never counts as a transition.
pub fn transitions(values: ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = values.dim();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        if values[[i, j]] == 0.0 {
            return 0.0;
        }
        let neighbours = [
            (i.saturating_sub(1), j),
            ((i + 1).min(rows - 1), j),
            (i, j.saturating_sub(1)),
            (i, (j + 1).min(cols - 1)),
        ];
        neighbours
            .iter()
            .filter(|&&idx| values[idx] == 0.0)
            .count() as f64
    })
}

/// Actual over potential transitions within a neighbourhood of `half_width`
/// cells. Cells with no potential transitions, including every absent
/// cell, get a ratio of 1.
pub fn ratio<W: WindowedSum>(summer: &W, values: ArrayView2<f64>, half_width: usize) -> Array2<f64> {
    let present = values.mapv(|v| v != 0.0);
    let potential = summer.sum(values, half_width) * 4.0;
    let actual = summer.sum(transitions(values).view(), half_width);

    Zip::from(&potential)
        .and(&actual)
        .and(&present)
        .map_collect(|&p, &a, &here| {
            let p = if here { p } else { 0.0 };
            let a = if here { a } else { 0.0 };
            if p > 0.0 {
                a / p
            } else {
                1.0
            }
        })
}

/// Probability, across the ensemble, that a binary field is textured.
pub struct TextureAnalyzer<W = SquareNeighbourhood> {
    params: TextureParams,
    summer: W,
}

impl TextureAnalyzer {
    pub fn new(params: TextureParams) -> Result<Self> {
        Self::with_windowed_sum(params, SquareNeighbourhood)
    }
}

impl<W: WindowedSum> TextureAnalyzer<W> {
    pub fn with_windowed_sum(params: TextureParams, summer: W) -> Result<Self> {
        if !(params.neighbourhood_radius >= 0.0) {
            return Err(Error::NegativeRadius(params.neighbourhood_radius));
        }
        Ok(Self { params, summer })
    }

    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    /// Texture ratio of every slice, named `texture_of_<name>`.
    ///
    /// Missing cells count as absent and keep the input's validity mask.
    /// Fails if any valid cell holds a value other than 0 or 1.
    pub fn ratio_field(&self, field: &GriddedField) -> Result<GriddedField> {
        let is_binary = |v: f64| v == 0.0 || v == 1.0;
        let bad = match field.mask() {
            Some(mask) => Zip::from(field.data())
                .and(mask)
                .fold(None, |found, &v, &missing| {
                    found.or((!missing && !is_binary(v)).then_some(v))
                }),
            None => field.data().iter().copied().find(|&v| !is_binary(v)),
        };
        if let Some(bad) = bad {
            return Err(Error::NonBinary(bad));
        }

        let half_width = radius_to_grid_cells(field.grid(), self.params.neighbourhood_radius)?;
        let n = field.n_slices();
        debug!(field = %field.name, slices = n, half_width, masked = field.mask().is_some(), "texture ratio");

        let values = field.slices()?;
        let slices = (0..n)
            .into_par_iter()
            .map(|i| {
                let valid = field.valid_slice(i)?;
                let present = Zip::from(values.index_axis(Axis(0), i))
                    .and(&valid)
                    .map_collect(|&v, &ok| if ok { v } else { 0.0 });
                Ok(ratio(&self.summer, present.view(), half_width))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(field
            .with_data(field.stack_slices(slices)?)?
            .renamed(format!("texture_of_{}", field.name), UNITLESS))
    }

    /// Threshold each slice's texture ratio and average over realizations.
    ///
    /// The realization dimension, if any, is dropped from the output; other
    /// extra dimensions are kept and handled independently.
    pub fn process(&self, field: &GriddedField) -> Result<GriddedField> {
        let ratios = self.ratio_field(field)?;
        let threshold = BasicThreshold::new(self.params.ratio_threshold);
        let ratio_slices = ratios.slices()?;

        let realization = field.dim_position(DimKind::Realization);
        let members = realization.map_or(1, |pos| field.dims()[pos].len());
        let kept: Vec<ExtraDim> = field
            .dims()
            .iter()
            .filter(|d| d.kind != DimKind::Realization)
            .cloned()
            .collect();
        let kept_lens: Vec<usize> = kept.iter().map(ExtraDim::len).collect();
        let n_out: usize = kept_lens.iter().product();
        debug!(field = %field.name, members, outputs = n_out, "averaging texture over realizations");

        let (ny, nx) = field.grid().shape();
        let mut out = Array3::<f64>::zeros((n_out, ny, nx));
        for (o, mut target) in out.axis_iter_mut(Axis(0)).enumerate() {
            let mut idx = unravel(o, &kept_lens);
            if let Some(pos) = realization {
                idx.insert(pos, 0);
            }
            for member in 0..members {
                if let Some(pos) = realization {
                    idx[pos] = member;
                }
                let slice = ratio_slices.index_axis(Axis(0), field.slice_number(&idx));
                target += &threshold.process(slice);
            }
            target /= members as f64;
        }

        let mut shape = kept_lens;
        shape.extend([ny, nx]);
        let data = out.into_shape_with_order(shape)?;
        Ok(GriddedField::new(
            format!("probability_of_texture_of_{}_above_threshold", field.name),
            UNITLESS,
            data,
            field.grid().clone(),
            kept,
        )?
        .with_scalar_coords(field.scalar_coords().to_vec()))
    }
}

/// Row-major multi-index of flat position `i` over dimensions of `lens`.
fn unravel(mut i: usize, lens: &[usize]) -> Vec<usize> {
    let mut idx = vec![0; lens.len()];
    for (slot, &len) in idx.iter_mut().zip(lens).rev() {
        *slot = i % len;
        i /= len;
    }
    idx
}
