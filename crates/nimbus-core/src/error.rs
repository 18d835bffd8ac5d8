//! Error types for the diagnostics core.
//!
//! Every failure is deterministic: a misconfigured plugin or an input that
//! breaks a contract. Nothing here is transient, so callers never retry.

use thiserror::Error;

/// Broad failure category, for callers that branch on the class of error
/// rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Projection,
    InvalidField,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("only one of radius ({radius}) or grid_point_radius ({grid_point_radius}) may be set")]
    BothRadii { radius: f64, grid_point_radius: usize },

    #[error("radius must be non-negative, got {0}")]
    NegativeRadius(f64),

    #[error("radius of {radius} m on a {spacing} m grid gives zero cell extent")]
    ZeroCellExtent { radius: f64, spacing: f64 },

    #[error("a physical radius needs a projected grid; use a grid point radius on lat/lon grids")]
    RadiusOnGeographicGrid,

    #[error("land mask must be named {expected}, not {found}")]
    LandMaskName { expected: &'static str, found: String },

    #[error("land mask must be a single 2D slice, found {0} extra dimension(s)")]
    LandMaskDims(usize),

    #[error("{field} and {other} do not share the same spatial coordinates")]
    CoordinateMismatch { field: String, other: String },

    #[error("field {0} has no time coordinate to resolve solar position from")]
    MissingTime(String),

    #[error("input field must hold binary data only, found {0}")]
    NonBinary(f64),

    #[error("time value {0} is not a valid whole-second timestamp")]
    InvalidTime(f64),

    #[error("projection {0} is not supported by this projector")]
    UnsupportedProjection(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BothRadii { .. }
            | Error::NegativeRadius(_)
            | Error::ZeroCellExtent { .. }
            | Error::RadiusOnGeographicGrid
            | Error::LandMaskName { .. }
            | Error::LandMaskDims(_)
            | Error::CoordinateMismatch { .. }
            | Error::MissingTime(_) => ErrorKind::Configuration,
            Error::NonBinary(_) | Error::InvalidTime(_) => ErrorKind::Validation,
            Error::UnsupportedProjection(_) => ErrorKind::Projection,
            Error::InvalidField(_) | Error::Shape(_) => ErrorKind::InvalidField,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
