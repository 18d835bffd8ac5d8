//! Gridded diagnostics: day/night masks from solar geometry, occurrence
//! within a vicinity, and binary field texture.
//!
//! Every diagnostic takes a [`GriddedField`] and returns a new one. Extra
//! dimensions (realization, time, ...) are handled slice by slice; enable
//! the `threading` feature to spread slices across a rayon pool.

pub mod constants;
pub mod daynight;
pub mod error;
pub mod field;
mod maybe_rayon;
pub mod neighbourhood;
pub mod projection;
pub mod solar;
pub mod texture;
pub mod threshold;
pub mod time;
pub mod vicinity;

pub use constants::{DayNight, DAY_NIGHT_MASK, LAND_BINARY_MASK};
pub use daynight::{apply_night_mask, DayNightClassifier};
pub use error::{Error, ErrorKind, Result};
pub use field::{DimKind, ExtraDim, GridCrs, GriddedField, ScalarCoord, SpatialGrid};
pub use texture::{TextureAnalyzer, TextureParams};
pub use vicinity::{VicinityFilter, VicinityParams};
