//! Shared names and enumerated mask values.

use serde::{Deserialize, Serialize};

/// Name a land/sea mask field must carry to be accepted by the vicinity filter.
pub const LAND_BINARY_MASK: &str = "land_binary_mask";

/// Name given to the output of the day/night classifier.
pub const DAY_NIGHT_MASK: &str = "day_night_mask";

/// Units string for dimensionless outputs.
pub const UNITLESS: &str = "1";

/// Illumination class of a grid cell. The discriminants are the values
/// written into mask fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayNight {
    Night = 0,
    Day = 1,
}

impl DayNight {
    #[inline]
    pub fn value(self) -> f64 {
        self as u8 as f64
    }

    /// Interpret a stored mask value. Anything other than exactly 1 is night.
    #[inline]
    pub fn from_value(v: f64) -> Self {
        if v == 1.0 {
            DayNight::Day
        } else {
            DayNight::Night
        }
    }
}
