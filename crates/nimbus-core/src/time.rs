//! Resolving a slice's time coordinate to solar calendar terms.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::{Error, Result};

/// Calendar position needed by the solar formulae.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarTime {
    /// 1-based day count from 1 January of the time's own year.
    pub day_of_year: u32,
    /// Fractional UTC hour, minute resolution.
    pub utc_hour: f64,
}

impl SolarTime {
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            day_of_year: dt.ordinal(),
            utc_hour: (dt.hour() as f64 * 60.0 + dt.minute() as f64) / 60.0,
        }
    }
}

/// Turns a stored time coordinate value into a [`SolarTime`].
pub trait TimeResolver: Send + Sync {
    fn resolve(&self, value: f64) -> Result<SolarTime>;
}

/// Time values are whole seconds since 1970-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochSeconds;

impl TimeResolver for EpochSeconds {
    fn resolve(&self, value: f64) -> Result<SolarTime> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(Error::InvalidTime(value));
        }
        let dt = DateTime::<Utc>::from_timestamp(value as i64, 0).ok_or(Error::InvalidTime(value))?;
        Ok(SolarTime::from_datetime(&dt))
    }
}
