//! Solar geometry from day of year and UTC hour.
//!
//! Low-precision formulae suited to masking: declination from a single
//! cosine term, hour angle corrected by a five-term equation of time.
//! All angles in and out are degrees; trigonometry runs in f64.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use std::f64::consts::PI;

/// Solar declination in degrees for a 1-based day of year.
///
///   δ = −23.5° · cos(0.9856° · day + 9.3°)
pub fn declination(day_of_year: u32) -> f64 {
    -23.5 * (0.9856 * day_of_year as f64 + 9.3).to_radians().cos()
}

/// Equation-of-time correction in radians of solar time.
fn equation_of_time(day_of_year: u32) -> f64 {
    let theta = 2.0 * PI * day_of_year as f64 / 365.0;
    0.000075 + 0.001868 * theta.cos()
        - 0.032077 * theta.sin()
        - 0.014615 * (2.0 * theta).cos()
        - 0.040849 * (2.0 * theta).sin()
}

/// Solar hour angle in degrees at `longitude` (−180 to 180).
///
/// Solar time = utc_hour + 24·lon/360 + eqt·12/π; hour angle = (solar − 12)·15.
/// Negative before local solar noon, positive after.
pub fn hour_angle(longitude: f64, day_of_year: u32, utc_hour: f64) -> f64 {
    let lon_correction = 24.0 * longitude / 360.0;
    let solar_time = utc_hour + lon_correction + equation_of_time(day_of_year) * 12.0 / PI;
    (solar_time - 12.0) * 15.0
}

/// Solar elevation above the horizon in degrees.
pub fn elevation(latitude: f64, longitude: f64, day_of_year: u32, utc_hour: f64) -> f64 {
    let decl = declination(day_of_year).to_radians();
    elevation_with(decl, latitude, longitude, day_of_year, utc_hour)
}

fn elevation_with(decl_rad: f64, latitude: f64, longitude: f64, day_of_year: u32, utc_hour: f64) -> f64 {
    let h = hour_angle(longitude, day_of_year, utc_hour).to_radians();
    let lat = latitude.to_radians();
    (decl_rad.sin() * lat.sin() + decl_rad.cos() * lat.cos() * h.cos())
        .asin()
        .to_degrees()
}

/// Elevation at every cell of paired latitude/longitude arrays.
pub fn elevation_grid(
    latitudes: ArrayView2<f64>,
    longitudes: ArrayView2<f64>,
    day_of_year: u32,
    utc_hour: f64,
) -> Array2<f64> {
    let decl = declination(day_of_year).to_radians();
    Zip::from(&latitudes)
        .and(&longitudes)
        .map_collect(|&lat, &lon| elevation_with(decl, lat, lon, day_of_year, utc_hour))
}

/// Latitude of the day/night terminator at each longitude, in degrees.
///
///   φ = atan(−cos(h) / tan(δ))
///
/// As δ → 0 the quotient blows up and φ saturates towards ±90°. At exactly
/// δ = 0 with cos(h) = 0 the result is NaN; comparisons against it are
/// simply false, so callers never fail on it.
pub fn terminator_latitude(longitudes: ArrayView1<f64>, day_of_year: u32, utc_hour: f64) -> Array1<f64> {
    let tan_decl = declination(day_of_year).to_radians().tan();
    longitudes.mapv(|lon| {
        let h = hour_angle(lon, day_of_year, utc_hour).to_radians();
        (-h.cos() / tan_decl).atan().to_degrees()
    })
}
