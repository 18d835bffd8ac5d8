//! Grid-to-geographic coordinate transforms.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::field::GridCrs;

/// Mean earth radius used by the spherical transforms, metres.
pub const EARTH_RADIUS_M: f64 = 6_371_229.0;

/// Inverts a projected grid to latitude/longitude.
pub trait Projector: Send + Sync {
    /// Latitude and longitude in degrees for every `(row, col)` cell of the
    /// grid spanned by `x` (columns) and `y` (rows).
    fn to_lat_lon(&self, crs: &GridCrs, x: &[f64], y: &[f64]) -> Result<(Array2<f64>, Array2<f64>)>;
}

/// Closed-form spherical projections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalProjector;

impl Projector for SphericalProjector {
    fn to_lat_lon(&self, crs: &GridCrs, x: &[f64], y: &[f64]) -> Result<(Array2<f64>, Array2<f64>)> {
        let shape = (y.len(), x.len());
        match crs {
            GridCrs::LatLon => Ok((
                Array2::from_shape_fn(shape, |(r, _)| y[r]),
                Array2::from_shape_fn(shape, |(_, c)| x[c]),
            )),
            GridCrs::LambertAzimuthalEqualArea {
                latitude_of_origin,
                longitude_of_origin,
                false_easting,
                false_northing,
            } => {
                let mut lats = Array2::zeros(shape);
                let mut lons = Array2::zeros(shape);
                for ((r, c), lat) in lats.indexed_iter_mut() {
                    let (la, lo) = laea_inverse(
                        x[c] - false_easting,
                        y[r] - false_northing,
                        *latitude_of_origin,
                        *longitude_of_origin,
                    );
                    *lat = la;
                    lons[[r, c]] = lo;
                }
                Ok((lats, lons))
            }
            GridCrs::Named(name) => Err(Error::UnsupportedProjection(name.clone())),
        }
    }
}

/// Spherical Lambert azimuthal equal-area, inverse (Snyder 1987, eq. 24-16/26).
fn laea_inverse(x: f64, y: f64, lat0: f64, lon0: f64) -> (f64, f64) {
    let rho = x.hypot(y);
    if rho < 1e-9 {
        return (lat0, normalise_lon(lon0));
    }
    let (sin_p0, cos_p0) = lat0.to_radians().sin_cos();
    let c = 2.0 * (rho / (2.0 * EARTH_RADIUS_M)).min(1.0).asin();
    let (sin_c, cos_c) = c.sin_cos();
    let lat = (cos_c * sin_p0 + y * sin_c * cos_p0 / rho).clamp(-1.0, 1.0).asin();
    let lon = lon0.to_radians() + (x * sin_c).atan2(rho * cos_p0 * cos_c - y * sin_p0 * sin_c);
    (lat.to_degrees(), normalise_lon(lon.to_degrees()))
}

/// Spherical Lambert azimuthal equal-area, forward: degrees to metres
/// relative to the projection origin (false easting/northing not applied).
pub fn laea_forward(lat: f64, lon: f64, lat0: f64, lon0: f64) -> (f64, f64) {
    let (sin_p, cos_p) = lat.to_radians().sin_cos();
    let (sin_p0, cos_p0) = lat0.to_radians().sin_cos();
    let (sin_dl, cos_dl) = (lon - lon0).to_radians().sin_cos();
    let k = (2.0 / (1.0 + sin_p0 * sin_p + cos_p0 * cos_p * cos_dl)).sqrt();
    let x = EARTH_RADIUS_M * k * cos_p * sin_dl;
    let y = EARTH_RADIUS_M * k * (cos_p0 * sin_p - sin_p0 * cos_p * cos_dl);
    (x, y)
}

fn normalise_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
