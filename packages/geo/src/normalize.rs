//! Canonicalization of arbitrary longitude/latitude pairs.
//!
//! The pair is projected onto the unit sphere and read back, which folds
//! latitudes past the poles (shifting longitude by 180 degrees) and wraps
//! longitude into `(-180, 180]` in one step.

use crate::GeoError;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    /// Longitude in `(-180, 180]`.
    pub lng: f64,
    /// Latitude in `[-90, 90]`.
    pub lat: f64,
}

/// Normalizes a raw `(lng, lat)` pair in degrees.
///
/// # Errors
///
/// Returns [`GeoError::InvalidCoordinate`] if either value is NaN or
/// infinite.
pub fn normalize(lng: f64, lat: f64) -> Result<LngLat, GeoError> {
    let lng = finite("longitude", lng)?;
    let lat = finite("latitude", lat)?;

    let (phi, lambda) = (lat.to_radians(), lng.to_radians());
    let x = phi.cos() * lambda.cos();
    let y = phi.cos() * lambda.sin();
    let z = phi.sin().clamp(-1.0, 1.0);

    let lat = z.asin().to_degrees();
    let mut lng = y.atan2(x).to_degrees();
    // atan2 yields -180 for a negative-zero y
    if lng <= -180.0 {
        lng += 360.0;
    }

    Ok(LngLat { lng, lat })
}

fn finite(axis: &'static str, value: f64) -> Result<f64, GeoError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeoError::InvalidCoordinate {
            axis,
            value: value.to_string(),
        })
    }
}
