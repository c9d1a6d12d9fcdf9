#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spherical geometry helpers for geostore.
//!
//! Turns an arbitrary query point and angular radius into the values a
//! proximity query needs: a canonical WGS84 coordinate, a zoom tier, a
//! search distance in meters, and a simplification tolerance. Geometry
//! simplification itself is delegated to the `geo` crate.

pub mod distance;
pub mod normalize;
pub mod simplify;
pub mod zoom;

pub use distance::{EARTH_RADIUS_METERS, distance_to_geometry, haversine_meters};
pub use normalize::{LngLat, normalize};
pub use simplify::simplify_geometry;
pub use zoom::{
    DEFAULT_RADIUS, resolve_radius, search_radius_meters, simplification_tolerance,
    zoom_for_radius,
};

use thiserror::Error;

/// Errors produced while interpreting raw coordinates.
#[derive(Debug, Error)]
pub enum GeoError {
    /// A coordinate was missing, unparseable, or not a finite number.
    #[error("Invalid {axis}: {value:?} is not a finite number")]
    InvalidCoordinate {
        /// Which axis was rejected (`"longitude"` or `"latitude"`).
        axis: &'static str,
        /// The raw value as received.
        value: String,
    },
}
