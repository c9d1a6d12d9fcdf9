//! Great-circle distances on the sphere used for search radii.

use geo::{Closest, ClosestPoint, CoordsIter, Geometry, Point};

use crate::LngLat;

/// Radius in meters of a sphere with a 40,000 km circumference.
///
/// Query radii are converted to meters with this same sphere, so a feature
/// at angular distance `r` from the query point is exactly `r` away.
pub const EARTH_RADIUS_METERS: f64 = 20_000_000.0 / std::f64::consts::PI;

/// Haversine distance in meters between two coordinates.
#[must_use]
pub fn haversine_meters(from: LngLat, to: LngLat) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Distance in meters from `point` to the nearest part of `geometry`.
///
/// The nearest part is located in the planar lng/lat space and measured
/// with [`haversine_meters`], then compared against the nearest vertex on
/// the sphere; the smaller of the two wins. A point inside or on the
/// geometry (in the planar sense) is at distance zero. Returns `None` for
/// empty geometries.
///
/// Edges are treated as straight lines in lng/lat, not great-circle arcs.
/// Near the poles, or for edges spanning the antimeridian, a point close
/// to the interior of a long edge on the sphere may measure farther than
/// it really is.
#[must_use]
pub fn distance_to_geometry(point: LngLat, geometry: &Geometry<f64>) -> Option<f64> {
    let query = Point::new(point.lng, point.lat);

    let nearest_vertex = || {
        geometry
            .coords_iter()
            .map(|c| haversine_meters(point, LngLat { lng: c.x, lat: c.y }))
            .min_by(f64::total_cmp)
    };

    match geometry.closest_point(&query) {
        Closest::Intersection(_) => Some(0.0),
        Closest::SinglePoint(p) => {
            let planar = haversine_meters(
                point,
                LngLat {
                    lng: p.x(),
                    lat: p.y(),
                },
            );
            Some(nearest_vertex().map_or(planar, |v| v.min(planar)))
        }
        Closest::Indeterminate => nearest_vertex(),
    }
}
