//! Level-of-detail simplification of `GeoJSON` geometries.
//!
//! Lines and polygon rings are reduced with Ramer-Douglas-Peucker via
//! [`geo::Simplify`]. Parts that collapse below their minimum vertex count
//! are removed, and a geometry with no surviving parts simplifies to
//! nothing.

use geo::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon,
    Simplify,
};

/// Smallest closed ring: three distinct vertices plus the closing vertex.
const MIN_RING_COORDS: usize = 4;

/// Simplifies a `GeoJSON` geometry with the given tolerance (in coordinate
/// units).
///
/// Returns `None` when the geometry cannot be interpreted or nothing of it
/// survives simplification. A non-positive or non-finite tolerance leaves
/// the geometry untouched.
#[must_use]
pub fn simplify_geometry(geometry: &geojson::Geometry, tolerance: f64) -> Option<geojson::Geometry> {
    let geometry: Geometry<f64> = match geometry.clone().try_into() {
        Ok(g) => g,
        Err(e) => {
            log::warn!("Skipping geometry that cannot be converted for simplification: {e}");
            return None;
        }
    };

    let simplified = if tolerance.is_finite() && tolerance > 0.0 {
        simplify(geometry, tolerance)?
    } else {
        geometry
    };

    Some(geojson::Geometry::new(geojson::Value::from(&simplified)))
}

fn simplify(geometry: Geometry<f64>, tolerance: f64) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(mp) => non_empty_points(mp).map(Geometry::MultiPoint),
        Geometry::LineString(ls) => simplify_line(&ls, tolerance).map(Geometry::LineString),
        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString<f64>> = mls
                .0
                .iter()
                .filter_map(|ls| simplify_line(ls, tolerance))
                .collect();
            (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString(lines)))
        }
        Geometry::Polygon(p) => simplify_polygon(&p, tolerance).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let polygons: Vec<Polygon<f64>> = mp
                .0
                .iter()
                .filter_map(|p| simplify_polygon(p, tolerance))
                .collect();
            (!polygons.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon(polygons)))
        }
        Geometry::GeometryCollection(gc) => {
            let members: Vec<Geometry<f64>> = gc
                .0
                .into_iter()
                .filter_map(|g| simplify(g, tolerance))
                .collect();
            (!members.is_empty())
                .then(|| Geometry::GeometryCollection(GeometryCollection(members)))
        }
        other => Some(other),
    }
}

fn non_empty_points(mp: MultiPoint<f64>) -> Option<MultiPoint<f64>> {
    (!mp.0.is_empty()).then_some(mp)
}

fn simplify_line(ls: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
    let simplified = ls.simplify(tolerance);
    (simplified.0.len() >= 2).then_some(simplified)
}

fn simplify_ring(ring: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
    let simplified = ring.simplify(tolerance);
    (simplified.0.len() >= MIN_RING_COORDS).then_some(simplified)
}

fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Option<Polygon<f64>> {
    let exterior = simplify_ring(polygon.exterior(), tolerance)?;
    let interiors = polygon
        .interiors()
        .iter()
        .filter_map(|ring| simplify_ring(ring, tolerance))
        .collect();
    Some(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(value: geojson::Value) -> geojson::Geometry {
        geojson::Geometry::new(value)
    }

    fn square(size: f64) -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![size, 0.0],
            vec![size, size],
            vec![0.0, size],
            vec![0.0, 0.0],
        ]
    }

    #[test]
    fn points_pass_through() {
        let point = geometry(geojson::Value::Point(vec![12.5, -3.25]));
        let out = simplify_geometry(&point, 10.0).unwrap();
        assert_eq!(out.value, geojson::Value::Point(vec![12.5, -3.25]));
    }

    #[test]
    fn removes_near_collinear_vertices() {
        let line = geometry(geojson::Value::LineString(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.01],
            vec![2.0, 0.0],
            vec![3.0, 0.01],
            vec![4.0, 0.0],
        ]));
        let out = simplify_geometry(&line, 0.1).unwrap();
        assert_eq!(
            out.value,
            geojson::Value::LineString(vec![vec![0.0, 0.0], vec![4.0, 0.0]])
        );
    }

    #[test]
    fn zero_tolerance_keeps_geometry() {
        let polygon = geometry(geojson::Value::Polygon(vec![square(1.0)]));
        let out = simplify_geometry(&polygon, 0.0).unwrap();
        assert_eq!(out.value, geojson::Value::Polygon(vec![square(1.0)]));
    }

    #[test]
    fn collapsed_polygon_is_dropped() {
        let sliver = geometry(geojson::Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.001],
            vec![2.0, 0.0],
            vec![1.0, -0.001],
            vec![0.0, 0.0],
        ]]));
        assert!(simplify_geometry(&sliver, 0.5).is_none());
    }

    #[test]
    fn multipolygon_keeps_surviving_members() {
        let tiny = vec![
            vec![10.0, 10.0],
            vec![10.001, 10.0],
            vec![10.001, 10.001],
            vec![10.0, 10.001],
            vec![10.0, 10.0],
        ];
        let mp = geometry(geojson::Value::MultiPolygon(vec![vec![square(5.0)], vec![tiny]]));
        let out = simplify_geometry(&mp, 0.1).unwrap();
        assert_eq!(out.value, geojson::Value::MultiPolygon(vec![vec![square(5.0)]]));
    }
}
