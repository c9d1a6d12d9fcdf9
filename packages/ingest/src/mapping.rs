//! Maps a single `GeoJSON` feature onto a canonical document.
//!
//! Each rule entry copies one source property into one target field. The
//! `_id` entry is mandatory and must resolve to a non-empty string or a
//! non-zero number; every other entry is best-effort, so an absent source
//! property simply leaves its target field unset.

use std::collections::BTreeMap;

use geo::{BoundingRect, CoordsIter};
use geostore_store_models::{Document, FeatureId, GEOMETRY_FIELD, ID_FIELD, StoredFeature};
use serde_json::Value;

use crate::IngestError;

/// Maps one feature using `mapping` (target field -> source property).
///
/// `position` is the feature's index in its collection and only appears in
/// error messages.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] if the object is not a `Feature`,
/// its `_id` source property is absent or falsy, or its geometry is
/// missing, not valid `GeoJSON`, empty, or outside WGS84 bounds.
pub fn map_feature(
    mapping: &BTreeMap<String, String>,
    feature: &Value,
    position: usize,
) -> Result<StoredFeature, IngestError> {
    let invalid = |message: &str| IngestError::Validation {
        message: format!("Feature {position}: {message}"),
    };

    if feature.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(invalid("expected an object with type \"Feature\""));
    }

    let empty = Document::new();
    let properties = feature
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut id = None;
    let mut attributes = Document::new();

    for (target, source) in mapping {
        let value = properties.get(source);

        if target == ID_FIELD {
            id = value.and_then(FeatureId::from_value);
            if id.is_none() {
                return Err(invalid("missing `_id` value"));
            }
        } else if target != GEOMETRY_FIELD {
            if let Some(value) = value {
                attributes.insert(target.clone(), value.clone());
            }
        }
    }

    let id = id.ok_or_else(|| invalid("missing `_id` value"))?;

    let geometry = match feature.get("geometry") {
        None | Some(Value::Null) => return Err(invalid("missing geometry")),
        Some(g) => serde_json::from_value::<geojson::Geometry>(g.clone())
            .map_err(|e| invalid(&format!("invalid geometry: {e}")))?,
    };
    check_storable(&geometry).map_err(|message| invalid(&message))?;

    Ok(StoredFeature {
        id,
        geometry,
        attributes,
    })
}

/// Rejects geometries a store cannot index: empty ones, and ones with a
/// coordinate outside `[-180, 180] x [-90, 90]`.
fn check_storable(geometry: &geojson::Geometry) -> Result<(), String> {
    let shape: geo::Geometry<f64> = geometry
        .clone()
        .try_into()
        .map_err(|e| format!("invalid geometry: {e}"))?;

    if shape.bounding_rect().is_none() {
        return Err("empty geometry".to_string());
    }

    if let Some(c) = shape
        .coords_iter()
        .find(|c| !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y))
    {
        return Err(format!(
            "coordinate ({}, {}) is outside longitude [-180, 180] / latitude [-90, 90]",
            c.x, c.y
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(t, s)| ((*t).to_string(), (*s).to_string()))
            .collect()
    }

    fn cafe() -> Value {
        json!({
            "type": "Feature",
            "properties": {"code": "A1", "label": "Cafe", "rank": 3},
            "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}
        })
    }

    #[test]
    fn maps_id_and_attributes() {
        let m = mapping(&[("_id", "code"), ("name", "label")]);
        let out = map_feature(&m, &cafe(), 0).unwrap();

        assert_eq!(out.id, FeatureId::Text("A1".into()));
        assert_eq!(out.attributes.get("name"), Some(&json!("Cafe")));
        assert_eq!(out.attributes.len(), 1);
        assert_eq!(
            out.geometry.value,
            geojson::Value::Point(vec![2.35, 48.85])
        );
    }

    #[test]
    fn absent_source_leaves_field_unset() {
        let m = mapping(&[("_id", "code"), ("owner", "proprietor")]);
        let out = map_feature(&m, &cafe(), 0).unwrap();
        assert!(!out.attributes.contains_key("owner"));
    }

    #[test]
    fn null_source_is_kept_verbatim() {
        let m = mapping(&[("_id", "code"), ("note", "note")]);
        let mut feature = cafe();
        feature["properties"]["note"] = Value::Null;
        let out = map_feature(&m, &feature, 0).unwrap();
        assert_eq!(out.attributes.get("note"), Some(&Value::Null));
    }

    #[test]
    fn geometry_mapping_is_overridden() {
        let m = mapping(&[("_id", "code"), ("geometry", "label")]);
        let out = map_feature(&m, &cafe(), 0).unwrap();
        assert!(!out.attributes.contains_key("geometry"));
        assert_eq!(out.to_document()["geometry"]["type"], json!("Point"));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let m = mapping(&[("_id", "rank")]);
        let out = map_feature(&m, &cafe(), 0).unwrap();
        assert_eq!(out.id, FeatureId::Number(3.into()));
    }

    #[test]
    fn missing_or_empty_id_is_rejected() {
        let m = mapping(&[("_id", "code")]);
        for props in [json!({}), json!({"code": ""}), json!({"code": null}), json!({"code": 0})] {
            let mut feature = cafe();
            feature["properties"] = props;
            let err = map_feature(&m, &feature, 4).unwrap_err();
            assert!(err.to_string().contains("missing `_id` value"), "{err}");
            assert!(err.to_string().starts_with("Feature 4"), "{err}");
        }
    }

    #[test]
    fn non_feature_is_rejected() {
        let m = mapping(&[("_id", "code")]);
        let mut feature = cafe();
        feature["type"] = json!("Point");
        assert!(matches!(
            map_feature(&m, &feature, 0),
            Err(IngestError::Validation { .. })
        ));
        assert!(map_feature(&m, &json!("Feature"), 0).is_err());
    }

    #[test]
    fn missing_geometry_is_rejected() {
        let m = mapping(&[("_id", "code")]);
        let mut feature = cafe();
        feature["geometry"] = Value::Null;
        let err = map_feature(&m, &feature, 0).unwrap_err();
        assert!(err.to_string().contains("missing geometry"));
    }

    #[test]
    fn empty_geometry_is_rejected() {
        let m = mapping(&[("_id", "code")]);
        for geometry in [
            json!({"type": "MultiPoint", "coordinates": []}),
            json!({"type": "MultiPolygon", "coordinates": []}),
            json!({"type": "GeometryCollection", "geometries": []}),
        ] {
            let mut feature = cafe();
            feature["geometry"] = geometry;
            let err = map_feature(&m, &feature, 1).unwrap_err();
            assert!(err.to_string().contains("empty geometry"), "{err}");
        }
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let m = mapping(&[("_id", "code")]);
        for coords in [json!([181.0, 0.0]), json!([0.0, -90.5])] {
            let mut feature = cafe();
            feature["geometry"]["coordinates"] = coords;
            let err = map_feature(&m, &feature, 0).unwrap_err();
            assert!(err.to_string().contains("outside longitude"), "{err}");
        }

        let mut edge = cafe();
        edge["geometry"]["coordinates"] = json!([180.0, -90.0]);
        assert!(map_feature(&m, &edge, 0).is_ok());
    }
}
