#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Proximity queries over a feature-class collection.
//!
//! A query arrives as raw strings for longitude, latitude, and an angular
//! radius. [`plan`] turns them into a [`QueryPlan`] (canonical point, zoom
//! tier, search distance, simplification tolerance) and [`query`] runs it
//! against a [`FeatureStore`], returning nearest-first geometries
//! simplified for the requested level of detail.

use geostore_geo::{GeoError, LngLat};
use geostore_store::{FeatureStore, StoreError};
use geostore_store_models::{Document, NearQuery, collection_name, is_valid_featureclass};

/// Errors that can occur while planning or running a proximity query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A request parameter other than a coordinate is malformed.
    #[error("{message}")]
    Validation {
        /// Description of what is wrong.
        message: String,
    },

    /// A coordinate is missing or not a finite number.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Values derived from a raw query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPlan {
    /// Normalized query point.
    pub point: LngLat,
    /// Radius in radians after defaulting.
    pub radius: f64,
    /// Zoom tier used to filter features.
    pub zoom: u32,
    /// Search distance in meters.
    pub radius_meters: f64,
    /// Simplification tolerance applied to returned geometries.
    pub tolerance: f64,
}

impl QueryPlan {
    /// The store-level lookup this plan describes.
    #[must_use]
    pub const fn near_query(&self) -> NearQuery {
        NearQuery {
            lng: self.point.lng,
            lat: self.point.lat,
            radius_meters: self.radius_meters,
            zoom: self.zoom,
        }
    }
}

/// One feature in a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    /// Simplified geometry.
    pub geometry: geojson::Geometry,
    /// Mapped attributes, present only when requested.
    pub attributes: Option<Document>,
}

fn coordinate(axis: &'static str, raw: Option<&str>) -> Result<f64, GeoError> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeoError::InvalidCoordinate {
            axis,
            value: raw.unwrap_or_default().to_string(),
        })
}

/// Derives the query parameters from raw request values.
///
/// `radius` falls back to `π/2` when absent or unusable; coordinates do
/// not.
///
/// # Errors
///
/// Returns [`QueryError::Geo`] if `lng` or `lat` is missing, unparseable,
/// or not finite.
pub fn plan(lng: Option<&str>, lat: Option<&str>, radius: Option<&str>) -> Result<QueryPlan, QueryError> {
    let lng = coordinate("longitude", lng)?;
    let lat = coordinate("latitude", lat)?;
    let point = geostore_geo::normalize(lng, lat)?;
    let radius = geostore_geo::resolve_radius(radius);

    Ok(QueryPlan {
        point,
        radius,
        zoom: geostore_geo::zoom_for_radius(radius),
        radius_meters: geostore_geo::search_radius_meters(radius),
        tolerance: geostore_geo::simplification_tolerance(radius),
    })
}

/// Runs a proximity query against `geo_<featureclass>`.
///
/// Features come back nearest first. Geometries that simplify away
/// entirely are dropped. An unknown feature class yields no hits.
///
/// # Errors
///
/// * [`QueryError::Validation`] if `featureclass` is not a valid token
/// * [`QueryError::Geo`] if a coordinate is unusable
/// * [`QueryError::Store`] if the lookup fails
pub async fn query(
    store: &dyn FeatureStore,
    featureclass: &str,
    plan: &QueryPlan,
    with_attributes: bool,
) -> Result<Vec<QueryHit>, QueryError> {
    if !is_valid_featureclass(featureclass) {
        return Err(QueryError::Validation {
            message: format!("Invalid featureclass {featureclass:?}"),
        });
    }

    let collection = collection_name(featureclass);

    log::debug!(
        "Querying {collection} at ({}, {}) radius={} zoom={} meters={:.0} tolerance={}",
        plan.point.lng,
        plan.point.lat,
        plan.radius,
        plan.zoom,
        plan.radius_meters,
        plan.tolerance
    );

    let found = store.find_near(&collection, &plan.near_query()).await?;
    let total = found.len();

    let hits: Vec<QueryHit> = found
        .into_iter()
        .filter_map(|feature| {
            let Some(geometry) = geostore_geo::simplify_geometry(&feature.geometry, plan.tolerance)
            else {
                log::warn!(
                    "Dropping {} from {collection}: geometry simplified to nothing",
                    feature.key()
                );
                return None;
            };
            Some(QueryHit {
                geometry,
                attributes: with_attributes.then_some(feature.attributes),
            })
        })
        .collect();

    log::debug!("{collection}: {} of {total} features returned", hits.len());

    Ok(hits)
}
