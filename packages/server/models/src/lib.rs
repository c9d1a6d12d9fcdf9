#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the geostore server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the stored document types to allow independent evolution of the
//! API contract.

use geostore_store_models::{Document, WriteCounts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Body of `POST /rule/{ruleId}`.
///
/// Both fields are optional at the type level so that a missing field is
/// reported by rule validation rather than by the JSON extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleBody {
    /// Target feature class.
    pub featureclass: Option<String>,
    /// Target field -> source property.
    pub mapping: Option<Value>,
}

/// Response of `POST /rule/{ruleId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResponse {
    /// Always `true`; failures use [`ApiErrorBody`].
    pub success: bool,
    /// Rules created.
    pub inserted: u64,
    /// Rules replaced with different content.
    pub modified: u64,
}

impl From<WriteCounts> for RuleResponse {
    fn from(counts: WriteCounts) -> Self {
        Self {
            success: true,
            inserted: counts.inserted,
            modified: counts.modified,
        }
    }
}

/// Response of `POST /upload/{ruleId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always `true`; failures use [`ApiErrorBody`].
    pub success: bool,
    /// Collection the features were written to.
    pub collection: String,
    /// Documents created.
    pub inserted: u64,
    /// Documents replaced with different content.
    pub modified: u64,
}

/// Query parameters for `GET /features/{featureclass}`.
///
/// Coordinates are kept as strings so that malformed values reach the
/// query planner and produce its error message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureQueryParams {
    /// Longitude in degrees.
    pub lng: Option<String>,
    /// Latitude in degrees.
    pub lat: Option<String>,
    /// Radius in radians.
    pub radius: Option<String>,
    /// Also return mapped attributes as `properties`.
    pub attributes: Option<bool>,
}

/// A feature in a query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFeature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Simplified geometry.
    pub geometry: geojson::Geometry,
    /// Mapped attributes, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Document>,
}

impl ApiFeature {
    /// Builds a feature from a geometry and optional attributes.
    #[must_use]
    pub fn new(geometry: geojson::Geometry, properties: Option<Document>) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry,
            properties,
        }
    }
}

/// A `GeoJSON` `FeatureCollection` query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Features, nearest first.
    pub features: Vec<ApiFeature>,
}

impl ApiFeatureCollection {
    /// Wraps features in a collection.
    #[must_use]
    pub fn new(features: Vec<ApiFeature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}
