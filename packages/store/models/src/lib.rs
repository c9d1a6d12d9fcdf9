#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload rule and stored feature types.
//!
//! These are the shapes persisted by every `FeatureStore` backend: upload
//! rules keyed by rule id, and canonical feature documents keyed by their
//! mapped `_id` inside a per-feature-class collection.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved document field holding the feature identity.
pub const ID_FIELD: &str = "_id";
/// Document field holding the `GeoJSON` geometry.
pub const GEOMETRY_FIELD: &str = "geometry";
/// Optional document field holding the minimum visible zoom tier.
pub const ZOOM_FIELD: &str = "zoom";
/// Prefix shared by every feature-class collection.
pub const COLLECTION_PREFIX: &str = "geo_";

/// A canonical stored document: field name to JSON value.
pub type Document = serde_json::Map<String, Value>;

/// Longest accepted feature class.
///
/// Keeps `geo_<featureclass>_geometry_idx` within the 63-byte identifier
/// limit of `PostgreSQL`, which would otherwise truncate distinct names
/// onto the same table or index.
pub const MAX_FEATURECLASS_LEN: usize = 45;

static FEATURECLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,45}$").unwrap_or_else(|_| unreachable!()));

/// Whether `featureclass` is a usable feature class token: 1 to
/// [`MAX_FEATURECLASS_LEN`] ASCII letters, digits, or underscores.
#[must_use]
pub fn is_valid_featureclass(featureclass: &str) -> bool {
    FEATURECLASS_RE.is_match(featureclass)
}

/// Collection name for a feature class (`geo_<featureclass>`).
#[must_use]
pub fn collection_name(featureclass: &str) -> String {
    format!("{COLLECTION_PREFIX}{featureclass}")
}

/// A stored upload rule.
///
/// `mapping` pairs each target document field with the source property it
/// is read from. It always contains an [`ID_FIELD`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRule {
    /// Caller-supplied rule identifier.
    pub id: String,
    /// Target feature class.
    pub featureclass: String,
    /// Target field -> source property.
    pub mapping: BTreeMap<String, String>,
}

impl UploadRule {
    /// Name of the collection this rule writes into.
    #[must_use]
    pub fn collection(&self) -> String {
        collection_name(&self.featureclass)
    }
}

/// Identity of a stored feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// A non-empty string identifier.
    Text(String),
    /// A non-zero numeric identifier.
    Number(serde_json::Number),
}

impl FeatureId {
    /// Interprets a mapped `_id` value.
    ///
    /// Only truthy strings and numbers qualify: `null`, `""`, `0`,
    /// booleans, arrays, and objects yield `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    /// Storage key. Distinguishes `"1"` from `1`.
    #[must_use]
    pub fn key(&self) -> String {
        Value::from(self.clone()).to_string()
    }
}

impl From<FeatureId> for Value {
    fn from(id: FeatureId) -> Self {
        match id {
            FeatureId::Text(s) => Self::String(s),
            FeatureId::Number(n) => Self::Number(n),
        }
    }
}

/// A canonical feature document belonging to one feature-class collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeature {
    /// Document identity.
    pub id: FeatureId,
    /// Feature geometry.
    pub geometry: geojson::Geometry,
    /// Mapped attributes, excluding `_id` and `geometry`.
    pub attributes: Document,
}

impl StoredFeature {
    /// Storage key of this document.
    #[must_use]
    pub fn key(&self) -> String {
        self.id.key()
    }

    /// Minimum zoom tier at which the feature appears.
    ///
    /// `None` (absent, `null`, or non-numeric) means always visible.
    #[must_use]
    pub fn zoom(&self) -> Option<f64> {
        self.attributes.get(ZOOM_FIELD).and_then(Value::as_f64)
    }

    /// Whether the feature is eligible at the given zoom tier.
    #[must_use]
    pub fn visible_at(&self, tier: u32) -> bool {
        self.zoom().is_none_or(|z| z <= f64::from(tier))
    }

    /// Flattens the feature into a single document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = self.attributes.clone();
        doc.insert(ID_FIELD.to_string(), self.id.clone().into());
        doc.insert(
            GEOMETRY_FIELD.to_string(),
            serde_json::to_value(&self.geometry).unwrap_or(Value::Null),
        );
        doc
    }

    /// Rebuilds a feature from a flattened document.
    ///
    /// Returns `None` if the document lacks a usable `_id` or geometry.
    #[must_use]
    pub fn from_document(mut doc: Document) -> Option<Self> {
        let id = FeatureId::from_value(&doc.remove(ID_FIELD)?)?;
        let geometry = serde_json::from_value(doc.remove(GEOMETRY_FIELD)?).ok()?;
        Some(Self {
            id,
            geometry,
            attributes: doc,
        })
    }
}

/// Outcome of a write: how many documents were created vs. changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCounts {
    /// Documents that did not exist before.
    pub inserted: u64,
    /// Existing documents whose content changed.
    pub modified: u64,
}

impl std::ops::AddAssign for WriteCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.modified += rhs.modified;
    }
}

/// A within-distance lookup against one collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearQuery {
    /// Normalized longitude of the query point.
    pub lng: f64,
    /// Normalized latitude of the query point.
    pub lat: f64,
    /// Maximum distance from the point, in meters.
    pub radius_meters: f64,
    /// Zoom tier; features with a larger `zoom` are excluded.
    pub zoom: u32,
}
