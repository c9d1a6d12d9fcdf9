#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bulk ingestion of `GeoJSON` feature collections under an upload rule.
//!
//! An upload is all-or-nothing up to the write: the whole collection is
//! validated and mapped before the store sees a single document. The
//! write itself is an unordered bulk upsert keyed by each feature's `_id`,
//! so re-uploading the same file is idempotent.

pub mod mapping;

use geostore_rules::RuleError;
use geostore_store::{FeatureStore, StoreError};
use geostore_store_models::{StoredFeature, UploadRule, WriteCounts};
use serde::Serialize;
use serde_json::Value;

pub use mapping::map_feature;

/// Errors that can occur while ingesting a feature collection.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The uploaded document or one of its features is malformed.
    #[error("{message}")]
    Validation {
        /// Description of what is wrong.
        message: String,
    },

    /// The upload rule could not be loaded.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Collection the features were written to.
    pub collection: String,
    /// Write counts reported by the store.
    #[serde(flatten)]
    pub counts: WriteCounts,
}

/// Returns the `features` array of a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] if `body` is not an object with
/// `type == "FeatureCollection"` and an array `features` member.
pub fn features_of(body: &Value) -> Result<&[Value], IngestError> {
    if body.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(IngestError::Validation {
            message: "Expected a GeoJSON object with type \"FeatureCollection\"".to_string(),
        });
    }

    body.get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| IngestError::Validation {
            message: "FeatureCollection must have a features array".to_string(),
        })
}

/// Maps every feature of a collection, stopping at the first failure.
///
/// # Errors
///
/// Returns the first [`IngestError::Validation`] raised by
/// [`map_feature`].
pub fn map_features(rule: &UploadRule, features: &[Value]) -> Result<Vec<StoredFeature>, IngestError> {
    features
        .iter()
        .enumerate()
        .map(|(i, feature)| map_feature(&rule.mapping, feature, i))
        .collect()
}

/// Ingests a `FeatureCollection` under the rule stored as `rule_id`.
///
/// The collection's spatial index is created on first use. No document is
/// written unless every feature maps successfully.
///
/// # Errors
///
/// * [`IngestError::Validation`] if the body or any feature is malformed,
///   or if the collection has no features
/// * [`IngestError::Rule`] if the rule does not exist
/// * [`IngestError::Store`] if indexing or the bulk write fails
pub async fn ingest(
    store: &dyn FeatureStore,
    rule_id: &str,
    body: &Value,
) -> Result<IngestOutcome, IngestError> {
    let features = features_of(body)?;
    let rule = geostore_rules::get_rule(store, rule_id).await?;
    let collection = rule.collection();

    store.ensure_index(&collection).await?;

    let documents = map_features(&rule, features)?;
    if documents.is_empty() {
        return Err(IngestError::Validation {
            message: "FeatureCollection has no features".to_string(),
        });
    }

    log::info!(
        "Ingesting {} features into {collection} with rule {rule_id}",
        documents.len()
    );

    let counts = store.bulk_upsert(&collection, &documents).await?;

    log::info!(
        "Ingest into {collection} complete: inserted={}, modified={}",
        counts.inserted,
        counts.modified
    );

    Ok(IngestOutcome { collection, counts })
}
