#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload rule validation and persistence.
//!
//! A rule names the feature class a bulk upload lands in and maps source
//! feature properties onto stored document fields. Rules are validated in
//! full before they reach the store, and a rule written under an existing
//! id replaces the old one outright.

use std::collections::BTreeMap;

use geostore_store::{FeatureStore, StoreError};
use geostore_store_models::{
    ID_FIELD, MAX_FEATURECLASS_LEN, UploadRule, WriteCounts, is_valid_featureclass,
};
use serde_json::Value;

/// Errors that can occur while reading or writing upload rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The rule definition is malformed.
    #[error("{message}")]
    Validation {
        /// Description of what is wrong.
        message: String,
    },

    /// No rule is stored under the requested id.
    #[error("Upload rule not found: {rule_id}")]
    NotFound {
        /// The requested rule id.
        rule_id: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn invalid(message: impl Into<String>) -> RuleError {
    RuleError::Validation {
        message: message.into(),
    }
}

/// Validates a rule definition without touching the store.
///
/// `featureclass` must match `^[A-Za-z0-9_]{1,45}$`; `mapping` must be a
/// non-empty object of string values that includes an `_id` entry.
///
/// # Errors
///
/// Returns [`RuleError::Validation`] describing the first problem found.
pub fn validate_rule(
    id: &str,
    featureclass: Option<&str>,
    mapping: Option<&Value>,
) -> Result<UploadRule, RuleError> {
    if id.is_empty() {
        return Err(invalid("Rule id must not be empty"));
    }

    let featureclass = featureclass.ok_or_else(|| invalid("Missing featureclass"))?;
    if !is_valid_featureclass(featureclass) {
        return Err(invalid(format!(
            "Invalid featureclass {featureclass:?}: use 1 to {MAX_FEATURECLASS_LEN} letters, digits, or underscores"
        )));
    }

    let mapping = match mapping {
        None | Some(Value::Null) => return Err(invalid("Missing mapping")),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid("Mapping must be an object")),
    };
    if mapping.is_empty() {
        return Err(invalid("Mapping must not be empty"));
    }

    let mapping = mapping
        .iter()
        .map(|(target, source)| match source {
            Value::String(s) => Ok((target.clone(), s.clone())),
            _ => Err(invalid(format!(
                "Mapping for {target:?} must name a source property"
            ))),
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    if !mapping.contains_key(ID_FIELD) {
        return Err(invalid("Mapping must include an _id entry"));
    }

    Ok(UploadRule {
        id: id.to_string(),
        featureclass: featureclass.to_string(),
        mapping,
    })
}

/// Validates and upserts an upload rule.
///
/// # Errors
///
/// Returns [`RuleError::Validation`] for malformed definitions (nothing is
/// written), or [`RuleError::Store`] if the write fails.
pub async fn put_rule(
    store: &dyn FeatureStore,
    id: &str,
    featureclass: Option<&str>,
    mapping: Option<&Value>,
) -> Result<WriteCounts, RuleError> {
    let rule = validate_rule(id, featureclass, mapping)?;
    let counts = store.put_rule(&rule).await?;

    log::info!(
        "Stored upload rule {id} -> {} ({} fields, inserted={}, modified={})",
        rule.collection(),
        rule.mapping.len(),
        counts.inserted,
        counts.modified
    );

    Ok(counts)
}

/// Fetches an upload rule by id.
///
/// # Errors
///
/// Returns [`RuleError::NotFound`] if no such rule exists, or
/// [`RuleError::Store`] if the read fails.
pub async fn get_rule(store: &dyn FeatureStore, id: &str) -> Result<UploadRule, RuleError> {
    store
        .get_rule(id)
        .await?
        .ok_or_else(|| RuleError::NotFound {
            rule_id: id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geostore_store::MemoryStore;
    use serde_json::json;

    #[test]
    fn accepts_minimal_rule() {
        let rule = validate_rule("r1", Some("poi"), Some(&json!({"_id": "code"}))).unwrap();
        assert_eq!(rule.collection(), "geo_poi");
        assert_eq!(rule.mapping.get("_id").map(String::as_str), Some("code"));
    }

    #[test]
    fn rejects_bad_featureclass() {
        let too_long = format!("{}X", "a".repeat(MAX_FEATURECLASS_LEN));
        for fc in ["", "has space", "semi;colon", "dash-ed", too_long.as_str()] {
            let err = validate_rule("r1", Some(fc), Some(&json!({"_id": "code"}))).unwrap_err();
            assert!(matches!(err, RuleError::Validation { .. }), "{fc}");
        }
        assert!(matches!(
            validate_rule("r1", None, Some(&json!({"_id": "code"}))),
            Err(RuleError::Validation { .. })
        ));
    }

    #[test]
    fn rejects_bad_mapping() {
        let cases = [
            None,
            Some(json!(null)),
            Some(json!({})),
            Some(json!(["_id"])),
            Some(json!({"name": "label"})),
            Some(json!({"_id": 5})),
        ];
        for mapping in &cases {
            let err = validate_rule("r1", Some("poi"), mapping.as_ref()).unwrap_err();
            assert!(matches!(err, RuleError::Validation { .. }), "{mapping:?}");
        }
    }

    #[tokio::test]
    async fn rule_without_id_never_reaches_storage() {
        let store = MemoryStore::new();
        let err = put_rule(&store, "r1", Some("poi"), Some(&json!({"name": "label"})))
            .await
            .unwrap_err();

        assert!(matches!(err, RuleError::Validation { .. }));
        assert!(store.get_rule("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_rather_than_merges() {
        let store = MemoryStore::new();
        let first = put_rule(
            &store,
            "r1",
            Some("poi"),
            Some(&json!({"_id": "code", "name": "label"})),
        )
        .await
        .unwrap();
        assert_eq!((first.inserted, first.modified), (1, 0));

        let second = put_rule(&store, "r1", Some("parks"), Some(&json!({"_id": "gid"})))
            .await
            .unwrap();
        assert_eq!((second.inserted, second.modified), (0, 1));

        let rule = get_rule(&store, "r1").await.unwrap();
        assert_eq!(rule.featureclass, "parks");
        assert_eq!(rule.mapping.len(), 1);
        assert!(!rule.mapping.contains_key("name"));
    }

    #[tokio::test]
    async fn unknown_rule_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_rule(&store, "nope").await,
            Err(RuleError::NotFound { .. })
        ));
    }
}
