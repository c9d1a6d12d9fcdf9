#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Document store abstraction for geostore.
//!
//! [`FeatureStore`] is the seam between the ingestion/query pipelines and
//! whatever persists the data. It owns the spatial index and the
//! within-distance query; callers own validation and orchestration.
//! [`memory::MemoryStore`] is an R-tree backed implementation used for
//! development and tests; the `PostGIS` implementation lives in
//! `geostore_database`.

pub mod memory;

use async_trait::async_trait;
use geostore_store_models::{COLLECTION_PREFIX, NearQuery, StoredFeature, UploadRule, WriteCounts};

pub use memory::MemoryStore;

/// Errors surfaced by a [`FeatureStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database or connection failed.
    #[error("Store backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    /// A document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A write or query reached a collection whose spatial index has not
    /// been created.
    #[error("Collection {collection} has no spatial index")]
    MissingIndex {
        /// Collection name.
        collection: String,
    },

    /// A collection name is not `geo_` followed by a valid feature class.
    #[error("Invalid collection name: {collection:?}")]
    InvalidCollection {
        /// Collection name as received.
        collection: String,
    },

    /// A stored document could not be read back as a feature.
    #[error("Corrupt document {key} in {collection}")]
    Corrupt {
        /// Collection name.
        collection: String,
        /// Storage key of the document.
        key: String,
    },

    /// Some operations of an unordered batch failed. The rest were applied.
    #[error("{failed} of {total} writes failed (first error: {first})")]
    Batch {
        /// Number of failed operations.
        failed: usize,
        /// Number of operations attempted.
        total: usize,
        /// Counts for the operations that succeeded.
        applied: WriteCounts,
        /// Message of the first failure.
        first: String,
    },
}

impl StoreError {
    /// Wraps a backend-specific error.
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(e))
    }
}

/// Persistence capability required by the rule, ingestion, and query
/// pipelines.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Inserts or fully replaces an upload rule keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn put_rule(&self, rule: &UploadRule) -> Result<WriteCounts, StoreError>;

    /// Fetches an upload rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_rule(&self, id: &str) -> Result<Option<UploadRule>, StoreError>;

    /// Lists the names of all existing feature-class collections.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the listing fails.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Creates the collection and its spatial index over `geometry` if
    /// either is missing. Safe to call repeatedly and concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if index creation fails.
    async fn ensure_index(&self, collection: &str) -> Result<(), StoreError>;

    /// Replaces-or-inserts each feature by `_id`, unordered.
    ///
    /// Every operation is attempted even if others fail. Unchanged
    /// documents count as neither inserted nor modified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingIndex`] if the collection has no
    /// spatial index, or [`StoreError::Batch`] if any operation failed.
    async fn bulk_upsert(
        &self,
        collection: &str,
        features: &[StoredFeature],
    ) -> Result<WriteCounts, StoreError>;

    /// Returns features within `query.radius_meters` of the query point
    /// whose zoom is absent or at most `query.zoom`, nearest first.
    ///
    /// An unknown collection yields no features.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    async fn find_near(
        &self,
        collection: &str,
        query: &NearQuery,
    ) -> Result<Vec<StoredFeature>, StoreError>;

    /// Number of documents in a collection (zero if it does not exist).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the count fails.
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;
}

/// Ensures the spatial index of every existing feature-class collection.
///
/// Runs once at startup, before traffic is accepted, as a single fan-out
/// over the collections present at that moment. Returns the number of
/// collections verified.
///
/// # Errors
///
/// Returns the first [`StoreError`] encountered.
pub async fn verify_indexes(store: &dyn FeatureStore) -> Result<usize, StoreError> {
    let collections: Vec<String> = store
        .list_collections()
        .await?
        .into_iter()
        .filter(|c| c.starts_with(COLLECTION_PREFIX))
        .collect();

    log::info!("Verifying spatial indexes on {} collections", collections.len());

    futures::future::try_join_all(collections.iter().map(|c| store.ensure_index(c))).await?;

    Ok(collections.len())
}
