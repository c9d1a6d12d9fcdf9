//! In-memory [`FeatureStore`] backed by per-collection R-trees.
//!
//! Documents live in ordered maps keyed by their storage key; each indexed
//! collection keeps an [`RTree`] of geometry envelopes that pre-filters
//! candidates before the exact great-circle distance check.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use geo::BoundingRect;
use geostore_geo::{EARTH_RADIUS_METERS, LngLat, distance_to_geometry};
use geostore_store_models::{NearQuery, StoredFeature, UploadRule, WriteCounts};
use rstar::{AABB, RTree, RTreeObject};

use crate::{FeatureStore, StoreError};

/// A document envelope stored in a collection's R-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    key: String,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

struct IndexedFeature {
    feature: StoredFeature,
    shape: geo::Geometry<f64>,
    envelope: AABB<[f64; 2]>,
}

#[derive(Default)]
struct Collection {
    documents: BTreeMap<String, IndexedFeature>,
    index: Option<RTree<IndexEntry>>,
}

#[derive(Default)]
struct State {
    rules: BTreeMap<String, UploadRule>,
    collections: BTreeMap<String, Collection>,
}

/// A process-local store. Contents are lost when it is dropped.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|e| poisoned(&e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|e| poisoned(&e))
    }
}

fn poisoned(e: &impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("memory store lock poisoned: {e}").into())
}

fn index_feature(feature: &StoredFeature) -> Result<IndexedFeature, String> {
    let shape: geo::Geometry<f64> = feature
        .geometry
        .clone()
        .try_into()
        .map_err(|e| format!("invalid geometry for {}: {e}", feature.key()))?;
    let rect = shape
        .bounding_rect()
        .ok_or_else(|| format!("empty geometry for {}", feature.key()))?;

    Ok(IndexedFeature {
        feature: feature.clone(),
        shape,
        envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    })
}

/// Envelope in degrees guaranteed to contain every point within
/// `radius_meters` of `center`.
fn search_envelope(center: LngLat, radius_meters: f64) -> AABB<[f64; 2]> {
    let delta_lat = (radius_meters / EARTH_RADIUS_METERS).to_degrees();
    let south = center.lat - delta_lat;
    let north = center.lat + delta_lat;

    if south <= -90.0 || north >= 90.0 || delta_lat >= 90.0 {
        return AABB::from_corners([-180.0, south.max(-90.0)], [180.0, north.min(90.0)]);
    }

    let widest = south.abs().max(north.abs()).to_radians().cos();
    let delta_lng = delta_lat / widest;
    let west = center.lng - delta_lng;
    let east = center.lng + delta_lng;

    if west < -180.0 || east > 180.0 {
        AABB::from_corners([-180.0, south], [180.0, north])
    } else {
        AABB::from_corners([west, south], [east, north])
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn put_rule(&self, rule: &UploadRule) -> Result<WriteCounts, StoreError> {
        let mut state = self.write()?;
        let counts = match state.rules.insert(rule.id.clone(), rule.clone()) {
            None => WriteCounts {
                inserted: 1,
                modified: 0,
            },
            Some(previous) if previous != *rule => WriteCounts {
                inserted: 0,
                modified: 1,
            },
            Some(_) => WriteCounts::default(),
        };
        Ok(counts)
    }

    async fn get_rule(&self, id: &str) -> Result<Option<UploadRule>, StoreError> {
        Ok(self.read()?.rules.get(id).cloned())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.collections.keys().cloned().collect())
    }

    async fn ensure_index(&self, collection: &str) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let entry = state.collections.entry(collection.to_string()).or_default();

        if entry.index.is_none() {
            log::debug!("Creating spatial index on {collection}");
            let entries = entry
                .documents
                .iter()
                .map(|(key, doc)| IndexEntry {
                    key: key.clone(),
                    envelope: doc.envelope,
                })
                .collect();
            entry.index = Some(RTree::bulk_load(entries));
        }

        Ok(())
    }

    async fn bulk_upsert(
        &self,
        collection: &str,
        features: &[StoredFeature],
    ) -> Result<WriteCounts, StoreError> {
        let mut state = self.write()?;
        let Some(Collection {
            documents,
            index: Some(tree),
        }) = state.collections.get_mut(collection)
        else {
            return Err(StoreError::MissingIndex {
                collection: collection.to_string(),
            });
        };

        let mut counts = WriteCounts::default();
        let mut failures = Vec::new();

        for feature in features {
            let indexed = match index_feature(feature) {
                Ok(indexed) => indexed,
                Err(message) => {
                    failures.push(message);
                    continue;
                }
            };
            let key = feature.key();

            match documents.get(&key) {
                Some(existing) if existing.feature == *feature => continue,
                Some(existing) => {
                    tree.remove(&IndexEntry {
                        key: key.clone(),
                        envelope: existing.envelope,
                    });
                    counts.modified += 1;
                }
                None => counts.inserted += 1,
            }

            tree.insert(IndexEntry {
                key: key.clone(),
                envelope: indexed.envelope,
            });
            documents.insert(key, indexed);
        }

        if let Some(first) = failures.first() {
            return Err(StoreError::Batch {
                failed: failures.len(),
                total: features.len(),
                applied: counts,
                first: first.clone(),
            });
        }

        Ok(counts)
    }

    async fn find_near(
        &self,
        collection: &str,
        query: &NearQuery,
    ) -> Result<Vec<StoredFeature>, StoreError> {
        let state = self.read()?;
        let Some(target) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let tree = target
            .index
            .as_ref()
            .ok_or_else(|| StoreError::MissingIndex {
                collection: collection.to_string(),
            })?;

        let center = LngLat {
            lng: query.lng,
            lat: query.lat,
        };
        let envelope = search_envelope(center, query.radius_meters);

        let mut hits: Vec<(f64, &StoredFeature)> = tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|entry| target.documents.get(&entry.key))
            .filter(|doc| doc.feature.visible_at(query.zoom))
            .filter_map(|doc| {
                distance_to_geometry(center, &doc.shape)
                    .filter(|d| *d <= query.radius_meters)
                    .map(|d| (d, &doc.feature))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(hits.into_iter().map(|(_, f)| f.clone()).collect())
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self
            .read()?
            .collections
            .get(collection)
            .map_or(0, |c| c.documents.len() as u64))
    }
}
