//! [`FeatureStore`] backed by `PostGIS`.
//!
//! Collection names are validated before they are spliced into SQL; every
//! value goes through bind parameters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use geostore_store::{FeatureStore, StoreError};
use geostore_store_models::{
    COLLECTION_PREFIX, Document, NearQuery, StoredFeature, UploadRule, WriteCounts,
    is_valid_featureclass,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

/// `PostGIS`-backed document store.
pub struct PostgisStore {
    db: Box<dyn Database>,
}

impl PostgisStore {
    /// Wraps an open, migrated connection.
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self { db }
    }

    async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT to_regclass($1) IS NOT NULL AS present",
                &[DatabaseValue::String(name.to_string())],
            )
            .await
            .map_err(StoreError::backend)?;

        let present: Option<bool> = rows.first().and_then(|row| row.to_value("present").ok());

        Ok(present.unwrap_or(false))
    }

    /// Runs an `IF NOT EXISTS` DDL statement that may race with the same
    /// statement on another connection.
    ///
    /// `PostgreSQL` can fail the losing side with a catalog unique
    /// violation even under `IF NOT EXISTS`; that failure counts as success
    /// once `object` exists.
    async fn create_if_missing(&self, sql: &str, object: &str) -> Result<(), StoreError> {
        let result = self.db.exec_raw(sql).await;
        let exists_after = match &result {
            Ok(()) => true,
            Err(_) => self.table_exists(object).await?,
        };
        settle_create(result, exists_after, object)
    }

    async fn upsert_one(&self, table: &str, feature: &StoredFeature) -> Result<WriteCounts, String> {
        let geometry = serde_json::to_string(&feature.geometry).map_err(|e| e.to_string())?;
        let document = serde_json::to_string(&feature.to_document()).map_err(|e| e.to_string())?;

        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "INSERT INTO {table} (_id, zoom, geometry, document)
                     VALUES ($1, $2, ST_GeomFromGeoJSON($3)::geography, $4::jsonb)
                     ON CONFLICT (_id) DO UPDATE SET
                         zoom = EXCLUDED.zoom,
                         geometry = EXCLUDED.geometry,
                         document = EXCLUDED.document
                     WHERE {table}.document IS DISTINCT FROM EXCLUDED.document
                     RETURNING (xmax = 0) AS inserted"
                ),
                &[
                    DatabaseValue::String(feature.key()),
                    feature.zoom().map_or(DatabaseValue::Null, DatabaseValue::Real64),
                    DatabaseValue::String(geometry),
                    DatabaseValue::String(document),
                ],
            )
            .await
            .map_err(|e| format!("{}: {e}", feature.key()))?;

        let inserted: Option<Result<bool, _>> = rows.first().map(|row| row.to_value("inserted"));

        Ok(match inserted {
            Some(Ok(true)) => WriteCounts {
                inserted: 1,
                modified: 0,
            },
            Some(Ok(false)) => WriteCounts {
                inserted: 0,
                modified: 1,
            },
            Some(Err(e)) => return Err(format!("{}: {e}", feature.key())),
            None => WriteCounts::default(),
        })
    }
}

/// Quotes a collection name for use as a table identifier, rejecting
/// anything that is not `geo_<featureclass>`.
fn quoted_table(collection: &str) -> Result<String, StoreError> {
    collection
        .strip_prefix(COLLECTION_PREFIX)
        .filter(|fc| is_valid_featureclass(fc))
        .map(|_| format!("\"{collection}\""))
        .ok_or_else(|| StoreError::InvalidCollection {
            collection: collection.to_string(),
        })
}

/// Outcome of a racing `CREATE ... IF NOT EXISTS`: an error is forgiven
/// when the object exists afterwards.
fn settle_create<E>(
    result: Result<(), E>,
    exists_after: bool,
    object: &str,
) -> Result<(), StoreError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(()) => Ok(()),
        Err(e) if exists_after => {
            log::debug!("Concurrent creation of {object} won the race: {e}");
            Ok(())
        }
        Err(e) => Err(StoreError::backend(e)),
    }
}

fn index_name(collection: &str) -> String {
    format!("\"{collection}_geometry_idx\"")
}

#[async_trait]
impl FeatureStore for PostgisStore {
    async fn put_rule(&self, rule: &UploadRule) -> Result<WriteCounts, StoreError> {
        let mapping = serde_json::to_string(&rule.mapping)?;
        let rows = self
            .db
            .query_raw_params(
                "INSERT INTO upload_rules (id, featureclass, mapping)
                 VALUES ($1, $2, $3::jsonb)
                 ON CONFLICT (id) DO UPDATE SET
                     featureclass = EXCLUDED.featureclass,
                     mapping = EXCLUDED.mapping
                 WHERE upload_rules.featureclass IS DISTINCT FROM EXCLUDED.featureclass
                    OR upload_rules.mapping IS DISTINCT FROM EXCLUDED.mapping
                 RETURNING (xmax = 0) AS inserted",
                &[
                    DatabaseValue::String(rule.id.clone()),
                    DatabaseValue::String(rule.featureclass.clone()),
                    DatabaseValue::String(mapping),
                ],
            )
            .await
            .map_err(StoreError::backend)?;

        let inserted: Option<bool> = rows
            .first()
            .map(|row| row.to_value("inserted").map_err(StoreError::backend))
            .transpose()?;

        Ok(match inserted {
            Some(true) => WriteCounts {
                inserted: 1,
                modified: 0,
            },
            Some(false) => WriteCounts {
                inserted: 0,
                modified: 1,
            },
            None => WriteCounts::default(),
        })
    }

    async fn get_rule(&self, id: &str) -> Result<Option<UploadRule>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT featureclass, mapping::text AS mapping FROM upload_rules WHERE id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(StoreError::backend)?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let featureclass: String = row.to_value("featureclass").map_err(StoreError::backend)?;
        let mapping: String = row.to_value("mapping").map_err(StoreError::backend)?;
        let mapping: BTreeMap<String, String> = serde_json::from_str(&mapping)?;

        Ok(Some(UploadRule {
            id: id.to_string(),
            featureclass,
            mapping,
        }))
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT table_name::text AS table_name
                 FROM information_schema.tables
                 WHERE table_schema = current_schema()
                   AND table_name LIKE 'geo\\_%'
                 ORDER BY table_name",
                &[],
            )
            .await
            .map_err(StoreError::backend)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.to_value("table_name").ok())
            .collect())
    }

    async fn ensure_index(&self, collection: &str) -> Result<(), StoreError> {
        let table = quoted_table(collection)?;

        self.create_if_missing(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    _id TEXT PRIMARY KEY,
                    zoom DOUBLE PRECISION,
                    geometry geography NOT NULL,
                    document JSONB NOT NULL
                )"
            ),
            &table,
        )
        .await?;

        let index = index_name(collection);
        self.create_if_missing(
            &format!("CREATE INDEX IF NOT EXISTS {index} ON {table} USING GIST (geometry)"),
            &index,
        )
        .await?;

        log::debug!("Spatial index present on {collection}");

        Ok(())
    }

    async fn bulk_upsert(
        &self,
        collection: &str,
        features: &[StoredFeature],
    ) -> Result<WriteCounts, StoreError> {
        let table = quoted_table(collection)?;
        if !self.table_exists(&index_name(collection)).await? {
            return Err(StoreError::MissingIndex {
                collection: collection.to_string(),
            });
        }

        let results =
            futures::future::join_all(features.iter().map(|f| self.upsert_one(&table, f))).await;

        let mut counts = WriteCounts::default();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(c) => counts += c,
                Err(message) => failures.push(message),
            }
        }

        if let Some(first) = failures.first() {
            log::error!("{} of {} writes to {collection} failed", failures.len(), features.len());
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
        let table = quoted_table(collection)?;
        if !self.table_exists(&table).await? {
            return Ok(Vec::new());
        }

        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "SELECT document::text AS document
                     FROM {table}
                     WHERE ST_DWithin(
                         geometry,
                         ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                         $3,
                         false
                     )
                       AND (zoom IS NULL OR zoom <= $4)
                     ORDER BY geometry <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography"
                ),
                &[
                    DatabaseValue::Real64(query.lng),
                    DatabaseValue::Real64(query.lat),
                    DatabaseValue::Real64(query.radius_meters),
                    DatabaseValue::Real64(f64::from(query.zoom)),
                ],
            )
            .await
            .map_err(StoreError::backend)?;

        rows.iter()
            .map(|row| {
                let document: String = row.to_value("document").map_err(StoreError::backend)?;
                let doc: Document = serde_json::from_str(&document)?;
                let key = doc
                    .get(geostore_store_models::ID_FIELD)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                StoredFeature::from_document(doc).ok_or_else(|| StoreError::Corrupt {
                    collection: collection.to_string(),
                    key,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let table = quoted_table(collection)?;
        if !self.table_exists(&table).await? {
            return Ok(0);
        }

        let rows = self
            .db
            .query_raw_params(&format!("SELECT COUNT(*)::bigint AS n FROM {table}"), &[])
            .await
            .map_err(StoreError::backend)?;

        let n: i64 = rows
            .first()
            .map(|row| row.to_value("n").map_err(StoreError::backend))
            .transpose()?
            .unwrap_or(0);

        Ok(u64::try_from(n).unwrap_or(0))
    }
}
