#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `PostGIS` document store, connection, and migrations for geostore.
//!
//! Uses `switchy_database` raw SQL for every query and `switchy_schema`
//! for embedded SQL migrations. Each feature-class collection is a table
//! with a `geography` column and a `GiST` index; documents are kept whole
//! in a `JSONB` column.

pub mod db;
pub mod postgis;

use std::sync::Arc;

use geostore_store::{FeatureStore, MemoryStore, StoreError};
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

pub use postgis::PostgisStore;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur while opening or migrating a store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Connection could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// `GEOSTORE_BACKEND` named something other than `postgres` or `memory`.
    #[error("Unknown store backend: {name}")]
    UnknownBackend {
        /// The configured backend name.
        name: String,
    },

    /// Store operation error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which [`FeatureStore`] implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `PostGIS` via `DATABASE_URL`.
    Postgres,
    /// Process-local, non-persistent store.
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgis" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(DbError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

impl Backend {
    /// Reads `GEOSTORE_BACKEND`, defaulting to [`Backend::Postgres`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownBackend`] for unrecognized values.
    pub fn from_env() -> Result<Self, DbError> {
        std::env::var("GEOSTORE_BACKEND").map_or(Ok(Self::Postgres), |v| v.parse())
    }
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Opens the store selected by `backend`.
///
/// For `PostGIS` this connects via `DATABASE_URL` and runs migrations, so
/// the returned store is ready for use.
///
/// # Errors
///
/// Returns [`DbError`] if connecting or migrating fails.
pub async fn open_store(backend: Backend) -> Result<Arc<dyn FeatureStore>, DbError> {
    match backend {
        Backend::Memory => {
            log::warn!("Using in-memory store; data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Postgres => {
            log::info!("Connecting to database...");
            let db = db::connect_from_env().await?;

            log::info!("Running migrations...");
            run_migrations(db.as_ref()).await?;

            Ok(Arc::new(PostgisStore::new(db)))
        }
    }
}
