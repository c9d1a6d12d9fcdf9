#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operator CLI for geostore.
//!
//! Runs the same rule, ingest, and query pipelines as the HTTP server
//! directly against the store selected by `GEOSTORE_BACKEND`, plus schema
//! migrations and index maintenance.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use geostore_database::{Backend, db, open_store, run_migrations};
use geostore_server_models::{ApiFeature, ApiFeatureCollection};
use geostore_store::FeatureStore;

#[derive(Parser)]
#[command(name = "geostore_cli", about = "geostore operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create or replace an upload rule
    PutRule {
        /// Rule identifier
        id: String,
        /// Target feature class (letters, digits, and underscores)
        featureclass: String,
        /// Mapping as a JSON object, e.g. `{"_id":"code","name":"label"}`
        mapping: String,
    },
    /// Print a stored upload rule
    GetRule {
        /// Rule identifier
        id: String,
    },
    /// Ingest a `GeoJSON` `FeatureCollection` file under a rule
    Upload {
        /// Rule identifier
        rule: String,
        /// Path to the `GeoJSON` file
        file: PathBuf,
    },
    /// Run a proximity query and print the resulting `FeatureCollection`
    Query {
        /// Feature class to query
        featureclass: String,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: String,
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        /// Radius in radians (defaults to a quarter turn)
        #[arg(long)]
        radius: Option<String>,
        /// Include mapped attributes as `properties`
        #[arg(long)]
        attributes: bool,
    },
    /// List feature-class collections and their document counts
    Collections,
    /// Create any missing spatial indexes on existing collections
    VerifyIndexes,
}

async fn store() -> Result<Arc<dyn FeatureStore>, Box<dyn std::error::Error>> {
    Ok(open_store(Backend::from_env()?).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            log::info!("Running database migrations...");
            let db = db::connect_from_env().await?;
            run_migrations(db.as_ref()).await?;
            log::info!("Migrations complete.");
        }
        Commands::PutRule {
            id,
            featureclass,
            mapping,
        } => {
            let mapping: serde_json::Value = serde_json::from_str(&mapping)?;
            let store = store().await?;
            let counts =
                geostore_rules::put_rule(store.as_ref(), &id, Some(featureclass.as_str()), Some(&mapping))
                    .await?;
            println!(
                "Rule {id}: inserted={}, modified={}",
                counts.inserted, counts.modified
            );
        }
        Commands::GetRule { id } => {
            let store = store().await?;
            let rule = geostore_rules::get_rule(store.as_ref(), &id).await?;
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }
        Commands::Upload { rule, file } => {
            log::info!("Reading {}...", file.display());
            let body: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let store = store().await?;
            let outcome = geostore_ingest::ingest(store.as_ref(), &rule, &body).await?;
            println!(
                "{}: inserted={}, modified={}",
                outcome.collection, outcome.counts.inserted, outcome.counts.modified
            );
        }
        Commands::Query {
            featureclass,
            lng,
            lat,
            radius,
            attributes,
        } => {
            let plan = geostore_query::plan(Some(lng.as_str()), Some(lat.as_str()), radius.as_deref())?;
            log::info!(
                "zoom={} radius={}m tolerance={}",
                plan.zoom,
                plan.radius_meters,
                plan.tolerance
            );
            let store = store().await?;
            let hits = geostore_query::query(store.as_ref(), &featureclass, &plan, attributes).await?;
            let collection = ApiFeatureCollection::new(
                hits.into_iter()
                    .map(|hit| ApiFeature::new(hit.geometry, hit.attributes))
                    .collect(),
            );
            println!("{}", serde_json::to_string_pretty(&collection)?);
        }
        Commands::Collections => {
            let store = store().await?;
            let collections = store.list_collections().await?;
            println!("{:<30} DOCUMENTS", "COLLECTION");
            println!("{}", "-".repeat(45));
            for collection in &collections {
                println!("{collection:<30} {}", store.count(collection).await?);
            }
        }
        Commands::VerifyIndexes => {
            let store = store().await?;
            let verified = geostore_store::verify_indexes(store.as_ref()).await?;
            println!("Verified spatial indexes on {verified} collections");
        }
    }

    Ok(())
}
