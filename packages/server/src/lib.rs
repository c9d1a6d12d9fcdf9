#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for geostore.
//!
//! Serves the public proximity query endpoint and, when write credentials
//! are configured, the rule and upload endpoints behind HTTP Basic auth.
//! The store is opened, migrated, and index-verified before the server
//! binds; any failure along the way aborts startup.

pub mod auth;
pub mod config;
pub mod error;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{App, HttpRequest, HttpServer, middleware, web};
use geostore_database::{Backend, DbError};
use geostore_store::{FeatureStore, StoreError};

pub use auth::Credentials;
pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Document store, ready for use.
    pub store: Arc<dyn FeatureStore>,
}

/// Errors that abort server startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The store could not be opened or migrated.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Spatial index verification failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The HTTP server failed to bind or run.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let api = match &err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            ApiError::PayloadTooLarge(err.to_string())
        }
        _ => ApiError::Validation(err.to_string()),
    };
    api.into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(err.to_string()).into()
}

/// Registers the API routes.
///
/// The write routes (`/rule/{ruleId}`, `/upload/{ruleId}`) are registered
/// only when `credentials` is `Some`, and are then guarded by
/// [`auth::require_credentials`].
pub fn configure(cfg: &mut web::ServiceConfig, upload_limit: usize, credentials: Option<&Credentials>) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(upload_limit)
            .error_handler(json_error),
    )
    .app_data(web::QueryConfig::default().error_handler(query_error))
    .route("/health", web::get().to(handlers::health))
    .route("/features/{featureclass}", web::get().to(handlers::features));

    if let Some(credentials) = credentials {
        cfg.app_data(web::Data::new(credentials.clone()))
            .service(
                web::scope("/rule")
                    .wrap(middleware::from_fn(auth::require_credentials))
                    .route("/{rule_id}", web::post().to(handlers::put_rule))
                    .route("/{rule_id}", web::get().to(handlers::get_rule)),
            )
            .service(
                web::scope("/upload")
                    .wrap(middleware::from_fn(auth::require_credentials))
                    .route("/{rule_id}", web::post().to(handlers::upload)),
            );
    }
}

/// Opens the store selected by `GEOSTORE_BACKEND` and verifies the
/// spatial index of every existing feature-class collection.
///
/// # Errors
///
/// Returns [`ServerError`] if connecting, migrating, or index
/// verification fails.
pub async fn open_store() -> Result<Arc<dyn FeatureStore>, ServerError> {
    let backend = Backend::from_env()?;

    log::info!("Opening {backend:?} store...");
    let store = geostore_database::open_store(backend).await?;

    let verified = geostore_store::verify_indexes(store.as_ref()).await?;
    log::info!("Verified spatial indexes on {verified} collections");

    Ok(store)
}

/// Starts the geostore API server.
///
/// Opens and verifies the store, then serves until shutdown. This is a
/// regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if startup fails or the HTTP server fails to
/// bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let store = open_store().await?;
    let state = web::Data::new(AppState { store });

    if config.credentials.is_some() {
        log::info!("Write endpoints enabled");
    } else {
        log::warn!("GEOSTORE_USER/GEOSTORE_PASSWORD not set; write endpoints disabled");
    }

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    let ServerConfig {
        bind_addr,
        port,
        upload_limit,
        credentials,
    } = config;

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| configure(cfg, upload_limit, credentials.as_ref()))
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::http::header::{AUTHORIZATION, ContentType};
    use actix_web::test;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use geostore_store::MemoryStore;
    use serde_json::{Value, json};

    const LIMIT: usize = 64 * 1024;

    fn auth_header() -> (actix_web::http::header::HeaderName, String) {
        (AUTHORIZATION, format!("Basic {}", STANDARD.encode("admin:pw")))
    }

    macro_rules! app {
        ($store:expr, $credentials:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState { store: $store }))
                    .configure(|cfg| configure(cfg, LIMIT, $credentials)),
            )
            .await
        };
    }

    fn memory() -> Arc<dyn FeatureStore> {
        Arc::new(MemoryStore::new())
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = app!(memory(), None);
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(body["healthy"], json!(true));
        assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[actix_web::test]
    async fn write_routes_absent_without_credentials() {
        let app = app!(memory(), None);
        let req = test::TestRequest::post()
            .uri("/rule/r1")
            .set_json(json!({"featureclass": "poi", "mapping": {"_id": "code"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn write_routes_require_credentials() {
        let creds = Credentials::new("admin", "pw");
        let app = app!(memory(), Some(&creds));

        let missing = test::TestRequest::post()
            .uri("/rule/r1")
            .set_json(json!({"featureclass": "poi", "mapping": {"_id": "code"}}))
            .to_request();
        let resp = test::call_service(&app, missing).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let wrong = test::TestRequest::post()
            .uri("/upload/r1")
            .insert_header((AUTHORIZATION, format!("Basic {}", STANDARD.encode("admin:nope"))))
            .set_json(json!({"type": "FeatureCollection", "features": []}))
            .to_request();
        let resp = test::call_service(&app, wrong).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn rule_upload_query_round_trip() {
        let creds = Credentials::new("admin", "pw");
        let app = app!(memory(), Some(&creds));

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/rule/r1")
                .insert_header(auth_header())
                .set_json(json!({"featureclass": "poi", "mapping": {"_id": "code", "name": "label"}}))
                .to_request(),
        )
        .await;
        assert_eq!(body, json!({"success": true, "inserted": 1, "modified": 0}));

        let upload = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"code": "A1", "label": "Cafe"},
                "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}
            }]
        });
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/upload/r1")
                .insert_header(auth_header())
                .set_json(&upload)
                .to_request(),
        )
        .await;
        assert_eq!(
            body,
            json!({"success": true, "collection": "geo_poi", "inserted": 1, "modified": 0})
        );

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/features/poi?lng=2.35&lat=48.85&radius=0.01")
                .to_request(),
        )
        .await;
        assert_eq!(
            body,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}
                }]
            })
        );

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/features/poi?lng=2.35&lat=48.85&radius=0.01&attributes=true")
                .to_request(),
        )
        .await;
        assert_eq!(body["features"][0]["properties"], json!({"name": "Cafe"}));

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/rule/r1")
                .insert_header(auth_header())
                .to_request(),
        )
        .await;
        assert_eq!(
            body,
            json!({"id": "r1", "featureclass": "poi", "mapping": {"_id": "code", "name": "label"}})
        );
    }

    #[actix_web::test]
    async fn rule_validation_is_a_bad_request() {
        let creds = Credentials::new("admin", "pw");
        let app = app!(memory(), Some(&creds));

        let req = test::TestRequest::post()
            .uri("/rule/r1")
            .insert_header(auth_header())
            .set_json(json!({"featureclass": "poi", "mapping": {"name": "label"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().is_some_and(|m| m.contains("_id")));
    }

    #[actix_web::test]
    async fn upload_to_unknown_rule_is_not_found() {
        let creds = Credentials::new("admin", "pw");
        let app = app!(memory(), Some(&creds));

        let req = test::TestRequest::post()
            .uri("/upload/missing")
            .insert_header(auth_header())
            .set_json(json!({"type": "FeatureCollection", "features": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn malformed_json_uses_error_body() {
        let creds = Credentials::new("admin", "pw");
        let app = app!(memory(), Some(&creds));

        let req = test::TestRequest::post()
            .uri("/upload/r1")
            .insert_header(auth_header())
            .insert_header(ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn bad_coordinates_are_a_bad_request() {
        let app = app!(memory(), None);
        for uri in ["/features/poi?lat=1", "/features/poi?lng=abc&lat=1", "/features/bad-name?lng=0&lat=0"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[actix_web::test]
    async fn unknown_featureclass_is_empty_collection() {
        let app = app!(memory(), None);
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/features/parks?lng=0&lat=0")
                .to_request(),
        )
        .await;
        assert_eq!(body, json!({"type": "FeatureCollection", "features": []}));
    }
}
