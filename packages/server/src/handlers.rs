//! HTTP handler functions for the geostore API.

use actix_web::{HttpResponse, web};
use geostore_server_models::{
    ApiFeature, ApiFeatureCollection, ApiHealth, FeatureQueryParams, RuleBody, RuleResponse,
    UploadResponse,
};
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /rule/{ruleId}`
///
/// Creates or replaces an upload rule.
pub async fn put_rule(
    state: web::Data<AppState>,
    rule_id: web::Path<String>,
    body: web::Json<RuleBody>,
) -> Result<HttpResponse, ApiError> {
    let counts = geostore_rules::put_rule(
        state.store.as_ref(),
        &rule_id,
        body.featureclass.as_deref(),
        body.mapping.as_ref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(RuleResponse::from(counts)))
}

/// `GET /rule/{ruleId}`
pub async fn get_rule(
    state: web::Data<AppState>,
    rule_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let rule = geostore_rules::get_rule(state.store.as_ref(), &rule_id).await?;
    Ok(HttpResponse::Ok().json(rule))
}

/// `POST /upload/{ruleId}`
///
/// Ingests a `GeoJSON` `FeatureCollection` under the given rule.
pub async fn upload(
    state: web::Data<AppState>,
    rule_id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let outcome = geostore_ingest::ingest(state.store.as_ref(), &rule_id, &body).await?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        collection: outcome.collection,
        inserted: outcome.counts.inserted,
        modified: outcome.counts.modified,
    }))
}

/// `GET /features/{featureclass}`
///
/// Returns features near `lng`/`lat` as a `FeatureCollection`, simplified
/// for the zoom tier implied by `radius`.
pub async fn features(
    state: web::Data<AppState>,
    featureclass: web::Path<String>,
    params: web::Query<FeatureQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let plan = geostore_query::plan(
        params.lng.as_deref(),
        params.lat.as_deref(),
        params.radius.as_deref(),
    )?;

    let hits = geostore_query::query(
        state.store.as_ref(),
        &featureclass,
        &plan,
        params.attributes.unwrap_or(false),
    )
    .await?;

    let features = hits
        .into_iter()
        .map(|hit| ApiFeature::new(hit.geometry, hit.attributes))
        .collect();

    Ok(HttpResponse::Ok().json(ApiFeatureCollection::new(features)))
}
