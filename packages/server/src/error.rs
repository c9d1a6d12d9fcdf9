//! Mapping of pipeline errors onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::http::header::WWW_AUTHENTICATE;
use actix_web::{HttpResponse, ResponseError};
use geostore_ingest::IngestError;
use geostore_query::QueryError;
use geostore_rules::RuleError;
use geostore_server_models::ApiErrorBody;
use geostore_store::StoreError;

/// An error returned to an API client as `{ "error": message }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request (400).
    #[error("{0}")]
    Validation(String),

    /// Unknown resource (404).
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed credentials (401).
    #[error("Authentication required")]
    Unauthorized,

    /// Wrong credentials (403).
    #[error("Invalid credentials")]
    Forbidden,

    /// Body exceeds the upload limit (413).
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Anything else (500). The cause is logged, never returned.
    #[error("Internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if matches!(self, Self::Unauthorized) {
            builder.insert_header((WWW_AUTHENTICATE, "Basic realm=\"geostore\""));
        }
        builder.json(ApiErrorBody {
            error: self.to_string(),
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        log::error!("Store error: {e}");
        Self::Internal
    }
}

impl From<RuleError> for ApiError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::Validation { message } => Self::Validation(message),
            RuleError::NotFound { .. } => Self::NotFound(e.to_string()),
            RuleError::Store(e) => e.into(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Validation { message } => Self::Validation(message),
            IngestError::Rule(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Validation { message } => Self::Validation(message),
            QueryError::Geo(e) => Self::Validation(e.to_string()),
            QueryError::Store(e) => e.into(),
        }
    }
}
