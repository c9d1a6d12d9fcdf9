//! HTTP Basic credential check for the write routes.
//!
//! Credentials are resolved once at startup. When they are absent the
//! write routes are never registered, so this middleware only ever runs
//! with a configured user and password.

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::middleware::Next;
use actix_web::web;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::ApiError;

/// The configured write credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Creates credentials from a user and password.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Reads `GEOSTORE_USER` and `GEOSTORE_PASSWORD`; `None` unless both
    /// are set and non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let user = std::env::var("GEOSTORE_USER").ok().filter(|s| !s.is_empty())?;
        let password = std::env::var("GEOSTORE_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())?;
        Some(Self::new(user, password))
    }

    /// Checks an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the header is missing or not
    /// well-formed Basic credentials, or [`ApiError::Forbidden`] if they
    /// do not match.
    pub fn check(&self, header: Option<&str>) -> Result<(), ApiError> {
        let (user, password) = header
            .and_then(decode_basic)
            .ok_or(ApiError::Unauthorized)?;

        if user == self.user.as_bytes() && password == self.password.as_bytes() {
            Ok(())
        } else {
            log::warn!(
                "Rejected credentials for user {:?}",
                String::from_utf8_lossy(&user)
            );
            Err(ApiError::Forbidden)
        }
    }
}

/// Splits Basic credentials into raw user and password bytes at the first
/// colon. The decoded bytes need not be UTF-8.
fn decode_basic(header: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let mut decoded = STANDARD.decode(encoded.trim()).ok()?;
    let colon = decoded.iter().position(|b| *b == b':')?;
    let password = decoded.split_off(colon + 1);
    decoded.truncate(colon);
    Some((decoded, password))
}

/// Middleware guarding the write routes.
///
/// Expects a `web::Data<Credentials>` registered alongside the guarded
/// routes.
///
/// # Errors
///
/// Returns an [`ApiError`] response when the credentials are missing,
/// malformed, or wrong.
pub async fn require_credentials(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let Some(credentials) = req.app_data::<web::Data<Credentials>>() else {
        log::error!("Write route registered without credentials");
        return Err(ApiError::Internal.into());
    };

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    credentials.check(header)?;

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[test]
    fn accepts_matching_credentials() {
        let creds = Credentials::new("admin", "s3cret:with:colons");
        assert!(creds.check(Some(&basic("admin:s3cret:with:colons"))).is_ok());
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        let creds = Credentials::new("admin", "pw");
        for header in [None, Some("Bearer abc"), Some("Basic !!!"), Some("Basic")] {
            assert!(
                matches!(creds.check(header), Err(ApiError::Unauthorized)),
                "{header:?}"
            );
        }
        let no_colon = basic("adminpw");
        assert!(matches!(
            creds.check(Some(&no_colon)),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_credentials_are_forbidden() {
        let creds = Credentials::new("admin", "pw");
        assert!(matches!(
            creds.check(Some(&basic("admin:nope"))),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn non_utf8_credentials_are_compared_not_refused() {
        let creds = Credentials::new("admin", "pw");
        let header = format!("Basic {}", STANDARD.encode(b"admin:\xff\xfe"));
        assert!(matches!(
            creds.check(Some(&header)),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn password_splits_at_first_colon() {
        let (user, password) = decode_basic(&basic("a:b:c")).unwrap();
        assert_eq!(user, b"a");
        assert_eq!(password, b"b:c");
    }

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("admin", "pw");
        assert!(!format!("{creds:?}").contains("pw\""));
    }
}
