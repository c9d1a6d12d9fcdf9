//! Process configuration read from the environment at startup.

use crate::auth::Credentials;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default maximum JSON body size (50 MiB).
pub const DEFAULT_UPLOAD_LIMIT: usize = 50 * 1024 * 1024;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Maximum accepted JSON body size in bytes.
    pub upload_limit: usize,
    /// Write credentials. `None` leaves the write routes unregistered.
    pub credentials: Option<Credentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            credentials: None,
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `GEOSTORE_UPLOAD_LIMIT`,
    /// `GEOSTORE_USER`, and `GEOSTORE_PASSWORD`.
    ///
    /// Unparseable numbers fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let upload_limit: usize = std::env::var("GEOSTORE_UPLOAD_LIMIT")
            .ok()
            .and_then(|l| l.parse().ok())
            .unwrap_or(DEFAULT_UPLOAD_LIMIT);

        Self {
            bind_addr,
            port,
            upload_limit,
            credentials: Credentials::from_env(),
        }
    }
}
