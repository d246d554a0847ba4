use std::path::PathBuf;

use crate::{errors::TlsError, Result};

/// TLS configuration for the xDS gRPC listener: server identity plus an
/// optional client CA for mTLS.
#[derive(Debug, Clone)]
pub struct XdsTlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub client_ca_path: Option<PathBuf>,
    pub require_client_cert: bool,
}

impl XdsTlsConfig {
    /// Load xDS TLS configuration from environment variables.
    ///
    /// `GLIDEPATH_XDS_TLS_ENABLED` gates the whole block; when unset or
    /// falsy the xDS server listens in plaintext.
    pub fn from_env() -> Result<Option<Self>> {
        let enabled = std::env::var("GLIDEPATH_XDS_TLS_ENABLED")
            .ok()
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        if !enabled {
            return Ok(None);
        }

        let cert_path = std::env::var("GLIDEPATH_XDS_TLS_CERT_PATH")
            .map_err(|_| TlsError::MissingCertificatePath)?
            .trim()
            .to_string();
        if cert_path.is_empty() {
            return Err(TlsError::MissingCertificatePath.into());
        }

        let key_path = std::env::var("GLIDEPATH_XDS_TLS_KEY_PATH")
            .map_err(|_| TlsError::MissingPrivateKeyPath)?
            .trim()
            .to_string();
        if key_path.is_empty() {
            return Err(TlsError::MissingPrivateKeyPath.into());
        }

        let client_ca_path = std::env::var("GLIDEPATH_XDS_TLS_CLIENT_CA_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let require_client_cert = std::env::var("GLIDEPATH_XDS_TLS_REQUIRE_CLIENT_CERT")
            .ok()
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Some(Self {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
            client_ca_path,
            require_client_cert,
        }))
    }
}
