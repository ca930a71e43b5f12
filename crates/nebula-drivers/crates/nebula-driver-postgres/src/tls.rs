//! PostgreSQL TLS support
//!
//! Maps the profile's `ssl_mode` / `ssl_ca_cert` params onto a native-tls
//! connector usable by tokio-postgres.

use native_tls::{Certificate, TlsConnector};
use nebula_core::{NebulaError, Result};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::str::FromStr;

/// libpq-style SSL modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostgresSslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl PostgresSslMode {
    pub fn uses_tls(&self) -> bool {
        !matches!(self, PostgresSslMode::Disable)
    }

    pub(crate) fn to_tokio_postgres(self) -> tokio_postgres::config::SslMode {
        match self {
            PostgresSslMode::Disable => tokio_postgres::config::SslMode::Disable,
            PostgresSslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            _ => tokio_postgres::config::SslMode::Require,
        }
    }
}

impl FromStr for PostgresSslMode {
    type Err = NebulaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "disable" => Ok(PostgresSslMode::Disable),
            "allow" | "prefer" => Ok(PostgresSslMode::Prefer),
            "require" => Ok(PostgresSslMode::Require),
            "verify-ca" => Ok(PostgresSslMode::VerifyCa),
            "verify-full" => Ok(PostgresSslMode::VerifyFull),
            other => Err(NebulaError::Configuration(format!(
                "unknown ssl_mode '{}'",
                other
            ))),
        }
    }
}

/// Build a TLS connector for the given mode.
///
/// `require` without a CA accepts any certificate; `verify-ca` skips only
/// hostname checks; `verify-full` checks both.
pub fn build_tls_connector(
    mode: PostgresSslMode,
    ca_cert_path: Option<&str>,
) -> Result<MakeTlsConnector> {
    let mut builder = TlsConnector::builder();

    if let Some(path) = ca_cert_path.filter(|p| !p.is_empty()) {
        let pem = fs::read(path).map_err(|e| {
            NebulaError::Configuration(format!("failed to read CA certificate {}: {}", path, e))
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            NebulaError::Configuration(format!("failed to parse CA certificate: {}", e))
        })?;
        builder.add_root_certificate(cert);
    }

    let no_ca = ca_cert_path.map_or(true, str::is_empty);
    match mode {
        PostgresSslMode::Prefer | PostgresSslMode::Require if no_ca => {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        PostgresSslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {}
    }

    let connector = builder
        .build()
        .map_err(|e| NebulaError::Configuration(format!("failed to build TLS connector: {}", e)))?;
    tracing::debug!(mode = ?mode, "PostgreSQL TLS connector built");
    Ok(MakeTlsConnector::new(connector))
}
