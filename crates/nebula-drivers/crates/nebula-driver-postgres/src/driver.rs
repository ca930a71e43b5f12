//! PostgreSQL driver implementation

use async_trait::async_trait;
use nebula_core::{
    Connection, ConnectionProfile, DatabaseDriver, Dialect, NebulaError, Result, url_user_prefix,
};
use std::sync::Arc;

use crate::{PostgresConnection, PostgresSslMode};

/// Database used when neither the request nor the profile names one
const FALLBACK_DATABASE: &str = "postgres";

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn name(&self) -> &'static str {
        "postgres"
    }

    fn fallback_database(&self) -> Option<&'static str> {
        Some(FALLBACK_DATABASE)
    }

    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        let database = if database.is_empty() { FALLBACK_DATABASE } else { database };
        format!(
            "postgresql://{}{}:{}/{}",
            url_user_prefix(profile),
            profile.host,
            profile.effective_port(),
            database
        )
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id, host = %profile.host))]
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>> {
        let database = if database.is_empty() { FALLBACK_DATABASE } else { database };
        let ssl_mode = profile
            .param("ssl_mode")
            .map(str::parse::<PostgresSslMode>)
            .transpose()?
            .unwrap_or_default();

        let conn = PostgresConnection::connect(
            &profile.host,
            profile.effective_port(),
            database,
            profile.username.as_deref(),
            profile.password.as_deref(),
            ssl_mode,
            profile.param("ssl_ca_cert"),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            match e {
                NebulaError::Connection(msg) => NebulaError::Connection(msg),
                other => NebulaError::Connection(format!(
                    "Failed to connect to PostgreSQL database: {}",
                    other
                )),
            }
        })?;

        tracing::info!(
            url = %self.build_url(profile, database),
            ssl_mode = ?ssl_mode,
            "PostgreSQL connection created"
        );
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ConnectionProfile {
        ConnectionProfile::new("c1", Dialect::Postgres)
            .with_host("db.internal", 0)
            .with_database("sales")
            .with_credentials("app", "s3cret")
    }

    #[test]
    fn test_build_url_omits_password() {
        let driver = PostgresDriver::new();
        let url = driver.build_url(&profile(), "sales");
        assert_eq!(url, "postgresql://app@db.internal:5432/sales");
        assert!(!url.contains("s3cret"));
    }

    #[test]
    fn test_build_url_without_user_or_database() {
        let driver = PostgresDriver::new();
        let profile = ConnectionProfile::new("c2", Dialect::Postgres).with_host("localhost", 6543);
        assert_eq!(driver.build_url(&profile, ""), "postgresql://localhost:6543/postgres");
    }

    #[test]
    fn test_resolve_database_uses_fallback_last() {
        let driver = PostgresDriver::new();
        let bare = ConnectionProfile::new("c2", Dialect::Postgres).with_host("localhost", 5432);
        assert_eq!(driver.resolve_database(&bare, None), "postgres");
        assert_eq!(driver.resolve_database(&bare, Some("")), "postgres");
        assert_eq!(driver.resolve_database(&bare, Some("hr")), "hr");
        assert_eq!(driver.resolve_database(&profile(), None), "sales");
    }

    #[test]
    fn test_placeholders_are_numbered() {
        let driver = PostgresDriver::new();
        assert_eq!(driver.placeholder(1), "$1");
        assert_eq!(driver.placeholder(12), "$12");
    }

    #[test]
    fn test_pool_and_validation_defaults() {
        let driver = PostgresDriver::new();
        let config = driver.configure_pool(&profile(), "sales");
        assert_eq!(config.name(), "nebula-c1@sales");
        assert_eq!(config.max_size(), 5);
        assert_eq!(driver.validation_query(), "SELECT 1");
        assert_eq!(driver.default_port(), 5432);
    }

    #[tokio::test]
    async fn test_invalid_ssl_mode_is_rejected_before_dialing() {
        let driver = PostgresDriver::new();
        let profile = profile().with_param("ssl_mode", "sometimes");
        let err = driver.connect(&profile, "sales").await.err().expect("error");
        assert!(matches!(err, NebulaError::Configuration(_)));
    }
}
