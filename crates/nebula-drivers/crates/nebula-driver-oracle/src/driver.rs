//! Oracle driver implementation

use async_trait::async_trait;
use nebula_core::{Connection, ConnectionProfile, DatabaseDriver, Dialect, Result};
use std::sync::Arc;

use crate::OracleConnection;

/// Oracle database driver.
///
/// The target database is the service name; an empty target connects to the
/// listener's default service.
#[derive(Debug, Clone, Default)]
pub struct OracleDriver;

impl OracleDriver {
    pub fn new() -> Self {
        Self
    }

    fn connect_string(profile: &ConnectionProfile, database: &str) -> String {
        if database.is_empty() {
            format!("//{}:{}", profile.host, profile.effective_port())
        } else {
            format!("//{}:{}/{}", profile.host, profile.effective_port(), database)
        }
    }
}

#[async_trait]
impl DatabaseDriver for OracleDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        format!("oracle:{}", Self::connect_string(profile, database))
    }

    fn validation_query(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }

    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id, host = %profile.host))]
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>> {
        let timeout = self.configure_pool(profile, database).acquire_timeout();
        let conn = OracleConnection::connect(
            &Self::connect_string(profile, database),
            profile.username.as_deref().unwrap_or_default(),
            profile.password.as_deref().unwrap_or_default(),
            timeout,
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to Oracle database"))?;

        tracing::info!(url = %self.build_url(profile, database), "Oracle connection created");
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_uses_service_name() {
        let driver = OracleDriver::new();
        let profile = ConnectionProfile::new("o1", Dialect::Oracle)
            .with_host("ora.corp", 0)
            .with_credentials("hr", "tiger");

        let url = driver.build_url(&profile, "XEPDB1");
        assert_eq!(url, "oracle://ora.corp:1521/XEPDB1");
        assert!(!url.contains("tiger"));
        assert_eq!(driver.build_url(&profile, ""), "oracle://ora.corp:1521");
    }

    #[test]
    fn test_dialect_specifics() {
        let driver = OracleDriver::new();
        assert_eq!(driver.validation_query(), "SELECT 1 FROM DUAL");
        assert_eq!(driver.placeholder(1), ":1");
        assert_eq!(driver.placeholder(4), ":4");
        assert_eq!(driver.default_port(), 1521);
    }
}
