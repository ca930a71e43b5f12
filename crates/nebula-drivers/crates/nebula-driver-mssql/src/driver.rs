//! MS SQL Server driver implementation

use async_trait::async_trait;
use nebula_core::{Connection, ConnectionProfile, DatabaseDriver, Dialect, Result};
use std::sync::Arc;

use crate::MssqlConnection;

/// MS SQL Server database driver
#[derive(Debug, Clone, Default)]
pub struct MssqlDriver;

impl MssqlDriver {
    /// Create a new MS SQL Server driver instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn name(&self) -> &'static str {
        "mssql"
    }

    /// JDBC-style URL; the user travels separately so nothing secret is embedded
    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        let mut url = format!("sqlserver://{}:{}", profile.host, profile.effective_port());
        if !database.is_empty() {
            url.push_str(&format!(";databaseName={}", database));
        }
        if profile.param_flag("trust_cert") {
            url.push_str(";trustServerCertificate=true");
        }
        url
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id, host = %profile.host))]
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>> {
        let timeout = self.configure_pool(profile, database).acquire_timeout();
        let conn = MssqlConnection::connect(
            &profile.host,
            profile.effective_port(),
            Some(database),
            profile.username.as_deref(),
            profile.password.as_deref(),
            profile.param_flag("trust_cert"),
            timeout,
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to MS SQL Server"))?;

        tracing::info!(url = %self.build_url(profile, database), "MS SQL Server connection created");
        Ok(Arc::new(conn))
    }
}
