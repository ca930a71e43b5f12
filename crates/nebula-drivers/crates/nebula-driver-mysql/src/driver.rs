//! MySQL driver implementation

use async_trait::async_trait;
use nebula_core::{
    Connection, ConnectionProfile, DatabaseDriver, Dialect, Result, url_user_prefix,
};
use std::sync::Arc;

use crate::MySqlConnection;

/// MySQL/MariaDB database driver
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn name(&self) -> &'static str {
        "mysql"
    }

    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String {
        format!(
            "mysql://{}{}:{}/{}",
            url_user_prefix(profile),
            profile.host,
            profile.effective_port(),
            database
        )
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    #[tracing::instrument(skip(self, profile), fields(connection_id = %profile.id, host = %profile.host))]
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>> {
        let timeout = self.configure_pool(profile, database).acquire_timeout();
        let conn = MySqlConnection::connect(
            &profile.host,
            profile.effective_port(),
            Some(database),
            profile.username.as_deref(),
            profile.password.as_deref(),
            timeout,
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to MySQL database"))?;

        tracing::info!(url = %self.build_url(profile, database), "MySQL connection created");
        Ok(Arc::new(conn))
    }
}
