//! Database driver trait definition

use crate::{Connection, ConnectionProfile, Dialect, PoolConfig, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-dialect provider: URL construction, pool sizing, validation and
/// connection establishment.
///
/// Providers hold no shared mutable state; one instance per dialect is
/// registered at startup and shared behind an `Arc`.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// The dialect this provider serves
    fn dialect(&self) -> Dialect;

    /// Short identifier used in logs (e.g. "postgres", "mssql")
    fn name(&self) -> &'static str;

    /// Display name for UI
    fn display_name(&self) -> &'static str {
        self.dialect().display_name()
    }

    fn default_port(&self) -> u16 {
        self.dialect().default_port()
    }

    /// Build a connection URL for `database`.
    ///
    /// URLs are for display and logging; they never carry the password.
    fn build_url(&self, profile: &ConnectionProfile, database: &str) -> String;

    /// Pool settings for one (connection, database) pair
    fn configure_pool(&self, profile: &ConnectionProfile, database: &str) -> PoolConfig {
        PoolConfig::conservative(&profile.id, database)
    }

    /// Database the server connects to when none is named
    fn fallback_database(&self) -> Option<&'static str> {
        None
    }

    /// The database a pool for `requested` actually targets: the request,
    /// then the profile default, then the provider fallback
    fn resolve_database(&self, profile: &ConnectionProfile, requested: Option<&str>) -> String {
        let database = profile.target_database(requested);
        match self.fallback_database() {
            Some(fallback) if database.is_empty() => fallback.to_string(),
            _ => database,
        }
    }

    /// Cheap statement used to check a connection is alive
    fn validation_query(&self) -> &'static str {
        "SELECT 1"
    }

    /// Positional bind marker for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;

    /// Open a single connection against `database`
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Arc<dyn Connection>>;
}

/// `user@` prefix for URLs, empty when the profile has no username
pub fn url_user_prefix(profile: &ConnectionProfile) -> String {
    match profile.username.as_deref() {
        Some(user) if !user.is_empty() => format!("{}@", user),
        _ => String::new(),
    }
}
