//! Pooled executors: one bounded pool per (connection, target database)

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nebula_core::{
    Connection, ConnectionProfile, DatabaseDriver, Dialect, NebulaError, PoolConfig, QueryResult,
    Result, Value,
};

use crate::pool::{ConnectionFactory, ConnectionPool, PoolStats};

/// Cache key for pooled executors.
///
/// Renders as `{connection_id}@{database}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolCacheKey {
    pub connection_id: String,
    pub database: String,
}

impl PoolCacheKey {
    pub fn new(connection_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            database: database.into(),
        }
    }

    /// Whether this key belongs to the given connection profile
    pub fn belongs_to(&self, connection_id: &str) -> bool {
        self.connection_id == connection_id
    }
}

impl fmt::Display for PoolCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.connection_id, self.database)
    }
}

/// Opens connections through a dialect driver and validates idle ones with
/// the driver's validation query.
pub struct DriverConnectionFactory {
    driver: Arc<dyn DatabaseDriver>,
    profile: ConnectionProfile,
    database: String,
}

impl DriverConnectionFactory {
    pub fn new(driver: Arc<dyn DatabaseDriver>, profile: ConnectionProfile, database: String) -> Self {
        Self {
            driver,
            profile,
            database,
        }
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        self.driver.connect(&self.profile, &self.database).await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        if conn.is_closed() {
            return false;
        }
        match conn.query(self.driver.validation_query(), &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "pooled connection failed validation");
                false
            }
        }
    }
}

/// A pool handle that runs queries and statements.
///
/// Closed exactly once, either by the pool manager on teardown or by the
/// caller of a temporary executor.
pub struct PooledExecutor {
    key: PoolCacheKey,
    dialect: Dialect,
    driver: Arc<dyn DatabaseDriver>,
    pool: ConnectionPool,
    closed: AtomicBool,
}

impl PooledExecutor {
    /// Build the pool and prove it works with one warm-up checkout.
    ///
    /// Any failure closes the half-built pool and surfaces as
    /// `PoolCreationFailed` carrying the driver's message.
    pub async fn open(
        driver: Arc<dyn DatabaseDriver>,
        profile: &ConnectionProfile,
        database: &str,
        config: PoolConfig,
    ) -> Result<Self> {
        let key = PoolCacheKey::new(&profile.id, database);
        tracing::debug!(
            key = %key,
            url = %driver.build_url(profile, database),
            pool = %config.name(),
            max_size = config.max_size(),
            "opening pooled executor"
        );

        let factory = DriverConnectionFactory::new(driver.clone(), profile.clone(), database.to_string());
        let executor = Self {
            key,
            dialect: profile.dialect,
            driver,
            pool: ConnectionPool::new(config, factory),
            closed: AtomicBool::new(false),
        };

        if let Err(e) = executor.warm_up().await {
            executor.pool.close().await;
            return Err(NebulaError::PoolCreationFailed(e.detail()));
        }
        Ok(executor)
    }

    async fn warm_up(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.query(self.driver.validation_query(), &[]).await?;
        Ok(())
    }

    pub fn key(&self) -> &PoolCacheKey {
        &self.key
    }

    pub fn database(&self) -> &str {
        &self.key.database
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Positional bind marker for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        self.driver.placeholder(index)
    }

    pub fn validation_query(&self) -> &'static str {
        self.driver.validation_query()
    }

    /// Run a query and collect its rows
    pub async fn query_rows(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let conn = self.pool.get().await?;
        conn.query(sql, params).await
    }

    /// Run a statement and return the affected row count
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        let conn = self.pool.get().await?;
        Ok(conn.execute(sql, params).await?.affected_rows)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Close the underlying pool; later calls are no-ops
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        tracing::info!(key = %self.key, "pooled executor closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(NebulaError::Connection(format!("Executor {} is closed", self.key)));
        }
        Ok(())
    }
}

impl fmt::Debug for PooledExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledExecutor")
            .field("key", &self.key.to_string())
            .field("dialect", &self.dialect)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let key = PoolCacheKey::new("c1", "sales");
        assert_eq!(key.to_string(), "c1@sales");
        assert!(key.belongs_to("c1"));
        assert!(!key.belongs_to("c10"));
    }
}
