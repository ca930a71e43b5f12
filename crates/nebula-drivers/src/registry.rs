//! Driver registry mapping each dialect to its provider

use nebula_core::{DatabaseDriver, Dialect, NebulaError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers.
///
/// Built once at startup and read-only afterwards; one provider per dialect.
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<Dialect, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all compiled-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlDriver::new()));
        #[cfg(feature = "mssql")]
        registry.register(Arc::new(crate::mssql::MssqlDriver::new()));
        #[cfg(feature = "oracle")]
        registry.register(Arc::new(crate::oracle::OracleDriver::new()));

        registry
    }

    /// Register a driver, replacing any previous provider for its dialect
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let dialect = driver.dialect();
        tracing::info!(driver = %driver.name(), dialect = %dialect, "registering database driver");
        self.drivers.insert(dialect, driver);
    }

    /// Get the driver for a dialect
    pub fn get(&self, dialect: Dialect) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&dialect).cloned();
        if driver.is_none() {
            tracing::warn!(dialect = %dialect, "driver not found in registry");
        }
        driver
    }

    /// Get the driver for a dialect or fail with `UnsupportedDialect`
    pub fn require(&self, dialect: Dialect) -> Result<Arc<dyn DatabaseDriver>> {
        self.get(dialect)
            .ok_or_else(|| NebulaError::UnsupportedDialect(dialect.as_str().to_string()))
    }

    /// List registered dialects in declaration order
    pub fn list(&self) -> Vec<Dialect> {
        Dialect::ALL
            .iter()
            .copied()
            .filter(|d| self.drivers.contains_key(d))
            .collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, dialect: Dialect) -> bool {
        self.drivers.contains_key(&dialect)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
