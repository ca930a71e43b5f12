//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{NebulaError, Result};

/// Configuration for a connection pool
///
/// Produced per dialect by `DatabaseDriver::configure_pool`. Values are
/// conservative because many short-lived pools may coexist, one per
/// (connection, target database) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool name used in logs, `nebula-{connection}@{database}`
    name: String,
    /// Idle connections kept warm
    min_idle: usize,
    /// Maximum number of connections allowed in the pool
    max_size: usize,
    /// Timeout in milliseconds when opening or checking out a connection
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds before it's recycled
    max_lifetime_ms: Option<u64>,
}

impl PoolConfig {
    /// Create a new pool configuration with the given bounds
    pub fn new(min_idle: usize, max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(NebulaError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if min_idle > max_size {
            return Err(NebulaError::Configuration(format!(
                "min_idle ({}) cannot exceed max_size ({})",
                min_idle, max_size
            )));
        }

        Ok(Self {
            name: "nebula".to_string(),
            min_idle,
            max_size,
            acquire_timeout_ms: 10_000,
            idle_timeout_ms: 300_000,
            max_lifetime_ms: Some(1_800_000),
        })
    }

    /// The base configuration every dialect starts from
    pub fn conservative(connection_id: &str, database: &str) -> Self {
        Self {
            name: format!("nebula-{}@{}", connection_id, database),
            min_idle: 0,
            max_size: 5,
            acquire_timeout_ms: 10_000,
            idle_timeout_ms: 300_000,
            max_lifetime_ms: Some(1_800_000),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum size, ignoring zero
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        if max_size > 0 {
            self.max_size = max_size;
            self.min_idle = self.min_idle.min(max_size);
        }
        self
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum connection lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_idle(&self) -> usize {
        self.min_idle
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::conservative("default", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_creation() {
        let config = PoolConfig::new(2, 10).unwrap();
        assert_eq!(config.min_idle(), 2);
        assert_eq!(config.max_size(), 10);
        assert_eq!(config.acquire_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.idle_timeout(), Duration::from_millis(300_000));
        assert_eq!(config.max_lifetime(), Some(Duration::from_millis(1_800_000)));
    }

    #[test]
    fn test_pool_config_rejects_invalid_bounds() {
        let err = PoolConfig::new(0, 0).unwrap_err();
        assert!(err.to_string().contains("max_size must be greater than 0"));

        let err = PoolConfig::new(10, 5).unwrap_err();
        assert!(err.to_string().contains("min_idle (10) cannot exceed max_size (5)"));
    }

    #[test]
    fn test_conservative_defaults() {
        let config = PoolConfig::conservative("c1", "sales");
        assert_eq!(config.name(), "nebula-c1@sales");
        assert_eq!(config.min_idle(), 0);
        assert_eq!(config.max_size(), 5);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_with_max_size_keeps_min_idle_in_bounds() {
        let config = PoolConfig::new(3, 5).unwrap().with_max_size(2);
        assert_eq!(config.max_size(), 2);
        assert_eq!(config.min_idle(), 2);
        assert_eq!(config.clone().with_max_size(0), config);
    }

    #[test]
    fn test_pool_config_serialization() {
        let config = PoolConfig::new(1, 4)
            .unwrap()
            .with_acquire_timeout_ms(5000)
            .with_max_lifetime_ms(3_600_000);
        let json = serde_json::to_string(&config).expect("serialize");
        let deserialized: PoolConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deserialized, config);
    }
}
