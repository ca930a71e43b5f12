//! Nebula Connection - pooling and the pool manager
//!
//! Owns the only process-wide mutable state besides the template registry:
//! the cache of pooled executors, one per (connection, target database).

mod executor;
mod manager;
pub mod pool;

pub use executor::{DriverConnectionFactory, PoolCacheKey, PooledExecutor};
pub use manager::PoolManager;
pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
