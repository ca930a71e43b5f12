//! Connection pooling for database connections
//!
//! A `ConnectionPool` bounds the number of live connections for one
//! (connection profile, target database) pair. Connections are validated on
//! checkout and recycled once they exceed the idle timeout or max lifetime.
//!
//! # Example
//!
//! ```ignore
//! use nebula_connection::pool::ConnectionPool;
//! use nebula_core::PoolConfig;
//!
//! let config = PoolConfig::new(0, 5)?.with_acquire_timeout_ms(5000);
//! let pool = ConnectionPool::new(config, connection_factory);
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection returned to pool on drop
//! ```

mod pool;
mod stats;


pub use nebula_core::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use stats::PoolStats;
