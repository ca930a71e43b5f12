//! Nebula Drivers - the dialect provider set
//!
//! Feature-gated re-exports of the per-dialect driver crates plus the
//! `DriverRegistry` that maps a `Dialect` to its provider.

#[cfg(feature = "mssql")]
pub use nebula_driver_mssql as mssql;
#[cfg(feature = "mysql")]
pub use nebula_driver_mysql as mysql;
#[cfg(feature = "oracle")]
pub use nebula_driver_oracle as oracle;
#[cfg(feature = "postgres")]
pub use nebula_driver_postgres as postgres;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from nebula-core
pub use nebula_core::{
    Connection, DatabaseDriver, Dialect, NebulaError, QueryResult, Result, Row, StatementResult,
    Value,
};
