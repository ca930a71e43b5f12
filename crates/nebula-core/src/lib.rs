//! Nebula Core - Core abstractions shared by the pool and tree layers
//!
//! This crate provides the fundamental traits and types that all other
//! Nebula crates depend on. It defines:
//!
//! - `DatabaseDriver` - Per-dialect provider (URL, pool config, validation, connect)
//! - `Connection` - Trait for database connections
//! - `ProfileStore` - Read access to stored connection profiles
//! - Common types like `Value`, `Row`, `QueryResult`, `Dialect`

mod connection;
mod dialect;
mod driver;
mod error;
mod pool_config;
mod profile;
mod types;

pub use connection::*;
pub use dialect::*;
pub use driver::*;
pub use error::*;
pub use pool_config::*;
pub use profile::*;
pub use types::*;
