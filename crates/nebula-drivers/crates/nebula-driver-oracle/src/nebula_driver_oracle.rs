//! Oracle provider for Nebula
//!
//! The `oracle` crate is synchronous and links against the Oracle client
//! libraries (ODPI-C loads them at runtime), so every call is moved onto
//! tokio's blocking pool.

mod connection;
mod driver;

pub use connection::OracleConnection;
pub use driver::OracleDriver;
