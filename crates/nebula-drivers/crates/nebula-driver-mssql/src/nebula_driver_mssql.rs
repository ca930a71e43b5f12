//! MS SQL Server provider for Nebula
//!
//! Uses tiberius over a plain tokio `TcpStream`. Encryption is always
//! requested; set the `trust_cert` profile param for self-signed servers.

mod connection;
mod driver;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod driver_tests;

pub use connection::{MssqlConnection, MssqlConnectionError};
pub use driver::MssqlDriver;
