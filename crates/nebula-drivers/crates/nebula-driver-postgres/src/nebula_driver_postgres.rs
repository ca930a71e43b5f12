//! PostgreSQL provider for Nebula

mod connection;
mod driver;
mod tls;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use tls::{PostgresSslMode, build_tls_connector};
