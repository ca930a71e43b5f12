//! MySQL/MariaDB provider for Nebula

mod connection;
mod driver;

pub use connection::MySqlConnection;
pub use driver::MySqlDriver;
