//! Error types for Nebula

use thiserror::Error;

/// Core error type for Nebula operations
#[derive(Error, Debug)]
pub enum NebulaError {
    /// The connection id is unknown to the profile store
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// No provider or template is registered for the profile's dialect
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// A resolver query failed on the database side
    #[error("{message}")]
    QueryExecutionFailed { resolver: String, message: String },

    /// Network or authentication failure while establishing a pool
    #[error("Connection failed: {0}")]
    PoolCreationFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl NebulaError {
    /// Whether an HTTP layer should report this as a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NebulaError::ConnectionNotFound(_) | NebulaError::NotFound(_)
        )
    }

    /// Whether this is a caller-side configuration problem rather than a
    /// database failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NebulaError::UnsupportedDialect(_)
                | NebulaError::Configuration(_)
                | NebulaError::Template(_)
        )
    }

    /// Whether a listing call should recover this into an error node
    pub fn is_recoverable_in_listing(&self) -> bool {
        matches!(
            self,
            NebulaError::QueryExecutionFailed { .. }
                | NebulaError::PoolCreationFailed(_)
                | NebulaError::Timeout(_)
        )
    }

    /// Human-readable cause, without the category prefix of the wrapper variant
    pub fn detail(&self) -> String {
        match self {
            NebulaError::Connection(msg)
            | NebulaError::Driver(msg)
            | NebulaError::Query(msg)
            | NebulaError::Timeout(msg)
            | NebulaError::PoolCreationFailed(msg) => msg.clone(),
            NebulaError::QueryExecutionFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for Nebula operations
pub type Result<T> = std::result::Result<T, NebulaError>;
