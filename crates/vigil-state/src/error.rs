//! Error types for state backends

/// Result type for state operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for state operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend connection error
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Backend(err.to_string())
    }
}