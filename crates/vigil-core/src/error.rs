//! Error types for Vigil

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Vigil
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error (bad registry source, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registry document parsed but produced zero valid providers
    #[error("Registry source contains no valid providers")]
    EmptyRegistry,

    /// A single provider entry failed schema validation
    #[error("Invalid provider entry '{id}': {message}")]
    InvalidProvider {
        /// Provider id (or map key) of the offending entry
        id: String,
        /// What failed
        message: String,
    },

    /// Provider id not present in the registry
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Shared state store error (Redis unreachable, serialization in store)
    #[error("State store error: {0}")]
    Store(String),

    /// The shared store is unreachable; surfaced on the process health endpoint
    #[error("State store unreachable: {0}")]
    StoreUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::EmptyRegistry | Error::InvalidProvider { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create an invalid-provider error
    pub fn invalid_provider(id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidProvider {
            id: id.into(),
            message: message.into(),
        }
    }
}
