//! Error types for taxtally

use thiserror::Error;

/// Result type alias for taxtally operations
pub type Result<T> = std::result::Result<T, TaxtallyError>;

/// Main error type for taxtally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxtallyError {
    #[error("Invalid observation id '{0}': ids must be non-empty and contain no whitespace or '/'")]
    InvalidObservationId(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TaxtallyError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
