//! Error types for the taxtally CLI
//!
//! Three layers, each with its own enum:
//!
//! - [`CliError`]: fatal setup and I/O failures that end the run
//! - [`FetchError`]: a single logical API call that failed for good
//! - [`ResolveError`]: why one observation could not be fully resolved
//!
//! Per-observation failures never become a [`CliError`]; they are reported
//! inline and counted as unknown.

use taxtally_common::TaxtallyError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Fatal errors for a taxtally run
#[derive(Error, Debug)]
pub enum CliError {
    /// No observation ids were supplied on the command line or in the file
    #[error("No observation ids provided: {0}. Pass ids as arguments or use --file.")]
    NoObservations(String),

    /// The observation id file could not be read
    #[error("Could not read observation ids from '{path}': {source}. Verify the file path exists and you have read permissions.")]
    InputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Options are missing or invalid
    #[error("Configuration error: {0}. Check your command line options and environment variables.")]
    Config(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] TaxtallyError),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Classification of everything that can go wrong for one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoResults,
    NoTaxonInfo,
    NoAncestryInfo,
    OrderNotFound,
    RateLimited,
    ConnectionFailed,
    RequestFailed,
    UnexpectedError,
}

impl ErrorKind {
    /// Whether an observation failing with this kind is worth retrying in a
    /// later run. Data outcomes are stable; transport outcomes are not.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::ConnectionFailed
                | ErrorKind::RequestFailed
                | ErrorKind::UnexpectedError
        )
    }
}

/// Terminal failure of one API call after the retry policy gave up
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Still throttled (HTTP 429) after every attempt
    #[error("rate limited by the API after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    /// Transport-level failure on every attempt
    #[error("connection failed after {attempts} attempt(s): {message}")]
    ConnectionFailed { attempts: u32, message: String },

    /// Non-retryable HTTP status or a body that is not the expected JSON
    #[error("{0}")]
    RequestFailed(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            FetchError::RequestFailed(_) => ErrorKind::RequestFailed,
        }
    }
}

/// Why an observation did not resolve to an order (or user)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No results found")]
    NoResults,

    #[error("No taxonomic information available")]
    NoTaxonInfo,

    #[error("No ancestry information available")]
    NoAncestryInfo,

    #[error("Could not find order in ancestry chain")]
    OrderNotFound,

    #[error("No user information available")]
    NoUserInfo,

    #[error("User information incomplete")]
    UserIncomplete,

    #[error("API request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::NoResults => ErrorKind::NoResults,
            ResolveError::NoTaxonInfo | ResolveError::NoUserInfo | ResolveError::UserIncomplete => {
                ErrorKind::NoTaxonInfo
            }
            ResolveError::NoAncestryInfo => ErrorKind::NoAncestryInfo,
            ResolveError::OrderNotFound => ErrorKind::OrderNotFound,
            ResolveError::Fetch(e) => e.kind(),
            ResolveError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }
}
