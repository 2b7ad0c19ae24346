//! taxtally Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the taxtally workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`TaxtallyError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: observation identifiers and taxonomic ranks
//!
//! # Example
//!
//! ```no_run
//! use taxtally_common::{ObservationId, Rank, Result};
//!
//! fn parse(raw: &str) -> Result<ObservationId> {
//!     let id: ObservationId = raw.parse()?;
//!     assert_eq!(Rank::from("order"), Rank::Order);
//!     Ok(id)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TaxtallyError};
pub use types::{ObservationId, Rank};
