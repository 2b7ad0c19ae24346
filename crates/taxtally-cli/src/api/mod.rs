//! iNaturalist API access
//!
//! Typed response models, endpoint URL builders, and the rate-limited,
//! retrying HTTP client.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::InatClient;
pub use types::*;
