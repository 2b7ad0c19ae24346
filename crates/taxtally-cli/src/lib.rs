//! taxtally CLI library
//!
//! Summarises iNaturalist observations by taxonomic order (and optionally
//! family), or by observer, while staying polite to the public API.
//!
//! # Overview
//!
//! - **Rate limiting**: every outbound call goes through one [`rate_limit::RateLimiter`]
//!   whose spacing widens when the server throttles
//! - **Resilient fetching**: [`api::InatClient`] retries throttled and unreachable calls
//!   with capped exponential backoff
//! - **Resolution**: [`resolver::TaxonomyResolver`] walks the ancestry chain only as far
//!   as needed
//! - **Aggregation**: [`aggregator::BatchAggregator`] processes ids in paced batches and
//!   records the ids worth retrying

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod aggregator;
pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod failures;
pub mod input;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod summary;

// Re-export commonly used types
pub use aggregator::{BatchAggregator, RunReport};
pub use error::{CliError, Result};
pub use resolver::{ResolutionResult, TaxonomyResolver};

use clap::Parser;
use std::path::PathBuf;

/// taxtally - summarise iNaturalist observations by order, family or observer
#[derive(Parser, Debug)]
#[command(name = "taxtally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Observation ids to look up
    pub observation_ids: Vec<String>,

    /// Read observation ids from a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Also resolve and summarise taxonomic family
    #[arg(long)]
    pub family: bool,

    /// Summarise by observer instead of taxonomy
    #[arg(long, conflicts_with = "family")]
    pub users: bool,

    /// Print the total number of API calls made
    #[arg(long)]
    pub count_api_calls: bool,

    /// Minimum seconds between API calls
    #[arg(long, env = "TAXTALLY_DELAY", default_value_t = 1.0)]
    pub delay: f64,

    /// Ceiling in seconds the delay may grow to when throttled
    /// [default: the larger of --delay and 10]
    #[arg(long, env = "TAXTALLY_MAX_DELAY")]
    pub max_delay: Option<f64>,

    /// Attempts per call when throttled or unreachable (0 still tries once)
    #[arg(long, env = "TAXTALLY_RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Base backoff in seconds, doubled on each retry
    #[arg(long, default_value_t = 2.0)]
    pub retry_delay: f64,

    /// Upper bound in seconds for a single backoff sleep
    #[arg(long, default_value_t = 60.0)]
    pub max_backoff: f64,

    /// Factor the delay is multiplied by on each throttled response
    #[arg(long, default_value_t = 1.5)]
    pub throttle_factor: f64,

    /// Observations per batch
    #[arg(long, env = "TAXTALLY_BATCH_SIZE", default_value_t = config::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Seconds to pause between batches
    #[arg(long, env = "TAXTALLY_BATCH_PAUSE", default_value_t = 30.0)]
    pub batch_pause: f64,

    /// Directory for the failed observation ids file
    #[arg(long, default_value = ".")]
    pub failed_dir: PathBuf,

    /// API base URL
    #[arg(long, env = "TAXTALLY_API_URL")]
    pub api_url: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long)]
    pub debug: bool,
}
