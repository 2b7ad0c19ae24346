//! Configuration management for the taxtally CLI
//!
//! Client settings (API base URL, user agent, transport timeout) come from
//! the environment with sensible defaults; run settings come from the
//! command line and are validated into [`RunOptions`].

use crate::error::{CliError, Result};
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Client Configuration Constants
// ============================================================================

/// Public iNaturalist API.
pub const DEFAULT_API_URL: &str = "https://api.inaturalist.org";

/// Transport timeout for a single request.
/// Can be overridden via TAXTALLY_API_TIMEOUT_SECS.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Default ceiling for adaptive slowdown, raised to `--delay` when that is
/// longer.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Observations per batch before the inter-batch pause.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Identifies the tool to the API operators.
pub fn default_user_agent() -> String {
    format!(
        "taxtally/{} (observation taxonomy summaries; {})",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_REPOSITORY")
    )
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL, without a trailing slash
    pub api_url: String,

    /// Value of the User-Agent header
    pub user_agent: String,

    /// Per-request transport timeout
    pub timeout: Duration,
}

impl Config {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }

    /// Load config from environment variables
    ///
    /// - `TAXTALLY_API_URL`: API base URL
    /// - `TAXTALLY_API_TIMEOUT_SECS`: transport timeout in seconds
    /// - `TAXTALLY_USER_AGENT`: override the User-Agent header
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("TAXTALLY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut config = Self::new(api_url);

        if let Ok(raw) = std::env::var("TAXTALLY_API_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                CliError::config(format!("TAXTALLY_API_TIMEOUT_SECS must be a whole number, got '{}'", raw))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(agent) = std::env::var("TAXTALLY_USER_AGENT") {
            config.user_agent = agent;
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// What each observation is looked up for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Taxonomic order, optionally with family
    Taxonomy { include_family: bool },
    /// Observer display name and login
    Users,
}

/// Settings for one aggregation run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Minimum spacing between outbound calls at the start of the run
    pub min_delay: Duration,

    /// Ceiling the spacing may grow to under sustained throttling
    pub max_min_delay: Duration,

    /// Retry and backoff behaviour for each call
    pub retry: RetryPolicy,

    /// Observations per batch
    pub batch_size: usize,

    /// Sleep between batches (never before the first)
    pub batch_pause: Duration,

    pub mode: LookupMode,

    /// Print the total number of API calls at the end
    pub count_api_calls: bool,

    /// Where the failed-id file is written
    pub failed_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_min_delay: DEFAULT_MAX_DELAY,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::from_secs(30),
            mode: LookupMode::Taxonomy {
                include_family: false,
            },
            count_api_calls: false,
            failed_dir: PathBuf::from("."),
        }
    }
}

impl RunOptions {
    pub fn include_family(&self) -> bool {
        matches!(self.mode, LookupMode::Taxonomy { include_family: true })
    }

    /// Reject option combinations the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CliError::config("batch size must be at least 1"));
        }
        if self.max_min_delay < self.min_delay {
            return Err(CliError::config(format!(
                "maximum delay ({:.2}s) must not be below the minimum delay ({:.2}s)",
                self.max_min_delay.as_secs_f64(),
                self.min_delay.as_secs_f64()
            )));
        }
        self.retry.validate()
    }
}

/// Convert a user-supplied number of seconds into a [`Duration`].
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| CliError::config(format!("{} must be a non-negative number of seconds, got {}", name, value)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = Config::new("http://localhost:8080/");
        assert_eq!(config.api_url, "http://localhost:8080");
        assert!(config.user_agent.starts_with("taxtally/"));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("TAXTALLY_API_URL", "http://example.test");
        std::env::set_var("TAXTALLY_API_TIMEOUT_SECS", "5");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_url, "http://example.test");
        assert_eq!(config.timeout, Duration::from_secs(5));

        std::env::remove_var("TAXTALLY_API_URL");
        std::env::remove_var("TAXTALLY_API_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_config_from_env_rejects_bad_timeout() {
        std::env::set_var("TAXTALLY_API_TIMEOUT_SECS", "soon");
        assert!(matches!(Config::from_env(), Err(CliError::Config(_))));
        std::env::remove_var("TAXTALLY_API_TIMEOUT_SECS");
    }

    #[test]
    fn test_run_options_validation() {
        assert!(RunOptions::default().validate().is_ok());

        let options = RunOptions {
            batch_size: 0,
            ..RunOptions::default()
        };
        assert!(options.validate().is_err());

        let options = RunOptions {
            min_delay: Duration::from_secs(5),
            max_min_delay: Duration::from_secs(2),
            ..RunOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_seconds_rejects_negative_and_nan() {
        assert_eq!(seconds("delay", 1.5).unwrap(), Duration::from_millis(1500));
        assert!(seconds("delay", -1.0).is_err());
        assert!(seconds("delay", f64::NAN).is_err());
    }

    #[test]
    fn test_include_family() {
        let mut options = RunOptions::default();
        assert!(!options.include_family());
        options.mode = LookupMode::Taxonomy {
            include_family: true,
        };
        assert!(options.include_family());
        options.mode = LookupMode::Users;
        assert!(!options.include_family());
    }
}
