//! Batch driver for a full run
//!
//! Ids are processed strictly one at a time, in batches separated by a
//! pause. Each outcome is printed as soon as it is known and folded into
//! the run's counters. One observation failing never stops the run: it is
//! counted as unknown and, when a later retry could help, queued for the
//! failed-ids file.

use crate::api::InatClient;
use crate::config::{Config, LookupMode, RunOptions};
use crate::error::{ResolveError, Result};
use crate::failures::write_failed_ids;
use crate::rate_limit::RateLimiter;
use crate::resolver::{ResolutionResult, TaxonomyResolver, UserResult};
use crate::summary::{Summary, SummaryCounters, UserSummary};
use futures::FutureExt;
use std::any::Any;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use taxtally_common::ObservationId;
use tracing::{debug, error, info, warn};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: Summary,
    /// Observations handed to the resolver
    pub dispatched: u64,
    /// Ids worth retrying in a later run
    pub failed_ids: Vec<ObservationId>,
    /// Where `failed_ids` were written, if anywhere
    pub failed_file: Option<PathBuf>,
    /// Outbound API requests, retries included
    pub api_calls: u64,
}

/// Running totals for one call to [`BatchAggregator::run`]
struct Tallies {
    counters: SummaryCounters,
    users: UserSummary,
    failed_ids: Vec<ObservationId>,
    dispatched: u64,
}

impl Tallies {
    fn new(include_family: bool) -> Self {
        Self {
            counters: SummaryCounters::new(include_family),
            users: UserSummary::default(),
            failed_ids: Vec::new(),
            dispatched: 0,
        }
    }
}

/// Drives lookups over a list of observation ids
pub struct BatchAggregator {
    client: InatClient,
    options: RunOptions,
}

impl BatchAggregator {
    /// Build the aggregator and the rate limiter it owns for the run.
    pub fn new(config: &Config, options: RunOptions) -> Result<Self> {
        options.validate()?;

        let limiter = RateLimiter::new(options.min_delay, options.max_min_delay);
        let client = InatClient::new(config, options.retry.clone(), limiter)?;

        Ok(Self { client, options })
    }

    pub fn client(&self) -> &InatClient {
        &self.client
    }

    /// Process every id, writing one line per observation to `out`.
    ///
    /// Ids queued for retry are persisted even when the run stops early
    /// because `out` could not be written.
    pub async fn run<W: Write>(&mut self, ids: &[ObservationId], out: &mut W) -> Result<RunReport> {
        let mut tallies = Tallies::new(self.options.include_family());
        let outcome = self.process(ids, out, &mut tallies).await;

        if let Err(e) = &outcome {
            error!(
                error = %e,
                processed = tallies.dispatched,
                total = ids.len(),
                "Run stopped early, saving ids queued for retry"
            );
        }
        let failed_file = write_failed_ids(&self.options.failed_dir, &tallies.failed_ids, chrono::Local::now())?;
        outcome?;

        let summary = match self.options.mode {
            LookupMode::Taxonomy { .. } => Summary::Taxonomy(tallies.counters),
            LookupMode::Users => Summary::Users(tallies.users),
        };

        Ok(RunReport {
            summary,
            dispatched: tallies.dispatched,
            failed_ids: tallies.failed_ids,
            failed_file,
            api_calls: self.client.call_count(),
        })
    }

    async fn process<W: Write>(&mut self, ids: &[ObservationId], out: &mut W, tallies: &mut Tallies) -> Result<()> {
        let batch_size = self.options.batch_size;
        let batch_count = ids.len().div_ceil(batch_size);

        for (index, batch) in ids.chunks(batch_size).enumerate() {
            if index > 0 && !self.options.batch_pause.is_zero() {
                info!(
                    batch = index + 1,
                    batches = batch_count,
                    pause_secs = self.options.batch_pause.as_secs_f64(),
                    "Pausing between batches"
                );
                tokio::time::sleep(self.options.batch_pause).await;
            }
            debug!(batch = index + 1, batches = batch_count, size = batch.len(), "Starting batch");

            for id in batch {
                tallies.dispatched += 1;

                let (line, error) = match self.options.mode {
                    LookupMode::Taxonomy { include_family } => {
                        let result = self.resolve_taxonomy(id, include_family).await;
                        tallies.counters.record(&result);
                        (taxonomy_line(id, &result, include_family), result.error)
                    },
                    LookupMode::Users => {
                        let result = self.resolve_user(id).await;
                        let line = user_line(id, &result);
                        match result {
                            Ok(user) => {
                                tallies.users.record(&user);
                                (line, None)
                            },
                            Err(e) => {
                                tallies.users.record_error();
                                (line, Some(e))
                            },
                        }
                    },
                };

                if let Some(e) = error.filter(|e| e.kind().is_retryable()) {
                    warn!(observation_id = %id, error = %e, "Observation failed, queued for retry");
                    tallies.failed_ids.push(id.clone());
                }

                writeln!(out, "{}", line)?;
            }
        }

        Ok(())
    }

    async fn resolve_taxonomy(&mut self, id: &ObservationId, include_family: bool) -> ResolutionResult {
        let mut resolver = TaxonomyResolver::new(&mut self.client);
        match AssertUnwindSafe(resolver.resolve(id, include_family)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => ResolutionResult::failed(unexpected(id, panic)),
        }
    }

    async fn resolve_user(&mut self, id: &ObservationId) -> std::result::Result<UserResult, ResolveError> {
        let mut resolver = TaxonomyResolver::new(&mut self.client);
        match AssertUnwindSafe(resolver.resolve_user(id)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(unexpected(id, panic)),
        }
    }
}

fn unexpected(id: &ObservationId, panic: Box<dyn Any + Send>) -> ResolveError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(observation_id = %id, error = %message, "Unexpected failure while resolving observation");
    ResolveError::Unexpected(message)
}

/// Output line for one taxonomy result.
pub fn taxonomy_line(id: &ObservationId, result: &ResolutionResult, include_family: bool) -> String {
    if let Some(error) = &result.error {
        return match (&result.observed_rank, &result.observed_rank_name) {
            (Some(rank), Some(name)) => format!("{}: {}: {}", id, rank.display_name(), name),
            _ => format!("{}: Error - {}", id, error),
        };
    }

    let order = result.order_name.as_deref().unwrap_or("Unknown");
    if include_family {
        let family = result.family_name.as_deref().unwrap_or("Unknown");
        format!("{}: Order: {} Family: {}", id, order, family)
    } else {
        format!("{}: {}", id, order)
    }
}

/// Output line for one user lookup.
pub fn user_line(id: &ObservationId, result: &std::result::Result<UserResult, ResolveError>) -> String {
    match result {
        Ok(user) => format!("{}: {}: {}", id, user.display_name(), user.login),
        Err(e) => format!("{}: Error - {}", id, e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use taxtally_common::Rank;

    fn id() -> ObservationId {
        ObservationId::from(42u64)
    }

    #[test]
    fn test_line_for_error_with_observed_rank() {
        let result = ResolutionResult {
            order_name: None,
            family_name: None,
            error: Some(ResolveError::OrderNotFound),
            observed_rank: Some(Rank::Species),
            observed_rank_name: Some("Fomes fomentarius".to_string()),
        };
        assert_eq!(taxonomy_line(&id(), &result, false), "42: Species: Fomes fomentarius");
    }

    #[test]
    fn test_line_for_bare_error() {
        let result = ResolutionResult::failed(ResolveError::NoResults);
        assert_eq!(taxonomy_line(&id(), &result, true), "42: Error - No results found");
    }

    #[test]
    fn test_lines_for_success() {
        let result = ResolutionResult {
            order_name: Some("Agaricales".to_string()),
            family_name: None,
            error: None,
            observed_rank: Some(Rank::Order),
            observed_rank_name: Some("Agaricales".to_string()),
        };
        assert_eq!(taxonomy_line(&id(), &result, false), "42: Agaricales");
        assert_eq!(
            taxonomy_line(&id(), &result, true),
            "42: Order: Agaricales Family: Unknown"
        );
    }

    #[test]
    fn test_user_lines() {
        let user = UserResult {
            login: "ada".to_string(),
            name: Some("Ada Fungi".to_string()),
        };
        assert_eq!(user_line(&id(), &Ok(user)), "42: Ada Fungi: ada");
        assert_eq!(
            user_line(&id(), &Err(ResolveError::NoUserInfo)),
            "42: Error - No user information available"
        );
    }

    #[test]
    fn test_panic_payloads_become_unexpected_errors() {
        let err = unexpected(&id(), Box::new("index out of bounds"));
        assert_eq!(err, ResolveError::Unexpected("index out of bounds".to_string()));
        assert_eq!(err.kind(), crate::error::ErrorKind::UnexpectedError);
        assert!(err.kind().is_retryable());

        let err = unexpected(&id(), Box::new(format!("bad taxon {}", 7)));
        assert_eq!(err, ResolveError::Unexpected("bad taxon 7".to_string()));

        let err = unexpected(&id(), Box::new(42u8));
        assert_eq!(err, ResolveError::Unexpected("unknown panic".to_string()));
    }

    #[tokio::test]
    async fn test_panicking_resolution_is_caught() {
        let outcome = AssertUnwindSafe(async {
            panic!("ancestry walk exploded");
        })
        .catch_unwind()
        .await;

        let err = unexpected(&id(), outcome.unwrap_err());
        assert_eq!(err.to_string(), "Unexpected error: ancestry walk exploded");
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let options = RunOptions {
            batch_size: 0,
            ..RunOptions::default()
        };
        assert!(BatchAggregator::new(&Config::default(), options).is_err());
    }
}
