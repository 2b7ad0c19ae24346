//! `taxtally` command implementation
//!
//! Looks up every requested observation, printing one line per id as it
//! resolves, then the run summary.

use crate::aggregator::BatchAggregator;
use crate::config::{seconds, Config, LookupMode, RunOptions, DEFAULT_MAX_DELAY};
use crate::error::Result;
use crate::input::collect_ids;
use crate::retry::RetryPolicy;
use crate::Cli;
use colored::Colorize;
use std::io::Write;
use tracing::{debug, info};

/// Build run options from command-line flags.
pub fn run_options(cli: &Cli) -> Result<RunOptions> {
    let mode = if cli.users {
        LookupMode::Users
    } else {
        LookupMode::Taxonomy {
            include_family: cli.family,
        }
    };

    let min_delay = seconds("--delay", cli.delay)?;
    let max_min_delay = match cli.max_delay {
        Some(max_delay) => seconds("--max-delay", max_delay)?,
        None => min_delay.max(DEFAULT_MAX_DELAY),
    };

    let options = RunOptions {
        min_delay,
        max_min_delay,
        retry: RetryPolicy {
            retries: cli.retries,
            retry_delay: seconds("--retry-delay", cli.retry_delay)?,
            max_backoff: seconds("--max-backoff", cli.max_backoff)?,
            throttle_factor: cli.throttle_factor,
        },
        batch_size: cli.batch_size,
        batch_pause: seconds("--batch-pause", cli.batch_pause)?,
        mode,
        count_api_calls: cli.count_api_calls,
        failed_dir: cli.failed_dir.clone(),
    };
    options.validate()?;

    Ok(options)
}

/// Run a full lookup for the ids given on the command line or in `--file`.
pub async fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url.clone());
    }

    let options = run_options(cli)?;
    let count_api_calls = options.count_api_calls;
    let ids = collect_ids(cli.file.as_deref(), &cli.observation_ids)?;

    info!(
        observations = ids.len(),
        api_url = %config.api_url,
        mode = ?options.mode,
        "Starting run"
    );

    let mut aggregator = BatchAggregator::new(&config, options)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = aggregator.run(&ids, &mut out).await?;

    debug!(
        dispatched = report.dispatched,
        counted = report.summary.total(),
        api_calls = report.api_calls,
        "Run finished"
    );

    if count_api_calls {
        writeln!(out, "\n{} {}", "Total API calls made:".bold(), report.api_calls)?;
    }

    if ids.len() > 1 {
        writeln!(out)?;
        write!(out, "{}", report.summary.render())?;
    }

    if let Some(path) = &report.failed_file {
        writeln!(
            out,
            "\n{} {} ({} ids)",
            "Failed observation ids written to".yellow(),
            path.display(),
            report.failed_ids.len()
        )?;
    }
    out.flush()?;

    Ok(())
}
