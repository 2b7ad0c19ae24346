//! taxtally - main entry point

use clap::Parser;
use colored::Colorize;
use std::process;
use taxtally_cli::Cli;
use taxtally_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up TAXTALLY_* settings from a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.debug { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("taxtally".to_string())
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("{} ignoring TAXTALLY_LOG_* settings: {}", "Warning:".yellow().bold(), e);
            log_config
        },
    };

    // The CLI works without logging; keep the guard alive for file output
    let _guard = init_logging(&log_config).ok().flatten();

    if let Err(e) = taxtally_cli::commands::tally::run(&cli).await {
        error!(error = %e, "Run failed");
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
