//! CLI command implementations
//!
//! The binary has a single command; `tally::run` drives a full run.

pub mod tally;
