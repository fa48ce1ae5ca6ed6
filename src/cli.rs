//! CLI argument parsing module
//!
//! Handles command-line interface using clap, including:
//! - Debug logging switch
//! - Insecure TLS mode for consoles with self-signed certificates
//! - Output and log file locations
//! - Search poll ceiling override
//! - Help and version commands

use crate::constants::{DEFAULT_LOG_FILE, DEFAULT_REPORT_FILE, DEFAULT_SEARCH_TIMEOUT_SECS};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};

// clap wants a &'static str default; keep in lockstep with
// DEFAULT_SEARCH_TIMEOUT_SECS
const DEFAULT_SEARCH_TIMEOUT_STR: &str = "300";

/// Run configuration collected from the command line
pub struct RunConfig {
    pub debug: bool,
    pub insecure: bool,
    pub report_file: String,
    pub log_file: String,
    pub search_timeout_secs: u64,
}

/// Parse command line arguments and return configuration
pub fn parse_args() -> Result<RunConfig> {
    let matches = Command::new("countMVS")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Count distinct Managed Virtual Servers in a deployment")
        .long_about(
            "Calculates an estimated count of the MVS (Managed Virtual Servers) for the \
             deployment from its log source data, with a per-domain breakdown on \
             multi-domain deployments, and writes a CSV report of the result.",
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("insecure")
                .short('i')
                .long("insecure")
                .help("Skip TLS certificate verification for API calls")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .value_name("FILENAME")
                .help("File to write the CSV report to")
                .default_value(DEFAULT_REPORT_FILE),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .value_name("FILENAME")
                .help("File to write log output to")
                .default_value(DEFAULT_LOG_FILE),
        )
        .arg(
            Arg::new("search-timeout")
                .long("search-timeout")
                .value_name("SECONDS")
                .help("Maximum time to wait for an Ariel search to complete")
                .default_value(DEFAULT_SEARCH_TIMEOUT_STR),
        )
        .get_matches();

    let search_timeout_secs = matches
        .get_one::<String>("search-timeout")
        .map(|value| value.parse::<u64>())
        .transpose()
        .map_err(|_| anyhow!("--search-timeout must be a number of seconds"))?
        .unwrap_or(DEFAULT_SEARCH_TIMEOUT_SECS);
    if search_timeout_secs == 0 {
        return Err(anyhow!("--search-timeout must be greater than zero"));
    }

    Ok(RunConfig {
        debug: matches.get_flag("debug"),
        insecure: matches.get_flag("insecure"),
        report_file: matches
            .get_one::<String>("output")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REPORT_FILE.to_string()),
        log_file: matches
            .get_one::<String>("log")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        search_timeout_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_string_matches_the_constant() {
        assert_eq!(
            DEFAULT_SEARCH_TIMEOUT_STR.parse::<u64>().unwrap(),
            DEFAULT_SEARCH_TIMEOUT_SECS
        );
    }
}
