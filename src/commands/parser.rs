//! Command-line argument parsing
//!
//! clap derive definitions for the `jobwarden` binary.

use crate::error::{JobError, JobResult};
use crate::wait::WaitTimeout;
use clap::{Parser, Subcommand};
use std::ffi::OsString;

#[derive(Parser, Debug)]
#[command(name = "jobwarden", version, about = "Run jobs through pluggable execution backends")]
pub struct Cli {
    /// Log filter directive (overrides JOBWARDEN_LOG and RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run one job through the backend serving URL and wait for it
    Run {
        /// Service URL, e.g. fork://localhost
        #[arg(value_name = "URL")]
        url: String,

        /// Environment variables (KEY=VALUE, repeatable)
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env_vars: Vec<String>,

        /// Seconds to wait; -1 waits forever. The job is canceled when the wait runs out.
        #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
        timeout: f64,

        /// Executable followed by its arguments
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// List loaded backends, their schemes and load diagnostics
    Backends {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse_args_from(std::env::args_os())
    }

    /// Parse a custom argv (for tests)
    pub fn try_parse_args_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }

    /// Parse a custom argv; clap prints the error and exits on failure
    pub fn parse_args_from<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_args_from(iter) {
            Ok(cli) => cli,
            Err(err) => err.exit(),
        }
    }
}

/// Split `KEY=VALUE` pairs; the value may itself contain `=`
pub fn parse_env_pairs(pairs: &[String]) -> JobResult<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(JobError::bad_parameter(format!(
                "invalid environment variable '{}': expected KEY=VALUE",
                pair
            ))),
        })
        .collect()
}

pub fn parse_timeout(seconds: f64) -> JobResult<WaitTimeout> {
    WaitTimeout::from_secs_f64(seconds)
}
