//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Inspect CHK keys and verify fetched data.
#[derive(Parser, Debug)]
#[command(name = "chk-tool")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true, env = "CHK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configuration file).
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<CliLogLevel>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Tool subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a routing key as a full key.
    Encode {
        /// Routing key (64 hex characters).
        routing_key: String,
        /// Crypto algorithm byte (defaults to the configured algorithm).
        #[arg(long, short)]
        algorithm: Option<u8>,
    },
    /// Extract the routing key from a full key or a legacy encoding.
    RoutingKey {
        /// Full key or routing key, in hex.
        key: String,
    },
    /// Print every supported digest of a file.
    Hash {
        /// Input file (stdin if omitted).
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
    /// Copy a file through a post-processing worker, verifying digests.
    Verify {
        /// Input file.
        #[arg(long, short)]
        input: PathBuf,
        /// Output file (stdout if omitted).
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Expected SHA-1 digest.
        #[arg(long)]
        sha1: Option<String>,
        /// Expected SHA-256 digest.
        #[arg(long)]
        sha256: Option<String>,
        /// Expected SHA-384 digest.
        #[arg(long)]
        sha384: Option<String>,
        /// Expected SHA-512 digest.
        #[arg(long)]
        sha512: Option<String>,
    },
}

/// Log level CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum CliLogLevel {
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Trace messages (verbose).
    Trace,
}

impl From<CliLogLevel> for String {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => "error".to_string(),
            CliLogLevel::Warn => "warn".to_string(),
            CliLogLevel::Info => "info".to_string(),
            CliLogLevel::Debug => "debug".to_string(),
            CliLogLevel::Trace => "trace".to_string(),
        }
    }
}
