//! Command-line interface for tapbump.
//!
//! # Commands
//!
//! - `update` - bring the cask and formula up to the latest early-access build
//! - `check` - report the latest build and the versions on disk, without writing
//! - `verify` - run the syntax check against the manifests as they are
//!
//! # Global Options
//!
//! - `--repo <DIR>` - tap root (default: current directory)
//! - `--config <FILE>` - configuration file (default: `<repo>/tapbump.toml`,
//!   or `TAPBUMP_CONFIG`)
//! - `--verbose` - debug logging on stderr
//! - `--quiet` - errors only; no progress on stdout
//!
//! # Example
//!
//! ```bash
//! # Scheduled CI job
//! tapbump update --open-pr
//!
//! # What would change?
//! tapbump update --dry-run
//! tapbump check --format json
//! ```
//!
//! Progress goes to stdout, log records and errors to stderr. Every command
//! exits 0 on success (including "already at latest version") and 1 on any
//! failure.

mod check;
mod update;
mod verify;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::TapConfig;
use crate::fetch::HttpFetcher;
use crate::pipeline::Pipeline;
use crate::verify::{CommandChecker, Verifier};

pub use check::{CheckCommand, OutputFormat};
pub use update::UpdateCommand;
pub use verify::VerifyCommand;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Suppress progress output on stdout.
    pub quiet: bool,
}

impl CliConfig {
    /// Install the global tracing subscriber. `RUST_LOG` takes precedence.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "tapbump",
    about = "Keep a Homebrew tap's OpenJDK early-access cask and formula current",
    version,
    long_about = "tapbump scrapes the vendor's early-access page for the newest build, \
                  fetches the published checksums, rewrites the cask and formula in place, \
                  verifies them, and rolls both back if anything fails."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tap root containing Casks/ and Formula/
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    repo: PathBuf,

    /// Configuration file [default: <repo>/tapbump.toml]
    #[arg(short, long, global = true, value_name = "FILE", env = "TAPBUMP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Update both manifests to the latest early-access build
    Update(UpdateCommand),

    /// Compare the manifests against the latest build without writing
    Check(CheckCommand),

    /// Syntax-check both manifests on disk
    Verify(VerifyCommand),
}

/// What every command needs: where the tap is and how it is configured.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub repo: PathBuf,
    pub config: TapConfig,
    pub quiet: bool,
}

impl CommandContext {
    /// Pipeline wired to the real network and the configured verifier.
    pub fn pipeline(&self) -> Result<Pipeline<HttpFetcher, Verifier>> {
        let fetcher = HttpFetcher::with_timeout(self.config.request_timeout())?;
        let verifier = Verifier::new(CommandChecker::from_command_line(&self.config.syntax_command));
        Ok(Pipeline::new(fetcher, verifier, self.config.paths(&self.repo)))
    }

    /// Print a progress line unless `--quiet`.
    pub fn progress(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            println!("{message}");
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "tapbump=debug,info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            quiet: self.quiet,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let tap_config = TapConfig::load(&self.repo, self.config.as_deref()).await?;
        let ctx = CommandContext {
            repo: self.repo,
            config: tap_config,
            quiet: config.quiet,
        };

        match self.command {
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Verify(cmd) => cmd.execute(&ctx).await,
        }
    }
}
