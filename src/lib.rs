//! tapbump - keeps a Homebrew tap's OpenJDK early-access manifests current
//!
//! A tap ships one cask (`Casks/openjdk@ea.rb`) and one formula
//! (`Formula/openjdk@ea.rb`) pinned to an early-access build. tapbump checks
//! the vendor page for a newer build, fetches the published checksum of
//! every platform archive, rewrites both manifests, verifies them, and
//! either lands the whole change or restores both files.
//!
//! # Architecture Overview
//!
//! ```text
//! fetch ──▶ parse/validate ──▶ manifest (backup, rewrite) ──▶ verify
//!                                        ▲                       │
//!                                        └──── restore on error ─┘
//! ```
//!
//! - Only the numeric build number is taken from the scraped page. Artifact
//!   URLs are built from a compiled-in template and checked against a
//!   trusted prefix before use.
//! - Manifests are edited by substituting quoted values; every other byte
//!   (comments, `postflight` blocks, stanza order) is preserved.
//! - Writes are temp-file-and-rename, runs are serialized by an advisory
//!   lock, and backups are restored on any failure after the first write.
//!
//! # Core Modules
//!
//! - [`fetch`] - HTTPS transport behind the [`fetch::Fetch`] trait
//! - [`parse`] - build number extraction, URL synthesis, checksum and URL validation
//! - [`manifest`] - line-preserving manifest documents and backups
//! - [`verify`] - built-in and external syntax checks
//! - [`pipeline`] - the run state machine tying the stages together
//!
//! ## Supporting Modules
//!
//! - [`cli`] - `update`, `check` and `verify` commands
//! - [`config`] - optional `tapbump.toml`
//! - [`core`] - [`core::TapError`] and user-facing error rendering
//! - [`models`] - validated build, platform and checksum types
//! - [`publish`] - pull requests and GitHub Actions outputs
//! - [`command`] - external command runner
//! - [`utils`] - atomic file writes
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Update the tap in the current directory
//! tapbump update
//!
//! # Preview without writing
//! tapbump update --dry-run
//!
//! # CI: update, open a PR, export outputs
//! tapbump update --open-pr --github-output "$GITHUB_OUTPUT"
//!
//! # Inspect
//! tapbump check --format json
//! tapbump verify
//! ```
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tapbump::fetch::HttpFetcher;
//! use tapbump::pipeline::{Pipeline, RunOptions, TapPaths};
//! use tapbump::verify::Verifier;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(HttpFetcher::new()?, Verifier::default(), TapPaths::new(Path::new(".")));
//! let summary = pipeline.run(RunOptions::default()).await?;
//! println!("{:?}: {}", summary.outcome, summary.version);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetch;
pub mod manifest;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod publish;
pub mod utils;
pub mod verify;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
