//! Integration test suite for tapbump
//!
//! End-to-end tests of the update pipeline against temporary taps, driven
//! through the library with a canned fetcher, plus CLI tests of the
//! `tapbump` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: happy path, no-op runs, idempotence, dry run, `check`
//! - **rollback**: write and verify failures, interrupted runs, locking
//! - **validation**: malformed scraped data is rejected before any write
//! - **cli**: exit codes and output of the binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod pipeline;
mod rollback;
mod validation;
