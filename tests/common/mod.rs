//! Common helpers for tapbump integration tests

// Not every helper is used by every test module
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use tapbump::core::TapError;
use tapbump::pipeline::{Pipeline, TapPaths};
use tapbump::test_utils::{StaticFetcher, TestTap};
use tapbump::verify::BuiltinChecker;

/// Pipeline over `tap` with canned responses and the built-in checker.
pub fn pipeline(tap: &TestTap, fetcher: StaticFetcher) -> Pipeline<StaticFetcher, BuiltinChecker> {
    tapbump::test_utils::init_test_logging(None);
    Pipeline::new(fetcher, BuiltinChecker, TapPaths::new(tap.path()))
}

/// The typed error inside an `anyhow` chain.
pub fn tap_error(error: &anyhow::Error) -> &TapError {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<TapError>())
        .or_else(|| error.downcast_ref::<TapError>())
        .unwrap_or_else(|| panic!("no TapError in: {error:#}"))
}

/// The `tapbump` binary run against `repo` in a clean environment.
pub fn tapbump(repo: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tapbump").unwrap();
    cmd.arg("--repo")
        .arg(repo)
        .env_remove("GITHUB_OUTPUT")
        .env_remove("TAPBUMP_CONFIG")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}
