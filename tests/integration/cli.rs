use anyhow::Result;
use predicates::prelude::*;
use tapbump::pipeline::RunLock;
use tapbump::test_utils::TestTap;

use crate::common::tapbump;

#[test]
fn test_help_lists_commands() -> Result<()> {
    let tap = TestTap::empty()?;
    tapbump(tap.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("verify"));
    Ok(())
}

#[test]
fn test_verify_valid_tap() -> Result<()> {
    let tap = TestTap::new(20)?;
    tapbump(tap.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("cask and formula are valid"));
    Ok(())
}

#[test]
fn test_verify_quiet_prints_nothing() -> Result<()> {
    let tap = TestTap::new(20)?;
    tapbump(tap.path()).args(["verify", "--quiet"]).assert().success().stdout("");
    Ok(())
}

#[test]
fn test_verify_broken_cask_exits_1() -> Result<()> {
    let tap = TestTap::new(20)?;
    tap.write_file("Casks/openjdk@ea.rb", "cask \"openjdk@ea\" do\n  version \"26-ea+20\n")?;

    tapbump(tap.path())
        .arg("verify")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Syntax check failed"))
        .stderr(predicate::str::contains("unterminated string on line 2"));
    Ok(())
}

#[test]
fn test_verify_missing_manifests_exits_1() -> Result<()> {
    let tap = TestTap::empty()?;
    tapbump(tap.path()).arg("verify").assert().code(1).stderr(predicate::str::contains("error"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_configured_syntax_command_runs() -> Result<()> {
    let tap = TestTap::new(20)?;
    tap.write_file("tapbump.toml", "syntax_command = [\"false\"]\n")?;

    tapbump(tap.path())
        .arg("verify")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Command 'false' failed"));
    Ok(())
}

#[test]
fn test_unknown_config_key_exits_1() -> Result<()> {
    let tap = TestTap::new(20)?;
    tap.write_file("tapbump.toml", "vendor_url = \"https://example.invalid/\"\n")?;

    tapbump(tap.path())
        .arg("verify")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("tapbump.toml"));
    Ok(())
}

#[test]
fn test_explicit_config_from_env() -> Result<()> {
    let tap = TestTap::new(20)?;
    tap.write_file("ci.toml", "request_timeout_secs = 0\n")?;

    tapbump(tap.path())
        .env("TAPBUMP_CONFIG", tap.path().join("ci.toml"))
        .arg("verify")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("request_timeout_secs"));
    Ok(())
}

/// The lock is taken before any network access, so this never leaves the machine.
#[tokio::test]
async fn test_update_while_locked_exits_1() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let _held = RunLock::acquire(&tap.path().join(".tapbump.lock")).await?;

    tapbump(tap.path())
        .arg("update")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("holds the lock"));

    assert_eq!(tap.snapshot()?, before);
    Ok(())
}

#[test]
fn test_dry_run_and_open_pr_conflict() -> Result<()> {
    let tap = TestTap::new(20)?;
    tapbump(tap.path()).args(["update", "--dry-run", "--open-pr"]).assert().failure();
    Ok(())
}
