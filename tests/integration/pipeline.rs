use anyhow::Result;
use tapbump::constants::VENDOR_INDEX_URL;
use tapbump::models::Platform;
use tapbump::pipeline::{Outcome, RunOptions, RunState};
use tapbump::test_utils::{StaticFetcher, TestTap, fixtures};

use crate::common::pipeline;

/// Build 21 published, tap at 20: both manifests move to 26-ea+21.
#[tokio::test]
async fn test_happy_path_updates_both_manifests() -> Result<()> {
    let tap = TestTap::new(20)?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    assert_eq!(summary.outcome, Outcome::Updated);
    assert_eq!(summary.state, RunState::Verified);
    assert_eq!(summary.version, "26-ea+21");
    assert_eq!(summary.previous.as_deref(), Some("26-ea+20"));
    assert_eq!(summary.changed_files, vec![tap.cask_path(), tap.formula_path()]);

    // Only the rewritten values differ from what a fresh build-21 tap would hold.
    assert_eq!(tap.read_cask()?, fixtures::cask(21, 'a', 'b'));
    assert_eq!(tap.read_formula()?, fixtures::formula(21, ['a', 'b', 'c', 'd']));
    assert!(tap.stray_files()?.is_empty(), "left behind: {:?}", tap.stray_files()?);
    Ok(())
}

#[tokio::test]
async fn test_summary_lists_every_platform() -> Result<()> {
    let tap = TestTap::new(20)?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    let platforms: Vec<Platform> = summary.artifacts.iter().map(|a| a.platform).collect();
    assert_eq!(platforms, Platform::ALL);
    let linux = &summary.artifacts[3];
    assert_eq!(
        linux.url,
        "https://download.java.net/java/early_access/jdk26/21/GPL/openjdk-26-ea+21_linux-x64_bin.tar.gz"
    );
    assert_eq!(linux.sha256.as_str(), fixtures::sha('d'));
    Ok(())
}

/// Latest build already in the tap: exit early, fetch nothing else, write nothing.
#[tokio::test]
async fn test_no_new_build_is_a_no_op() -> Result<()> {
    let tap = TestTap::new(21)?;
    let before = tap.snapshot()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    assert_eq!(summary.outcome, Outcome::UpToDate);
    assert!(summary.changed_files.is_empty());
    assert_eq!(tap.snapshot()?, before);
    assert_eq!(pipeline.fetcher().requests(), vec![VENDOR_INDEX_URL.to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_second_run_is_idempotent() -> Result<()> {
    let tap = TestTap::new(20)?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    pipeline.run(RunOptions::default()).await?;
    let after_first = tap.snapshot()?;

    let second = pipeline.run(RunOptions::default()).await?;
    assert_eq!(second.outcome, Outcome::UpToDate);
    assert_eq!(tap.snapshot()?, after_first);
    Ok(())
}

/// `--force` rewrites checksums even when the version already matches.
#[tokio::test]
async fn test_force_rewrites_current_version() -> Result<()> {
    let tap = TestTap::new(21)?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline
        .run(RunOptions {
            force: true,
            ..RunOptions::default()
        })
        .await?;

    assert_eq!(summary.outcome, Outcome::Updated);
    assert_eq!(tap.read_cask()?, fixtures::cask(21, 'a', 'b'));
    assert_eq!(tap.read_formula()?, fixtures::formula(21, ['a', 'b', 'c', 'd']));
    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline
        .run(RunOptions {
            dry_run: true,
            ..RunOptions::default()
        })
        .await?;

    assert_eq!(summary.outcome, Outcome::Planned);
    assert_eq!(summary.state, RunState::ParsedValid);
    assert_eq!(summary.changed_files.len(), 2);
    assert_eq!(tap.snapshot()?, before);
    assert!(tap.stray_files()?.is_empty());
    Ok(())
}

/// Only the manifest that is behind gets written.
#[tokio::test]
async fn test_formula_behind_cask() -> Result<()> {
    let tap = TestTap::with_manifests(
        &fixtures::cask(21, 'a', 'b'),
        &fixtures::formula(20, ['3', '4', '5', '6']),
    )?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    assert_eq!(summary.outcome, Outcome::Updated);
    assert_eq!(summary.changed_files, vec![tap.formula_path()]);
    assert_eq!(tap.read_formula()?, fixtures::formula(21, ['a', 'b', 'c', 'd']));
    Ok(())
}

#[tokio::test]
async fn test_check_reports_versions() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let report = pipeline.check().await?;

    assert_eq!(report.latest.version(), "26-ea+21");
    assert_eq!(report.cask.as_deref(), Some("26-ea+20"));
    assert_eq!(report.formula.as_deref(), Some("26-ea+20"));
    assert!(!report.up_to_date);
    assert_eq!(tap.snapshot()?, before);
    Ok(())
}

/// A tap without manifests yet reports no current version instead of failing.
#[tokio::test]
async fn test_check_on_empty_tap() -> Result<()> {
    let tap = TestTap::empty()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let report = pipeline.check().await?;

    assert_eq!(report.cask, None);
    assert_eq!(report.formula, None);
    assert!(!report.up_to_date);
    Ok(())
}

#[tokio::test]
async fn test_verify_manifests() -> Result<()> {
    let tap = TestTap::new(20)?;
    let pipeline = pipeline(&tap, StaticFetcher::new());

    pipeline.verify_manifests().await?;

    tap.write_file("Formula/openjdk@ea.rb", "class OpenjdkAtEa < Formula\n")?;
    assert!(pipeline.verify_manifests().await.is_err());
    Ok(())
}
