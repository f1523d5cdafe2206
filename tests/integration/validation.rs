use anyhow::Result;
use tapbump::constants::VENDOR_INDEX_URL;
use tapbump::core::TapError;
use tapbump::models::{BuildDescriptor, Platform};
use tapbump::parse::build_artifact_url;
use tapbump::pipeline::{RunLock, RunOptions};
use tapbump::test_utils::fetcher::checksum_url;
use tapbump::test_utils::{StaticFetcher, TestTap};

use crate::common::{pipeline, tap_error};

fn build(n: u16) -> BuildDescriptor {
    BuildDescriptor::new(n).unwrap()
}

#[test]
fn test_artifact_url_for_build_42() {
    assert_eq!(
        build_artifact_url(&build(42), Platform::LinuxX64),
        "https://download.java.net/java/early_access/jdk26/42/GPL/openjdk-26-ea+42_linux-x64_bin.tar.gz"
    );
}

/// A checksum file holding garbage fails the run before any write.
#[tokio::test]
async fn test_bad_checksum_rejected_before_write() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let fetcher = StaticFetcher::for_build("21", ['a', 'b', 'c', 'd'])
        .with(checksum_url(&build(21), Platform::LinuxX64), "not-a-hash  openjdk.tar.gz\n");
    let pipeline = pipeline(&tap, fetcher);

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Validation { .. }), "{err:#}");
    assert!(format!("{err:#}").contains("invalid SHA256 format for linux-x64: not-a-hash"));
    assert_eq!(tap.snapshot()?, before);
    assert!(tap.stray_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_uppercase_checksum_rejected() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let fetcher = StaticFetcher::for_build("21", ['a', 'b', 'c', 'd'])
        .with(checksum_url(&build(21), Platform::MacosArm64), "A".repeat(64));
    let pipeline = pipeline(&tap, fetcher);

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Validation { .. }));
    assert_eq!(tap.snapshot()?, before);
    Ok(())
}

/// Malformed build numbers stop the run right after the page fetch.
#[tokio::test]
async fn test_malformed_build_numbers_rejected() -> Result<()> {
    for token in ["0", "1000", "042", "-1", "21a", "abc"] {
        let tap = TestTap::new(20)?;
        let before = tap.snapshot()?;
        let pipeline = pipeline(&tap, StaticFetcher::for_build(token, ['a', 'b', 'c', 'd']));

        let err = pipeline.run(RunOptions::default()).await.unwrap_err();

        assert!(
            matches!(tap_error(&err), TapError::Validation { .. }),
            "token {token:?}: {err:#}"
        );
        assert_eq!(pipeline.fetcher().requests(), vec![VENDOR_INDEX_URL.to_string()]);
        assert_eq!(tap.snapshot()?, before);
    }
    Ok(())
}

#[tokio::test]
async fn test_page_without_build_marker() -> Result<()> {
    let tap = TestTap::new(20)?;
    let fetcher = StaticFetcher::new().with(VENDOR_INDEX_URL, "<html>maintenance</html>");
    let pipeline = pipeline(&tap, fetcher);

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Parse { .. }), "{err:#}");
    Ok(())
}

#[tokio::test]
async fn test_missing_checksum_file_is_fetch_error() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let fetcher = StaticFetcher::for_build("21", ['a', 'b', 'c', 'd'])
        .without(&checksum_url(&build(21), Platform::LinuxArm64));
    let pipeline = pipeline(&tap, fetcher);

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Fetch { .. }), "{err:#}");
    assert_eq!(tap.snapshot()?, before);
    Ok(())
}

#[tokio::test]
async fn test_vendor_page_unreachable() -> Result<()> {
    let tap = TestTap::new(20)?;
    let pipeline = pipeline(&tap, StaticFetcher::new());

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Fetch { .. }));
    assert!(tap.stray_files()?.is_empty());
    RunLock::acquire(&pipeline.paths().lock).await?;
    Ok(())
}

/// A formula missing its Linux blocks cannot be rewritten; neither file is touched.
#[tokio::test]
async fn test_incomplete_formula_aborts_before_write() -> Result<()> {
    let formula = "class OpenjdkAtEa < Formula\n  version \"26-ea+20\"\nend\n";
    let tap = TestTap::with_manifests(&tapbump::test_utils::fixtures::cask(20, '1', '2'), formula)?;
    let before = tap.snapshot()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Parse { .. }), "{err:#}");
    assert!(format!("{err:#}").contains("no url for macos-arm64"));
    assert_eq!(tap.snapshot()?, before);
    Ok(())
}
