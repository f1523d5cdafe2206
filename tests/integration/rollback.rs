use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Mutex;
use tapbump::core::TapError;
use tapbump::manifest::ManifestKind;
use tapbump::pipeline::{AtomicSink, ManifestSink, Pipeline, RunLock, RunOptions, TapPaths};
use tapbump::test_utils::{StaticFetcher, TestTap, fixtures};
use tapbump::verify::{BuiltinChecker, SyntaxCheck};

use crate::common::{pipeline, tap_error};

/// Writes the cask, then dies before the formula lands.
#[derive(Default)]
struct CrashBeforeFormula {
    cask_on_disk: Mutex<Option<String>>,
}

impl ManifestSink for CrashBeforeFormula {
    async fn write(&self, kind: ManifestKind, path: &Path, content: &str) -> Result<()> {
        match kind {
            ManifestKind::Cask => AtomicSink.write(kind, path, content).await,
            ManifestKind::Formula => {
                let cask = path.parent().unwrap().parent().unwrap().join("Casks/openjdk@ea.rb");
                *self.cask_on_disk.lock().unwrap() = Some(std::fs::read_to_string(cask)?);
                bail!("simulated crash while writing the formula")
            }
        }
    }
}

/// Passes the cask, rejects the formula.
struct RejectFormula;

impl SyntaxCheck for RejectFormula {
    async fn check(&self, kind: ManifestKind, path: &Path) -> Result<(), TapError> {
        match kind {
            ManifestKind::Cask => BuiltinChecker.check(kind, path).await,
            ManifestKind::Formula => Err(TapError::Syntax {
                path: path.display().to_string(),
                reason: "syntax error, unexpected end-of-input".to_string(),
            }),
        }
    }
}

#[tokio::test]
async fn test_failure_between_writes_restores_both() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let sink = CrashBeforeFormula::default();
    let pipeline =
        pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd'])).with_sink(sink);

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::FileSystem { .. }), "{err:#}");
    assert!(format!("{err:#}").contains("simulated crash"));
    assert_eq!(tap.snapshot()?, before);
    assert!(tap.stray_files()?.is_empty(), "left behind: {:?}", tap.stray_files()?);
    Ok(())
}

/// The cask really was rewritten before the failure, so the restore did work.
#[tokio::test]
async fn test_cask_was_written_before_restore() -> Result<()> {
    let tap = TestTap::new(20)?;
    let sink = CrashBeforeFormula::default();
    let pipeline =
        pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd'])).with_sink(&sink);

    pipeline.run(RunOptions::default()).await.unwrap_err();

    let observed = sink.cask_on_disk.lock().unwrap().clone();
    assert_eq!(observed, Some(fixtures::cask(21, 'a', 'b')));
    assert_eq!(tap.read_cask()?, fixtures::cask(20, '1', '2'));
    Ok(())
}

#[tokio::test]
async fn test_verify_failure_restores_both() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let pipeline = Pipeline::new(
        StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']),
        RejectFormula,
        TapPaths::new(tap.path()),
    );

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Syntax { .. }), "{err:#}");
    assert_eq!(tap.snapshot()?, before);
    assert!(tap.stray_files()?.is_empty());
    Ok(())
}

/// Backups found at startup mean a previous run was killed mid-write.
#[tokio::test]
async fn test_interrupted_run_is_recovered() -> Result<()> {
    let tap = TestTap::new(20)?;
    let original = tap.read_cask()?;
    tap.write_file("Casks/openjdk@ea.rb.backup", &original)?;
    tap.write_file("Casks/openjdk@ea.rb", "cask \"openjdk@ea\" do\n  version \"26-ea+21\"\n")?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("20", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    assert_eq!(summary.previous.as_deref(), Some("26-ea+20"));
    assert_eq!(tap.read_cask()?, original);
    assert!(tap.stray_files()?.is_empty());
    Ok(())
}

/// A killed run recorded `backed_up` in the lock file; its backups win.
#[tokio::test]
async fn test_backups_restored_when_last_run_did_not_verify() -> Result<()> {
    let tap = TestTap::new(20)?;
    let original = tap.read_cask()?;
    tap.write_file(".tapbump.lock", "\"backed_up\"\n")?;
    tap.write_file("Casks/openjdk@ea.rb.backup", &original)?;
    tap.write_file("Casks/openjdk@ea.rb", &fixtures::cask(21, 'a', 'b'))?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("20", ['a', 'b', 'c', 'd']));

    let summary = pipeline.run(RunOptions::default()).await?;

    assert_eq!(summary.previous.as_deref(), Some("26-ea+20"));
    assert_eq!(tap.read_cask()?, original);
    assert!(tap.stray_files()?.is_empty());
    Ok(())
}

/// Backups a verified run failed to remove must not roll the update back.
#[tokio::test]
async fn test_leftover_backups_after_verified_run_are_discarded() -> Result<()> {
    let tap = TestTap::new(20)?;
    let old_cask = tap.read_cask()?;
    let old_formula = tap.read_formula()?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    pipeline.run(RunOptions::default()).await?;
    assert_eq!(tap.read_lock_journal()?.trim(), "\"verified\"");
    let updated = tap.snapshot()?;

    // As if cleanup had failed after verification.
    tap.write_file("Casks/openjdk@ea.rb.backup", &old_cask)?;
    tap.write_file("Formula/openjdk@ea.rb.backup", &old_formula)?;

    let second = pipeline.run(RunOptions::default()).await?;

    assert_eq!(second.previous.as_deref(), Some("26-ea+21"));
    assert_eq!(tap.snapshot()?, updated);
    assert!(tap.stray_files()?.is_empty(), "left behind: {:?}", tap.stray_files()?);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_run_fails_fast() -> Result<()> {
    let tap = TestTap::new(20)?;
    let before = tap.snapshot()?;
    let _held = RunLock::acquire(&tap.path().join(".tapbump.lock")).await?;
    let pipeline = pipeline(&tap, StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']));

    let err = pipeline.run(RunOptions::default()).await.unwrap_err();

    assert!(matches!(tap_error(&err), TapError::Locked { .. }));
    assert!(pipeline.fetcher().requests().is_empty());
    assert_eq!(tap.snapshot()?, before);
    Ok(())
}
