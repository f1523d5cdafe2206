//! The update pipeline: fetch, parse and validate, rewrite, verify.
//!
//! A [`Pipeline`] owns the three collaborators a run talks to (the
//! [`Fetch`] transport, the [`SyntaxCheck`] verifier and the
//! [`ManifestSink`] that puts bytes on disk) and drives one
//! [`PipelineRun`] through its states:
//!
//! ```text
//! Start → Fetched → ParsedValid → BackedUp → Written → Verified
//!   └────────┴───────────┴────────────┴─────────┴──→ Failed
//! ```
//!
//! Nothing is written before `ParsedValid`: every checksum and URL has been
//! fetched and validated and both manifests have been rewritten in memory
//! by then. From `BackedUp` onward any failure restores both manifests from
//! their backups, so a run either lands completely or leaves the tap byte
//! for byte as it found it.
//!
//! A run holds the tap's [`RunLock`] from start to finish and records in
//! it when backups are about to be taken and when the update verified.
//! Backups found at the next start are restored if the recorded run never
//! verified, and simply removed if it did.

pub mod lock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::constants::{DEFAULT_CASK_PATH, DEFAULT_FORMULA_PATH, DEFAULT_LOCK_FILE, VENDOR_INDEX_URL};
use crate::core::TapError;
use crate::fetch::{Fetch, fetch_checksum, fetch_page};
use crate::manifest::{ManifestFile, ManifestKind};
use crate::models::{ArtifactSet, BuildDescriptor, Platform, PlatformArtifact};
use crate::parse::{build_artifact_url, extract_build_number, validate_checksum, validate_url};
use crate::utils::fs::atomic_write_async;
use crate::verify::SyntaxCheck;

pub use lock::RunLock;

/// Where a run finds the manifests and its lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapPaths {
    pub cask: PathBuf,
    pub formula: PathBuf,
    pub lock: PathBuf,
}

impl TapPaths {
    /// Default layout under the tap root.
    pub fn new(root: &Path) -> Self {
        Self {
            cask: root.join(DEFAULT_CASK_PATH),
            formula: root.join(DEFAULT_FORMULA_PATH),
            lock: root.join(DEFAULT_LOCK_FILE),
        }
    }

    fn manifest(&self, kind: ManifestKind) -> &Path {
        match kind {
            ManifestKind::Cask => &self.cask,
            ManifestKind::Formula => &self.formula,
        }
    }
}

/// Puts rewritten manifest bytes on disk.
#[allow(async_fn_in_trait)]
pub trait ManifestSink {
    async fn write(&self, kind: ManifestKind, path: &Path, content: &str) -> Result<()>;
}

/// Production sink: temp file in the same directory, fsync, rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicSink;

impl ManifestSink for AtomicSink {
    async fn write(&self, kind: ManifestKind, path: &Path, content: &str) -> Result<()> {
        debug!("Writing {kind} to {}", path.display());
        atomic_write_async(path, content.as_bytes().to_vec()).await
    }
}

impl<T: ManifestSink> ManifestSink for &T {
    async fn write(&self, kind: ManifestKind, path: &Path, content: &str) -> Result<()> {
        (**self).write(kind, path, content).await
    }
}

/// Stage a run has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    Fetched,
    ParsedValid,
    BackedUp,
    Written,
    Verified,
    Failed,
}

impl RunState {
    /// Whether a run may move from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Start, Self::Fetched)
                | (Self::Fetched, Self::ParsedValid)
                | (Self::ParsedValid, Self::BackedUp)
                | (Self::BackedUp, Self::Written)
                | (Self::Written, Self::Verified)
        ) || (matches!(next, Self::Failed) && !self.is_terminal())
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Fetched => "fetched",
            Self::ParsedValid => "parsed",
            Self::BackedUp => "backed up",
            Self::Written => "written",
            Self::Verified => "verified",
            Self::Failed => "failed",
        })
    }
}

/// Ephemeral state of a single invocation.
#[derive(Debug)]
pub struct PipelineRun {
    state: RunState,
    manifests: Vec<ManifestFile>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            state: RunState::Start,
            manifests: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(self.state.can_advance_to(next), "illegal transition {} -> {next}", self.state);
        debug!("Run state: {} -> {next}", self.state);
        self.state = next;
    }

    fn previous_version(&self, kind: ManifestKind) -> Option<String> {
        self.manifests.iter().find(|m| m.kind == kind).and_then(|m| m.current_version.clone())
    }

    /// Put every backed-up manifest back. Attempts all before reporting.
    async fn restore_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for manifest in &self.manifests {
            if !manifest.backup().backup_exists() {
                continue;
            }
            if let Err(e) = manifest.backup().restore_backup().await {
                error!("Failed to restore {}: {e:#}", manifest.path.display());
                first_error.get_or_insert(e);
                continue;
            }
            if let Err(e) = manifest.backup().cleanup_backup().await {
                warn!("Restored {} but could not remove its backup: {e:#}", manifest.path.display());
            }
        }
        self.advance(RunState::Failed);
        first_error.map_or(Ok(()), Err)
    }

    /// Remove every backup. Attempts all before reporting.
    async fn cleanup_backups(&self) -> Result<()> {
        let mut first_error = None;
        for manifest in &self.manifests {
            if let Err(e) = manifest.backup().cleanup_backup().await {
                warn!("Could not remove backup for {}: {e:#}", manifest.path.display());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Switches for [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Rewrite even when both manifests already carry the latest version.
    pub force: bool,
    /// Fetch, validate and render, but leave the tap untouched.
    pub dry_run: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both manifests were rewritten and verified.
    Updated,
    /// Both manifests already declared the latest version.
    UpToDate,
    /// Dry run: the update was planned but not written.
    Planned,
}

/// What a run did, for the terminal, CI outputs and the pull request.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub state: RunState,
    /// Version the cask declared before the run (the formula's if the cask had none).
    pub previous: Option<String>,
    pub version: String,
    pub build_number: u16,
    pub artifacts: Vec<PlatformArtifact>,
    /// Manifests whose bytes changed (or would change, for a dry run).
    pub changed_files: Vec<PathBuf>,
}

impl RunSummary {
    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.outcome == Outcome::Updated
    }
}

/// Versions on disk against the latest published build.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub latest: BuildDescriptor,
    pub cask: Option<String>,
    pub formula: Option<String>,
    pub up_to_date: bool,
}

/// A manifest rewritten in memory, waiting to be written.
struct PlannedWrite {
    index: usize,
    content: String,
}

/// The update pipeline for one tap.
pub struct Pipeline<F, C, S = AtomicSink> {
    fetcher: F,
    checker: C,
    sink: S,
    paths: TapPaths,
}

impl<F: Fetch, C: SyntaxCheck> Pipeline<F, C> {
    pub fn new(fetcher: F, checker: C, paths: TapPaths) -> Self {
        Self {
            fetcher,
            checker,
            sink: AtomicSink,
            paths,
        }
    }
}

impl<F: Fetch, C: SyntaxCheck, S: ManifestSink> Pipeline<F, C, S> {
    /// Replace the sink that writes manifests.
    pub fn with_sink<T: ManifestSink>(self, sink: T) -> Pipeline<F, C, T> {
        Pipeline {
            fetcher: self.fetcher,
            checker: self.checker,
            sink,
            paths: self.paths,
        }
    }

    #[must_use]
    pub const fn paths(&self) -> &TapPaths {
        &self.paths
    }

    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Latest published build and the versions currently on disk.
    ///
    /// Never writes and does not take the run lock.
    pub async fn check(&self) -> Result<CheckReport> {
        let latest = self.latest_build().await?;
        let cask = ManifestFile::open(ManifestKind::Cask, self.paths.cask.clone()).await?;
        let formula = ManifestFile::open(ManifestKind::Formula, self.paths.formula.clone()).await?;
        let up_to_date = cask.is_at(latest.version()) && formula.is_at(latest.version());

        Ok(CheckReport {
            latest,
            cask: cask.current_version,
            formula: formula.current_version,
            up_to_date,
        })
    }

    /// Run the syntax check against both manifests as they are on disk.
    pub async fn verify_manifests(&self) -> Result<()> {
        for kind in ManifestKind::ALL {
            let path = self.paths.manifest(kind);
            self.checker.check(kind, path).await.with_context(|| format!("{kind} did not verify"))?;
            info!("{kind} at {} is valid", path.display());
        }
        Ok(())
    }

    /// Bring both manifests up to the latest early-access build.
    ///
    /// # Errors
    ///
    /// Any [`TapError`] from the stage that failed, wrapped with context.
    /// When the error comes after backups were taken, both manifests have
    /// already been restored by the time it is returned.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let lock = RunLock::acquire(&self.paths.lock).await?;
        let mut run = PipelineRun::new();
        self.recover_interrupted_run(&lock).await?;

        let descriptor = self.latest_build().await?;
        run.advance(RunState::Fetched);
        let version = descriptor.version().to_string();

        for kind in ManifestKind::ALL {
            run.manifests.push(ManifestFile::open(kind, self.paths.manifest(kind).to_path_buf()).await?);
        }

        if !options.force && run.manifests.iter().all(|m| m.is_at(&version)) {
            info!("already at latest version ({version})");
            return Ok(Self::summary(&run, &descriptor, Outcome::UpToDate, Vec::new(), Vec::new()));
        }

        info!(
            "Updating {} -> {version}",
            run.previous_version(ManifestKind::Cask).as_deref().unwrap_or("(none)")
        );

        let artifacts = self.collect_artifacts(&descriptor).await?;
        let planned = Self::plan(&run, &descriptor, &artifacts, options.force).await?;
        run.advance(RunState::ParsedValid);

        let artifact_list: Vec<PlatformArtifact> = artifacts.iter().cloned().collect();
        let changed: Vec<PathBuf> =
            planned.iter().map(|p| run.manifests[p.index].path.clone()).collect();

        if options.dry_run {
            info!("Dry run: {} manifest(s) would change", changed.len());
            return Ok(Self::summary(&run, &descriptor, Outcome::Planned, artifact_list, changed));
        }

        if let Err(e) = self.commit(&mut run, &planned, &lock).await {
            if let Err(restore_error) = run.restore_all().await {
                return Err(e.context(format!("restore also failed: {restore_error:#}")));
            }
            return Err(e);
        }

        // Once `verified` is recorded, the next run discards leftover backups.
        let recorded = match lock.record(RunState::Verified) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        };
        if let Err(e) = run.cleanup_backups().await
            && !recorded
        {
            return Err(e.context(format!(
                "{version} was written and verified, but its backups could not be removed; \
                 delete the .backup files before the next run"
            )));
        }
        info!("Updated {} manifest(s) to {version}", changed.len());
        Ok(Self::summary(&run, &descriptor, Outcome::Updated, artifact_list, changed))
    }

    async fn latest_build(&self) -> Result<BuildDescriptor> {
        info!("Checking {VENDOR_INDEX_URL} for the latest build");
        let page = fetch_page(&self.fetcher, VENDOR_INDEX_URL)
            .await
            .context("Failed to fetch the vendor page")?;
        let descriptor = extract_build_number(&page).context("Failed to read the latest build")?;
        debug!("Latest build is {}", descriptor.build_number());
        Ok(descriptor)
    }

    /// Fetch and validate the checksum and URL for every platform.
    async fn collect_artifacts(&self, descriptor: &BuildDescriptor) -> Result<ArtifactSet> {
        let mut artifacts = Vec::with_capacity(Platform::ALL.len());
        for platform in Platform::ALL {
            let url = validate_url(&build_artifact_url(descriptor, platform))?;
            let raw = fetch_checksum(&self.fetcher, &url)
                .await
                .with_context(|| format!("Failed to fetch the {platform} checksum"))?;
            let sha256 = validate_checksum(platform, &raw)?;
            debug!("{platform}: {sha256}");
            artifacts.push(PlatformArtifact {
                platform,
                url,
                sha256,
            });
        }
        Ok(ArtifactSet::new(artifacts)?)
    }

    /// Rewrite every manifest in memory; keep the ones whose bytes change.
    async fn plan(
        run: &PipelineRun,
        descriptor: &BuildDescriptor,
        artifacts: &ArtifactSet,
        force: bool,
    ) -> Result<Vec<PlannedWrite>> {
        let mut planned = Vec::new();
        for (index, manifest) in run.manifests.iter().enumerate() {
            let mut document = manifest.load_document().await?;
            let before = document.render();
            document
                .apply(descriptor, artifacts)
                .with_context(|| format!("Cannot update {}", manifest.path.display()))?;
            let content = document.render();

            if content == before && !force {
                debug!("{} is already current", manifest.path.display());
                continue;
            }
            planned.push(PlannedWrite {
                index,
                content,
            });
        }
        Ok(planned)
    }

    /// Back up, write and verify. The caller restores on error.
    async fn commit(
        &self,
        run: &mut PipelineRun,
        planned: &[PlannedWrite],
        lock: &RunLock,
    ) -> Result<()> {
        lock.record(RunState::BackedUp)?;
        for manifest in &run.manifests {
            manifest.backup().create_backup().await.map_err(|e| TapError::FileSystem {
                operation: format!("back up {}: {e:#}", manifest.kind),
                path: manifest.path.display().to_string(),
            })?;
        }
        run.advance(RunState::BackedUp);

        for write in planned {
            let manifest = &run.manifests[write.index];
            self.sink.write(manifest.kind, &manifest.path, &write.content).await.map_err(|e| {
                TapError::FileSystem {
                    operation: format!("write {}: {e:#}", manifest.kind),
                    path: manifest.path.display().to_string(),
                }
            })?;
            info!("Wrote {}", manifest.path.display());
        }
        run.advance(RunState::Written);

        for manifest in &run.manifests {
            self.checker.check(manifest.kind, &manifest.path).await?;
        }
        run.advance(RunState::Verified);
        Ok(())
    }

    /// Deal with backups left behind by an earlier run.
    ///
    /// A run that recorded `verified` only failed to clean up, so its
    /// backups are stale and removed. Any other run was killed between
    /// backup and verification, so its backups are restored.
    async fn recover_interrupted_run(&self, lock: &RunLock) -> Result<()> {
        let verified = lock.recorded_state() == Some(RunState::Verified);
        for kind in ManifestKind::ALL {
            let manifest = ManifestFile::open(kind, self.paths.manifest(kind).to_path_buf()).await?;
            if !manifest.backup().backup_exists() {
                continue;
            }
            if verified {
                info!(
                    "Removing {} left by a verified run",
                    manifest.backup().backup_path().display()
                );
                manifest.backup().cleanup_backup().await?;
            } else {
                warn!(
                    "Found {} from an interrupted run; restoring",
                    manifest.backup().backup_path().display()
                );
                manifest.backup().restore_backup().await?;
                manifest.backup().cleanup_backup().await?;
            }
        }
        Ok(())
    }

    fn summary(
        run: &PipelineRun,
        descriptor: &BuildDescriptor,
        outcome: Outcome,
        artifacts: Vec<PlatformArtifact>,
        changed_files: Vec<PathBuf>,
    ) -> RunSummary {
        RunSummary {
            outcome,
            state: run.state(),
            previous: run
                .previous_version(ManifestKind::Cask)
                .or_else(|| run.previous_version(ManifestKind::Formula)),
            version: descriptor.version().to_string(),
            build_number: descriptor.build_number(),
            artifacts,
            changed_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use RunState::*;

        let path = [Start, Fetched, ParsedValid, BackedUp, Written, Verified];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }

        assert!(!Start.can_advance_to(Written));
        assert!(!Fetched.can_advance_to(BackedUp));
        assert!(BackedUp.can_advance_to(Failed));
        assert!(!Verified.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Start));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Verified.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Written.is_terminal());
    }

    #[test]
    fn test_default_paths() {
        let paths = TapPaths::new(Path::new("/tap"));
        assert_eq!(paths.cask, Path::new("/tap/Casks/openjdk@ea.rb"));
        assert_eq!(paths.formula, Path::new("/tap/Formula/openjdk@ea.rb"));
        assert_eq!(paths.lock, Path::new("/tap/.tapbump.lock"));
    }
}
