//! Temporary tap checkout for end-to-end tests.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::fixtures;
use crate::constants::{DEFAULT_CASK_PATH, DEFAULT_FORMULA_PATH, DEFAULT_LOCK_FILE};

/// A tap directory with the cask and formula at their default paths.
///
/// The directory is removed when the value is dropped.
pub struct TestTap {
    dir: TempDir,
}

impl TestTap {
    /// Tap whose manifests are both at `26-ea+<build>`.
    pub fn new(build: u16) -> Result<Self> {
        Self::with_manifests(
            &fixtures::cask(build, '1', '2'),
            &fixtures::formula(build, ['3', '4', '5', '6']),
        )
    }

    /// Tap with the given manifest text.
    pub fn with_manifests(cask: &str, formula: &str) -> Result<Self> {
        let tap = Self::empty()?;
        tap.write_file(DEFAULT_CASK_PATH, cask)?;
        tap.write_file(DEFAULT_FORMULA_PATH, formula)?;
        Ok(tap)
    }

    /// Tap directory without any manifests.
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp tap")?;
        Ok(Self {
            dir,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn cask_path(&self) -> PathBuf {
        self.path().join(DEFAULT_CASK_PATH)
    }

    #[must_use]
    pub fn formula_path(&self) -> PathBuf {
        self.path().join(DEFAULT_FORMULA_PATH)
    }

    /// Write `content` to `relative` inside the tap, creating directories.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read_cask(&self) -> Result<String> {
        std::fs::read_to_string(self.cask_path()).context("Failed to read cask")
    }

    /// Run state recorded in the lock file, verbatim.
    pub fn read_lock_journal(&self) -> Result<String> {
        std::fs::read_to_string(self.path().join(DEFAULT_LOCK_FILE)).context("Failed to read lock file")
    }

    pub fn read_formula(&self) -> Result<String> {
        std::fs::read_to_string(self.formula_path()).context("Failed to read formula")
    }

    /// Cask and formula text, for before/after comparisons.
    pub fn snapshot(&self) -> Result<(String, String)> {
        Ok((self.read_cask()?, self.read_formula()?))
    }

    /// Files in the tap other than the two manifests and the lock file,
    /// relative to the root.
    ///
    /// Used to assert that no backups or temp files were left behind.
    pub fn stray_files(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for dir in ["Casks", "Formula", "."] {
            let dir = self.path().join(dir);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let path = entry.path();
                let relative = path.strip_prefix(self.path())?.to_string_lossy().replace('\\', "/");
                if ![DEFAULT_CASK_PATH, DEFAULT_FORMULA_PATH, DEFAULT_LOCK_FILE].contains(&relative.as_str()) {
                    found.push(relative);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}
