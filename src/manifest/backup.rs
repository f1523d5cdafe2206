use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::constants::BACKUP_SUFFIX;
use crate::utils::fs::atomic_write_async;

/// Keeps a pre-run copy of one manifest so a failed run can be undone.
///
/// The backup lives beside the manifest as `<file>.backup`. It is created
/// before the first mutation, restored if writing or verification fails,
/// and removed once the run is verified.
///
/// # Examples
///
/// ```rust,no_run
/// use tapbump::manifest::backup::BackupManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backup = BackupManager::new(PathBuf::from("Casks/openjdk@ea.rb"));
/// backup.create_backup().await?;
///
/// // ... rewrite the cask ...
///
/// let verified = true;
/// if verified {
///     backup.cleanup_backup().await?;
/// } else {
///     backup.restore_backup().await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    original_path: PathBuf,
    backup_path: PathBuf,
}

impl BackupManager {
    /// Backup path is `<original>.backup` in the same directory.
    pub fn new(original_path: PathBuf) -> Self {
        let mut backup_path = original_path.clone();
        backup_path.set_file_name(format!(
            "{}.{BACKUP_SUFFIX}",
            original_path.file_name().unwrap_or_default().to_string_lossy()
        ));

        Self {
            original_path,
            backup_path,
        }
    }

    /// Copy the manifest aside, replacing any stale backup.
    ///
    /// # Errors
    ///
    /// Fails if the manifest does not exist or the copy cannot be written.
    pub async fn create_backup(&self) -> Result<()> {
        if !self.original_path.exists() {
            bail!("Original file does not exist: {}", self.original_path.display());
        }

        if self.backup_path.exists() {
            debug!("Removing stale backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.context("Failed to remove stale backup")?;
        }

        debug!("Creating backup at {}", self.backup_path.display());
        fs::copy(&self.original_path, &self.backup_path)
            .await
            .with_context(|| format!("Failed to back up {}", self.original_path.display()))?;

        Ok(())
    }

    /// Put the backed-up bytes back in place.
    ///
    /// Uses the same temp-file-and-rename write as the update itself, so an
    /// interrupted restore never leaves a half-written manifest.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_path.exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from backup", self.original_path.display());
        let content = fs::read(&self.backup_path)
            .await
            .with_context(|| format!("Failed to read backup {}", self.backup_path.display()))?;
        atomic_write_async(&self.original_path, content)
            .await
            .with_context(|| format!("Failed to restore {}", self.original_path.display()))?;

        info!("Restored {}", self.original_path.display());
        Ok(())
    }

    /// Remove the backup; succeeds if there is none.
    pub async fn cleanup_backup(&self) -> Result<()> {
        if self.backup_path.exists() {
            debug!("Cleaning up backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.context("Failed to remove backup")?;
        }
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}
