//! The two on-disk manifests the pipeline rewrites.
//!
//! A tap carries one [`ManifestKind::Cask`] (macOS app install, checksums
//! as an `arm:`/`intel:` pair) and one [`ManifestKind::Formula`] (four
//! `on_macos`/`on_linux` × `on_arm`/`on_intel` blocks, each with its own
//! `url` and `sha256`).
//!
//! # Lifecycle
//!
//! ```text
//! read_current_version → backup → apply (in memory) → atomic write
//!                                                    → verify → cleanup_backup
//!                                                             ↘ restore (on failure)
//! ```
//!
//! Rewriting is done by [`document::ManifestDocument`], which substitutes
//! quoted values in place and leaves every other byte alone. Backups are
//! handled by [`backup::BackupManager`].

pub mod backup;
pub mod document;

use regex::Regex;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

use crate::core::TapError;
use crate::models::Platform;
use backup::BackupManager;
use document::FieldKind;

pub use document::ManifestDocument;

static LENIENT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*version\s+"([^"]*)""#).expect("lenient version regex is valid")
});

const CASK_FIELDS: &[(FieldKind, Platform)] =
    &[(FieldKind::Sha256, Platform::MacosArm64), (FieldKind::Sha256, Platform::MacosX64)];

const FORMULA_FIELDS: &[(FieldKind, Platform)] = &[
    (FieldKind::Url, Platform::MacosArm64),
    (FieldKind::Sha256, Platform::MacosArm64),
    (FieldKind::Url, Platform::MacosX64),
    (FieldKind::Sha256, Platform::MacosX64),
    (FieldKind::Url, Platform::LinuxArm64),
    (FieldKind::Sha256, Platform::LinuxArm64),
    (FieldKind::Url, Platform::LinuxX64),
    (FieldKind::Sha256, Platform::LinuxX64),
];

/// Which of the two manifests a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Cask,
    Formula,
}

impl ManifestKind {
    pub const ALL: [Self; 2] = [Self::Cask, Self::Formula];

    /// OS assumed for fields outside any `on_macos`/`on_linux` block.
    #[must_use]
    pub const fn default_macos(self) -> Option<bool> {
        match self {
            Self::Cask => Some(true),
            Self::Formula => None,
        }
    }

    /// Fields that must be present before the manifest can be rewritten.
    #[must_use]
    pub const fn required_fields(self) -> &'static [(FieldKind, Platform)] {
        match self {
            Self::Cask => CASK_FIELDS,
            Self::Formula => FORMULA_FIELDS,
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cask => "cask",
            Self::Formula => "formula",
        })
    }
}

/// One manifest taking part in a run.
#[derive(Debug)]
pub struct ManifestFile {
    pub kind: ManifestKind,
    pub path: PathBuf,
    /// Version found before the run; `None` if absent or unparseable.
    pub current_version: Option<String>,
    backup: BackupManager,
}

impl ManifestFile {
    /// Load the current version of the manifest at `path`.
    pub async fn open(kind: ManifestKind, path: PathBuf) -> Result<Self, TapError> {
        let current_version = read_current_version(&path).await?;
        debug!("{kind} at {} is at {:?}", path.display(), current_version);
        let backup = BackupManager::new(path.clone());
        Ok(Self {
            kind,
            path,
            current_version,
            backup,
        })
    }

    #[must_use]
    pub const fn backup(&self) -> &BackupManager {
        &self.backup
    }

    /// Whether this manifest already declares `target`.
    #[must_use]
    pub fn is_at(&self, target: &str) -> bool {
        short_circuit_if_unchanged(self.current_version.as_deref(), target)
    }

    /// Read and strictly parse the manifest.
    pub async fn load_document(&self) -> Result<ManifestDocument, TapError> {
        let text = fs::read_to_string(&self.path).await.map_err(|_| TapError::FileSystem {
            operation: format!("read {}", self.kind),
            path: self.path.display().to_string(),
        })?;
        ManifestDocument::parse(self.kind, &text)
    }
}

/// Version declared in the manifest at `path`.
///
/// Returns `Ok(None)` when the file does not exist or has no recognisable
/// `version "..."` line, so a first run against an empty tap can proceed.
pub async fn read_current_version(path: &Path) -> Result<Option<String>, TapError> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(_) => {
            return Err(TapError::FileSystem {
                operation: "read manifest".to_string(),
                path: path.display().to_string(),
            });
        }
    };

    Ok(LENIENT_VERSION
        .captures(&text)
        .map(|cap| cap[1].to_string())
        .filter(|v| !v.is_empty()))
}

/// `true` when `current` already equals `target` and no write is needed.
#[must_use]
pub fn short_circuit_if_unchanged(current: Option<&str>, target: &str) -> bool {
    current == Some(target)
}
