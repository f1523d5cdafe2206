//! Per-tap configuration (`tapbump.toml`).
//!
//! The file is optional. Every key has a default, so a tap laid out the
//! usual way needs no configuration at all:
//!
//! ```toml
//! cask_path = "Casks/openjdk@ea.rb"
//! formula_path = "Formula/openjdk@ea.rb"
//! lock_file = ".tapbump.lock"
//! request_timeout_secs = 30
//! # Extra syntax check run on each rewritten manifest (path appended)
//! syntax_command = ["ruby", "-c"]
//!
//! [pull_request]
//! base_branch = "main"
//! remote = "origin"
//! label = "automated"
//! ```
//!
//! The vendor page and the artifact base URL are compiled in and cannot be
//! set here; unknown keys are rejected so a misspelt or unsupported setting
//! never goes unnoticed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_CASK_PATH, DEFAULT_FORMULA_PATH, DEFAULT_LOCK_FILE,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::core::TapError;
use crate::pipeline::TapPaths;

fn default_cask_path() -> PathBuf {
    PathBuf::from(DEFAULT_CASK_PATH)
}

fn default_formula_path() -> PathBuf {
    PathBuf::from(DEFAULT_FORMULA_PATH)
}

fn default_lock_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOCK_FILE)
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Settings for one tap. Relative paths are resolved against the tap root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    #[serde(default = "default_cask_path")]
    pub cask_path: PathBuf,

    #[serde(default = "default_formula_path")]
    pub formula_path: PathBuf,

    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Per-request HTTP timeout. Must be positive.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Command run on each rewritten manifest; empty means built-in check only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syntax_command: Vec<String>,

    #[serde(default)]
    pub pull_request: PullRequestConfig,
}

/// How `update --open-pr` publishes a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullRequestConfig {
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            base_branch: default_base_branch(),
            remote: default_remote(),
            label: None,
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            cask_path: default_cask_path(),
            formula_path: default_formula_path(),
            lock_file: default_lock_file(),
            request_timeout_secs: default_request_timeout_secs(),
            syntax_command: Vec::new(),
            pull_request: PullRequestConfig::default(),
        }
    }
}

impl TapConfig {
    /// Load the configuration for the tap at `repo`.
    ///
    /// With `explicit` set the file must exist. Otherwise `<repo>/tapbump.toml`
    /// is used if present and the defaults if not.
    ///
    /// # Errors
    ///
    /// [`TapError::Config`] if the file cannot be read, is not valid TOML,
    /// has unknown keys, or fails [`TapConfig::validate`].
    pub async fn load(repo: &Path, explicit: Option<&Path>) -> Result<Self, TapError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = repo.join(CONFIG_FILE_NAME);
                if !path.exists() {
                    debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, repo.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::load_from(&path).await
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self, TapError> {
        let content = fs::read_to_string(path).await.map_err(|e| TapError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config = Self::parse(&content).map_err(|e| TapError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, TapError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TapError> {
        if self.request_timeout_secs == 0 {
            return Err(TapError::Config {
                message: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.cask_path == self.formula_path {
            return Err(TapError::Config {
                message: "cask_path and formula_path must differ".to_string(),
            });
        }
        if self.pull_request.base_branch.trim().is_empty() {
            return Err(TapError::Config {
                message: "pull_request.base_branch must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Manifest and lock locations under `repo`.
    #[must_use]
    pub fn paths(&self, repo: &Path) -> TapPaths {
        TapPaths {
            cask: repo.join(&self.cask_path),
            formula: repo.join(&self.formula_path),
            lock: repo.join(&self.lock_file),
        }
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
