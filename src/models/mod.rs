//! Typed values that flow through the update pipeline.
//!
//! Everything here is constructed only from validated input: a
//! [`BuildDescriptor`] cannot hold an out-of-range build number, a
//! [`Sha256`] cannot hold anything but 64 lowercase hex characters, and an
//! [`ArtifactSet`] always holds exactly one artifact per [`Platform`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{JDK_MAJOR, MAX_BUILD_NUMBER, MIN_BUILD_NUMBER};
use crate::core::TapError;

/// A validated early-access build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDescriptor {
    build_number: u16,
    version: String,
}

impl BuildDescriptor {
    /// Create a descriptor, rejecting build numbers outside `1..=999`.
    pub fn new(build_number: u16) -> Result<Self, TapError> {
        if !(MIN_BUILD_NUMBER..=MAX_BUILD_NUMBER).contains(&build_number) {
            return Err(TapError::validation("build number", build_number.to_string()));
        }
        Ok(Self {
            build_number,
            version: format!("{JDK_MAJOR}-ea+{build_number}"),
        })
    }

    #[must_use]
    pub const fn build_number(&self) -> u16 {
        self.build_number
    }

    /// Version string as written into the manifests, e.g. `26-ea+21`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for BuildDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}

/// One of the four supported download targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Platform {
    #[serde(rename = "macos-arm64")]
    MacosArm64,
    #[serde(rename = "macos-x64")]
    MacosX64,
    #[serde(rename = "linux-arm64")]
    LinuxArm64,
    #[serde(rename = "linux-x64")]
    LinuxX64,
}

impl Platform {
    pub const ALL: [Self; 4] = [Self::MacosArm64, Self::MacosX64, Self::LinuxArm64, Self::LinuxX64];

    /// Name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MacosArm64 => "macos-arm64",
            Self::MacosX64 => "macos-x64",
            Self::LinuxArm64 => "linux-arm64",
            Self::LinuxX64 => "linux-x64",
        }
    }

    /// Segment the vendor uses in artifact file names.
    #[must_use]
    pub const fn artifact_slug(self) -> &'static str {
        match self {
            Self::MacosArm64 => "macos-aarch64",
            Self::MacosX64 => "macos-x64",
            Self::LinuxArm64 => "linux-aarch64",
            Self::LinuxX64 => "linux-x64",
        }
    }

    #[must_use]
    pub const fn is_macos(self) -> bool {
        matches!(self, Self::MacosArm64 | Self::MacosX64)
    }

    #[must_use]
    pub const fn is_arm(self) -> bool {
        matches!(self, Self::MacosArm64 | Self::LinuxArm64)
    }

    /// Resolve a platform from an OS flag and an architecture flag.
    #[must_use]
    pub const fn from_parts(macos: bool, arm: bool) -> Self {
        match (macos, arm) {
            (true, true) => Self::MacosArm64,
            (true, false) => Self::MacosX64,
            (false, true) => Self::LinuxArm64,
            (false, false) => Self::LinuxX64,
        }
    }

    /// Find the platform whose artifact slug appears in `text`.
    #[must_use]
    pub fn detect_in(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| text.contains(&format!("_{}_", p.artifact_slug())))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated SHA-256 digest: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Sha256(String);

impl Sha256 {
    pub(crate) const fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A download for one platform together with its checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformArtifact {
    pub platform: Platform,
    pub url: String,
    pub sha256: Sha256,
}

/// Exactly one [`PlatformArtifact`] per [`Platform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    artifacts: BTreeMap<Platform, PlatformArtifact>,
}

impl ArtifactSet {
    /// Assemble the set, failing if any platform is missing or repeated.
    pub fn new(artifacts: Vec<PlatformArtifact>) -> Result<Self, TapError> {
        let mut map = BTreeMap::new();
        for artifact in artifacts {
            let platform = artifact.platform;
            if map.insert(platform, artifact).is_some() {
                return Err(TapError::validation("artifact set (duplicate platform)", platform.name()));
            }
        }

        if let Some(missing) = Platform::ALL.into_iter().find(|p| !map.contains_key(p)) {
            return Err(TapError::validation("artifact set (missing platform)", missing.name()));
        }

        Ok(Self {
            artifacts: map,
        })
    }

    #[must_use]
    pub fn get(&self, platform: Platform) -> &PlatformArtifact {
        &self.artifacts[&platform]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformArtifact> {
        self.artifacts.values()
    }
}
