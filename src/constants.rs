//! Compiled-in constants shared across the pipeline.
//!
//! The trusted vendor locations live here and nowhere else. They are not
//! read from the environment or from `tapbump.toml`, so neither can be used
//! to point the pipeline at a different host.

use std::time::Duration;

/// Major JDK release tracked by the tap.
pub const JDK_MAJOR: u32 = 26;

/// Vendor page announcing the latest early-access build.
pub const VENDOR_INDEX_URL: &str = "https://jdk.java.net/26/";

/// Every artifact URL must start with this prefix.
pub const TRUSTED_ARTIFACT_PREFIX: &str = "https://download.java.net/java/early_access/";

/// Root of the per-build artifact tree (`<base>/<build>/GPL/...`).
pub const ARTIFACT_BASE_URL: &str = "https://download.java.net/java/early_access/jdk26";

/// Suffix appended to an artifact URL to locate its checksum file.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Inclusive bounds for a vendor build number.
pub const MIN_BUILD_NUMBER: u16 = 1;
pub const MAX_BUILD_NUMBER: u16 = 999;

/// Per-request timeout for vendor fetches.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for external collaborator commands (`ruby -c`, `git`, `gh`).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Default manifest locations relative to the tap root.
pub const DEFAULT_CASK_PATH: &str = "Casks/openjdk@ea.rb";
pub const DEFAULT_FORMULA_PATH: &str = "Formula/openjdk@ea.rb";

/// Advisory lock file created in the tap root for the duration of a run.
pub const DEFAULT_LOCK_FILE: &str = ".tapbump.lock";

/// Name of the optional configuration file in the tap root.
pub const CONFIG_FILE_NAME: &str = "tapbump.toml";

/// Suffix used for manifest backups taken before mutation.
pub const BACKUP_SUFFIX: &str = "backup";
