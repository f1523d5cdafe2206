//! Turning untrusted vendor text into validated values.
//!
//! The vendor page is third-party HTML. The only thing taken from it is the
//! numeric build number following the first `Build <N>` marker; artifact
//! URLs are synthesized from compiled-in constants, never scraped.
//!
//! Every function here returns a typed [`TapError`] so callers can tell a
//! missing marker ([`TapError::Parse`]) from a present-but-bad value
//! ([`TapError::Validation`]). There is no fallback heuristic: if the page
//! layout changes, the run fails.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::constants::{
    ARTIFACT_BASE_URL, MAX_BUILD_NUMBER, MIN_BUILD_NUMBER, TRUSTED_ARTIFACT_PREFIX,
};
use crate::core::TapError;
use crate::models::{BuildDescriptor, Platform, Sha256};

static BUILD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bBuild\s+([^\s<>()\[\]"',;:]+)"#).expect("build marker regex is valid")
});

static BUILD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,3}$").expect("build number regex is valid"));

static SHA256_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("sha256 regex is valid"));

/// Locate the first `Build <N>` marker and validate the number.
///
/// # Errors
///
/// - [`TapError::Parse`] when the page has no marker at all
/// - [`TapError::Validation`] when the token after `Build` is not one to
///   three digits, has a leading zero, or falls outside `1..=999`
///
/// # Examples
///
/// ```rust
/// use tapbump::parse::extract_build_number;
///
/// let build = extract_build_number("<h2>Build 21 (2025/10/30)</h2>").unwrap();
/// assert_eq!(build.version(), "26-ea+21");
/// ```
pub fn extract_build_number(page: &str) -> Result<BuildDescriptor, TapError> {
    let captures = BUILD_MARKER
        .captures(page)
        .ok_or_else(|| TapError::parse("vendor page", "no 'Build <N>' marker found"))?;
    let token = &captures[1];
    debug!("Found build marker token: {token}");

    validate_build_number(token)
}

/// Validate a raw build-number token.
pub fn validate_build_number(token: &str) -> Result<BuildDescriptor, TapError> {
    if !BUILD_NUMBER.is_match(token) || token.starts_with('0') {
        return Err(TapError::validation("build number", token));
    }

    let number: u16 = token.parse().map_err(|_| TapError::validation("build number", token))?;
    if !(MIN_BUILD_NUMBER..=MAX_BUILD_NUMBER).contains(&number) {
        return Err(TapError::validation("build number", token));
    }

    BuildDescriptor::new(number)
}

/// Synthesize the download URL for `platform` from the fixed template.
#[must_use]
pub fn build_artifact_url(descriptor: &BuildDescriptor, platform: Platform) -> String {
    format!(
        "{ARTIFACT_BASE_URL}/{}/GPL/openjdk-{}_{}_bin.tar.gz",
        descriptor.build_number(),
        descriptor.version(),
        platform.artifact_slug()
    )
}

/// Check a checksum value fetched for `platform`.
pub fn validate_checksum(platform: Platform, value: &str) -> Result<Sha256, TapError> {
    if SHA256_HEX.is_match(value) {
        Ok(Sha256::new_unchecked(value.to_string()))
    } else {
        Err(TapError::validation(format!("SHA256 format for {platform}"), value))
    }
}

/// Require `https` and the trusted artifact prefix.
pub fn validate_url(value: &str) -> Result<String, TapError> {
    let parsed =
        reqwest::Url::parse(value).map_err(|_| TapError::validation("artifact URL", value))?;

    if parsed.scheme() != "https" || !value.starts_with(TRUSTED_ARTIFACT_PREFIX) {
        return Err(TapError::validation("artifact URL", value));
    }

    Ok(value.to_string())
}
