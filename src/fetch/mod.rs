//! HTTPS retrieval of the vendor page and checksum files.
//!
//! Each URL is requested exactly once. A failed request fails the run; the
//! next scheduled invocation is the retry. Nothing in this module touches
//! the filesystem.
//!
//! The transport sits behind the [`Fetch`] trait so the pipeline can be
//! driven with canned responses in tests. [`HttpFetcher`] is the production
//! implementation on top of `reqwest`.

use std::time::Duration;
use tracing::debug;

use crate::constants::{CHECKSUM_SUFFIX, DEFAULT_REQUEST_TIMEOUT};
use crate::core::TapError;

/// Source of remote text.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// GET `url` and return the body as text.
    ///
    /// Implementations must fail with [`TapError::Fetch`] on transport
    /// errors, timeouts and non-2xx responses.
    async fn fetch_text(&self, url: &str) -> Result<String, TapError>;
}

/// `reqwest`-backed fetcher with a per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the default 30 second timeout.
    pub fn new() -> Result<Self, TapError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TapError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tapbump/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TapError::Fetch {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, TapError> {
        debug!("GET {url}");
        let fetch_error = |reason: String| TapError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            fetch_error(reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }

        response.text().await.map_err(|e| fetch_error(format!("failed to read body: {e}")))
    }
}

/// Fetch the vendor's latest-build page.
pub async fn fetch_page<F: Fetch>(fetcher: &F, url: &str) -> Result<String, TapError> {
    let page = fetcher.fetch_text(url).await?;
    debug!("Fetched {} bytes from {url}", page.len());
    Ok(page)
}

/// Fetch `<artifact_url>.sha256` and return its first whitespace token.
///
/// The token is returned unvalidated; see
/// [`validate_checksum`](crate::parse::validate_checksum).
pub async fn fetch_checksum<F: Fetch>(fetcher: &F, artifact_url: &str) -> Result<String, TapError> {
    let checksum_url = format!("{artifact_url}{CHECKSUM_SUFFIX}");
    let body = fetcher.fetch_text(&checksum_url).await?;

    body.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| TapError::parse(format!("checksum file {checksum_url}"), "file is empty"))
}
