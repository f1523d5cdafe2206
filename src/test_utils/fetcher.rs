//! In-memory [`Fetch`] implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use super::fixtures;
use crate::constants::{CHECKSUM_SUFFIX, VENDOR_INDEX_URL};
use crate::core::TapError;
use crate::fetch::Fetch;
use crate::models::{BuildDescriptor, Platform};
use crate::parse::build_artifact_url;

/// Serves fixed bodies by URL and records every request.
///
/// Unknown URLs fail the way a 404 does.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vendor page announcing `build`, plus checksum files for it.
    ///
    /// `fills` give each platform's digest character in [`Platform::ALL`]
    /// order. When `build` is not a usable build number only the page is
    /// served, which is all a run gets to before rejecting it.
    #[must_use]
    pub fn for_build(build: &str, fills: [char; 4]) -> Self {
        let mut fetcher = Self::new().with(VENDOR_INDEX_URL, fixtures::vendor_page(build));

        let descriptor = build.parse::<u16>().ok().and_then(|n| BuildDescriptor::new(n).ok());
        if let Some(descriptor) = descriptor {
            for (platform, fill) in Platform::ALL.into_iter().zip(fills) {
                let url = build_artifact_url(&descriptor, platform);
                let body = format!("{}  {}\n", fixtures::sha(fill), file_name(&url));
                fetcher = fetcher.with(checksum_url(&descriptor, platform), body);
            }
        }
        fetcher
    }

    /// Serve `body` for `url`, replacing any previous response.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }

    /// Stop serving `url`.
    #[must_use]
    pub fn without(mut self, url: &str) -> Self {
        self.responses.remove(url);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Fetch for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, TapError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.responses.get(url).cloned().ok_or_else(|| TapError::Fetch {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }
}

/// Location of the checksum file for `platform`'s artifact.
#[must_use]
pub fn checksum_url(descriptor: &BuildDescriptor, platform: Platform) -> String {
    format!("{}{CHECKSUM_SUFFIX}", build_artifact_url(descriptor, platform))
}

fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
