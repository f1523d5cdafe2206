//! Test utilities for tapbump
//!
//! Shared by the unit tests and, through the `test-utils` feature, the
//! integration suite:
//! - [`fixtures`] - cask, formula and vendor page text
//! - [`StaticFetcher`] - canned HTTP responses keyed by URL
//! - [`TestTap`] - a temporary tap directory holding both manifests
//!
//! # Example
//!
//! ```rust,no_run
//! use tapbump::test_utils::{StaticFetcher, TestTap};
//!
//! # fn example() -> anyhow::Result<()> {
//! let tap = TestTap::new(20)?;
//! let fetcher = StaticFetcher::for_build("21", ['a', 'b', 'c', 'd']);
//! assert!(tap.read_cask()?.contains("26-ea+20"));
//! # Ok(())
//! # }
//! ```

pub mod fetcher;
pub mod fixtures;
pub mod tap;

pub use fetcher::StaticFetcher;
pub use tap::TestTap;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=tapbump=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_ansi(true)
            .try_init();
    });
}
