//! Filesystem helpers shared by the manifest updater and backups.
//!
//! - [`fs`] - atomic temp-file-and-rename writes

pub mod fs;
