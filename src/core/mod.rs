//! Core types shared by every stage of the pipeline.
//!
//! At the moment this is the error system: [`TapError`] for typed failures
//! and [`ErrorContext`] / [`user_friendly_error`] for rendering them at the
//! CLI boundary.

pub mod error;

pub use error::{ErrorContext, TapError, user_friendly_error};
