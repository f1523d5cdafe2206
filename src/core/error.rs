//! Error handling for tapbump
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** so the pipeline (and its tests) can tell a
//!    fetch failure from a validation failure
//! 2. **User-friendly messages** that name the stage and the offending value
//!
//! # Architecture
//!
//! - [`TapError`] - every failure kind the pipeline can report
//! - [`ErrorContext`] - wraps a [`TapError`] with details and a suggestion
//!   for terminal display
//!
//! Internals return `anyhow::Result` and attach `.context(...)` freely. The
//! binary calls [`user_friendly_error`] once, at the very end, to find the
//! typed error in the chain and render it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tapbump::core::{TapError, user_friendly_error};
//!
//! let err = anyhow::Error::from(TapError::Validation {
//!     what: "SHA256 format for linux-x64".to_string(),
//!     value: "not-a-hash".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure kinds reported by the update pipeline and its collaborators.
///
/// The first five variants map one-to-one onto the pipeline stages:
/// fetch, parse, validation, syntax verification and filesystem I/O.
/// The remaining variants cover the surfaces around the pipeline
/// (locking, configuration, external commands).
#[derive(Error, Debug)]
pub enum TapError {
    /// Transport failure, TLS failure, timeout or non-2xx response.
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        url: String,
        reason: String,
    },

    /// An expected marker or field was absent from fetched or on-disk text.
    #[error("Could not parse {what}: {reason}")]
    Parse {
        what: String,
        reason: String,
    },

    /// A value was located but failed its format or range check.
    #[error("invalid {what}: {value}")]
    Validation {
        what: String,
        value: String,
    },

    /// A rewritten manifest failed the syntax check.
    #[error("Syntax check failed for {path}: {reason}")]
    Syntax {
        path: String,
        reason: String,
    },

    /// A filesystem operation on a manifest or backup failed.
    #[error("File system error: {operation} ({path})")]
    FileSystem {
        operation: String,
        path: String,
    },

    /// Another run holds the advisory lock for this tap.
    #[error("Another tapbump run holds the lock at {path}")]
    Locked {
        path: String,
    },

    /// `tapbump.toml` could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// An external collaborator command failed or could not be started.
    #[error("Command '{program}' failed: {reason}")]
    Command {
        program: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

impl TapError {
    /// Short name of the pipeline stage this error belongs to.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch {
                ..
            } => "fetch",
            Self::Parse {
                ..
            } => "parse",
            Self::Validation {
                ..
            } => "validation",
            Self::Syntax {
                ..
            } => "syntax",
            Self::FileSystem {
                ..
            }
            | Self::Io(_) => "io",
            Self::Locked {
                ..
            } => "lock",
            Self::Config {
                ..
            }
            | Self::Toml(_) => "config",
            Self::Command {
                ..
            } => "command",
            Self::Other {
                ..
            } => "other",
        }
    }

    /// Shorthand for a [`TapError::Validation`].
    pub fn validation(what: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Validation {
            what: what.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a [`TapError::Parse`].
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

/// A [`TapError`] with optional details and a suggested fix.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: TapError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: TapError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colour.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Find the typed error in an `anyhow` chain and attach a suggestion.
///
/// Errors that never passed through a [`TapError`] become
/// [`TapError::Other`] carrying the outermost message; the rest of the chain
/// becomes the details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let typed = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<TapError>())
        .or_else(|| error.downcast_ref::<TapError>());
    let Some(typed) = typed else {
        let rest: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
        let ctx = ErrorContext::new(TapError::Other {
            message: error.to_string(),
        });
        return if rest.is_empty() {
            ctx
        } else {
            ctx.with_details(rest.join(": "))
        };
    };

    // Context layers added above the typed error, outermost first.
    let outer: Vec<String> = error
        .chain()
        .take_while(|cause| cause.downcast_ref::<TapError>().is_none())
        .map(ToString::to_string)
        .collect();
    let details = (!outer.is_empty()).then(|| outer.join(": "));

    let suggestion = match typed {
        TapError::Fetch {
            ..
        } => Some("Check network connectivity; the next scheduled run will try again"),
        TapError::Parse {
            ..
        } => Some("The vendor page or manifest layout may have changed; inspect it manually"),
        TapError::Validation {
            ..
        } => Some("Scraped data was rejected; no manifest was modified"),
        TapError::Syntax {
            ..
        } => Some("Fix the manifest by hand; a failed update has already restored both files"),
        TapError::Locked {
            ..
        } => Some("Wait for the other run to finish, or remove a stale lock file"),
        TapError::Config {
            ..
        }
        | TapError::Toml(_) => Some("Fix tapbump.toml or remove it to use the defaults"),
        TapError::Command {
            ..
        } => Some("Make sure the command is installed and on PATH"),
        TapError::FileSystem {
            ..
        }
        | TapError::Io(_)
        | TapError::Other {
            ..
        } => None,
    };

    let owned = rebuild(typed);
    let mut ctx = ErrorContext::new(owned);
    if let Some(d) = details {
        ctx = ctx.with_details(d);
    }
    if let Some(s) = suggestion {
        ctx = ctx.with_suggestion(s);
    }
    ctx
}

fn rebuild(error: &TapError) -> TapError {
    match error {
        TapError::Fetch {
            url,
            reason,
        } => TapError::Fetch {
            url: url.clone(),
            reason: reason.clone(),
        },
        TapError::Parse {
            what,
            reason,
        } => TapError::parse(what.clone(), reason.clone()),
        TapError::Validation {
            what,
            value,
        } => TapError::validation(what.clone(), value.clone()),
        TapError::Syntax {
            path,
            reason,
        } => TapError::Syntax {
            path: path.clone(),
            reason: reason.clone(),
        },
        TapError::FileSystem {
            operation,
            path,
        } => TapError::FileSystem {
            operation: operation.clone(),
            path: path.clone(),
        },
        TapError::Locked {
            path,
        } => TapError::Locked {
            path: path.clone(),
        },
        TapError::Config {
            message,
        } => TapError::Config {
            message: message.clone(),
        },
        TapError::Command {
            program,
            reason,
        } => TapError::Command {
            program: program.clone(),
            reason: reason.clone(),
        },
        TapError::Io(e) => TapError::Io(std::io::Error::new(e.kind(), e.to_string())),
        TapError::Toml(e) => TapError::Config {
            message: e.to_string(),
        },
        TapError::Other {
            message,
        } => TapError::Other {
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_validation_message_names_platform_and_value() {
        let err = TapError::validation("SHA256 format for linux-x64", "not-a-hash");
        assert_eq!(err.to_string(), "invalid SHA256 format for linux-x64: not-a-hash");
        assert_eq!(err.stage(), "validation");
    }

    #[test]
    fn test_user_friendly_error_finds_typed_error_under_context() {
        let result: anyhow::Result<()> =
            Err(TapError::parse("vendor page", "no 'Build <N>' marker")).context("update failed");
        let ctx = user_friendly_error(result.unwrap_err());

        assert!(matches!(ctx.error, TapError::Parse { .. }));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_wraps_untyped_error() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert!(ctx.to_string().contains("something odd"));
    }

    #[test]
    fn test_error_context_display_includes_details_and_suggestion() {
        let ctx = ErrorContext::new(TapError::Locked {
            path: ".tapbump.lock".to_string(),
        })
        .with_details("held by pid 42")
        .with_suggestion("wait");

        let text = ctx.to_string();
        assert!(text.contains(".tapbump.lock"));
        assert!(text.contains("Details: held by pid 42"));
        assert!(text.contains("Suggestion: wait"));
    }
}
