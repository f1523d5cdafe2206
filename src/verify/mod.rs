//! Post-write syntax verification of the rewritten manifests.
//!
//! A rewritten manifest is accepted only if it still parses. The built-in
//! [`BuiltinChecker`] re-reads the file with the strict
//! [`ManifestDocument`] parser and checks every value the pipeline wrote.
//! When `tapbump.toml` names an external command (typically `ruby -c`),
//! [`CommandChecker`] runs it as well; the combined [`Verifier`] requires
//! both to pass.

use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::command::ExternalCommand;
use crate::core::TapError;
use crate::manifest::document::FieldKind;
use crate::manifest::{ManifestDocument, ManifestKind};
use crate::parse::{validate_checksum, validate_url};

/// Confirms a manifest on disk is well formed.
#[allow(async_fn_in_trait)]
pub trait SyntaxCheck {
    /// `Ok(())` when the manifest at `path` loads; [`TapError::Syntax`] otherwise.
    async fn check(&self, kind: ManifestKind, path: &Path) -> Result<(), TapError>;
}

/// Structural check with the crate's own manifest parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinChecker;

impl SyntaxCheck for BuiltinChecker {
    async fn check(&self, kind: ManifestKind, path: &Path) -> Result<(), TapError> {
        let syntax = |reason: String| TapError::Syntax {
            path: path.display().to_string(),
            reason,
        };

        let text = fs::read_to_string(path).await.map_err(|e| syntax(e.to_string()))?;
        let doc = ManifestDocument::parse(kind, &text).map_err(|e| syntax(e.to_string()))?;

        let versions = doc.fields().iter().filter(|f| f.kind == FieldKind::Version).count();
        if versions != 1 {
            return Err(syntax(format!("expected one version declaration, found {versions}")));
        }

        for field in doc.fields() {
            let value = doc.value(field);
            match (field.kind, field.platform) {
                (FieldKind::Sha256, Some(platform)) => {
                    validate_checksum(platform, value).map_err(|e| {
                        syntax(format!("line {}: {e}", field.line_number()))
                    })?;
                }
                (FieldKind::Url, _) if !field.interpolated => {
                    validate_url(value).map_err(|e| syntax(format!("line {}: {e}", field.line_number())))?;
                }
                _ => {}
            }
        }

        for &(field_kind, platform) in kind.required_fields() {
            if doc.find(field_kind, platform).is_none() {
                return Err(syntax(format!("no {field_kind} for {platform}")));
            }
        }

        debug!("{kind} at {} passed the built-in check", path.display());
        Ok(())
    }
}

/// Runs an external command with the manifest path as its last argument.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    program: String,
    args: Vec<String>,
}

impl CommandChecker {
    /// Build from a command line such as `["ruby", "-c"]`.
    ///
    /// Returns `None` for an empty command line.
    #[must_use]
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl SyntaxCheck for CommandChecker {
    async fn check(&self, kind: ManifestKind, path: &Path) -> Result<(), TapError> {
        ExternalCommand::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(path.display().to_string())
            .execute()
            .await
            .map_err(|e| TapError::Syntax {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!("{kind} at {} passed `{}`", path.display(), self.program);
        Ok(())
    }
}

/// Built-in check plus the optional configured command.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    command: Option<CommandChecker>,
}

impl Verifier {
    #[must_use]
    pub fn new(command: Option<CommandChecker>) -> Self {
        Self {
            command,
        }
    }
}

impl SyntaxCheck for Verifier {
    async fn check(&self, kind: ManifestKind, path: &Path) -> Result<(), TapError> {
        BuiltinChecker.check(kind, path).await?;
        if let Some(command) = &self.command {
            command.check(kind, path).await?;
        }
        Ok(())
    }
}
